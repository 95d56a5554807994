use thiserror::Error;

/// All errors produced by colloquy.
#[derive(Debug, Error)]
pub enum ColloquyError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no suitable output device found")]
    NoOutputDevice,

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("decoded packet contains no samples")]
    EmptyPacket,

    #[error("playback engine error: {0}")]
    Engine(String),

    #[error("channel publish failed: {0}")]
    Publish(String),

    #[error("session is already active")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ColloquyError {
    /// Errors that mean a packet should be dropped while the pipeline keeps
    /// going (never session-fatal).
    pub fn is_packet_local(&self) -> bool {
        matches!(
            self,
            ColloquyError::MalformedPacket(_) | ColloquyError::EmptyPacket
        )
    }
}

pub type Result<T> = std::result::Result<T, ColloquyError>;
