//! # colloquy
//!
//! Real-time voice-conversation transport layer: microphone capture to
//! outbound audio packets, inbound packets to gapless playback, and the
//! session lifecycle (including barge-in interruption) that ties the two
//! together.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → MicCapture → SPSC RingBuffer → capture::run(spawn_blocking)
//!                                                  │ resample → quantize
//!                                                  │ accumulate 100 ms
//!                                           ChannelTransport::publish
//!                                           ("user-audio-chunk", base64)
//!
//! InboundEvent stream → VoiceSession::handle_inbound
//!       assistant-audio-chunk → decode → PlaybackCursor → AudioOutput
//!       assistant-response-stopped → interrupt (engine + cursor reset)
//!       assistant-input-received → publish "ui-context-snapshot"
//!       assistant-memory-updated / -message-finalized → ChatStateStore
//! ```
//!
//! The audio callbacks are zero-alloc. All heap work happens on the pipeline
//! thread and in the session event context.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod chatstate;
pub mod error;
pub mod output;
pub mod session;
pub mod wire;

// Convenience re-exports for downstream crates
pub use chatstate::{ChatStateStore, NullContextSource, StoreHandle, UiContextSource};
pub use error::ColloquyError;
pub use output::{AudioOutput, OutputFactory};
pub use session::{
    scheduler::PlaybackCursor, SessionConfig, SessionPhase, SessionStatusEvent, VoiceSession,
};
pub use wire::{
    ChannelTransport, InboundEvent, MemoryUpdate, OutboundEvent, CHUNK_INTERVAL_MS, SAMPLE_RATE,
    SAMPLES_PER_CHUNK,
};

#[cfg(feature = "audio-cpal")]
pub use output::device::CpalOutputFactory;
