//! Channel event vocabulary and transport seam.
//!
//! ## Event names (wire contract — reproduced exactly)
//!
//! | Direction | Event | Payload |
//! |-----------|-------|---------|
//! | Outbound | `user-audio-chunk` | base64 text of one chunk's raw PCM bytes |
//! | Outbound | `ui-context-snapshot` | compact text extract of visible UI state |
//! | Inbound | `assistant-audio-chunk` | base64 text of one synthesized chunk |
//! | Inbound | `assistant-response-stopped` | none (signal only) |
//! | Inbound | `assistant-input-received` | none (triggers `ui-context-snapshot`) |
//! | Inbound | `assistant-memory-updated` | structured metadata for the chat-state store |
//! | Inbound | `assistant-message-finalized` | message identifier |
//!
//! The connection itself (auth, reconnects, framing) belongs to the host; the
//! session only sees `ChannelTransport::publish` and a stream of parsed
//! [`InboundEvent`]s.

pub mod codec;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ColloquyError, Result};

// ---------------------------------------------------------------------------
// Fixed transport parameters
// ---------------------------------------------------------------------------

/// Transport sample rate (Hz). All chunks on the wire are mono i16 at this rate.
pub const SAMPLE_RATE: u32 = 24_000;

/// Nominal chunk window: frames accumulate for this long before a flush.
pub const CHUNK_INTERVAL_MS: u64 = 100;

/// Flush threshold in samples (100 ms at 24 kHz).
pub const SAMPLES_PER_CHUNK: usize = (SAMPLE_RATE as u64 * CHUNK_INTERVAL_MS / 1_000) as usize;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const USER_AUDIO_CHUNK: &str = "user-audio-chunk";
pub const UI_CONTEXT_SNAPSHOT: &str = "ui-context-snapshot";
pub const ASSISTANT_AUDIO_CHUNK: &str = "assistant-audio-chunk";
pub const ASSISTANT_RESPONSE_STOPPED: &str = "assistant-response-stopped";
pub const ASSISTANT_INPUT_RECEIVED: &str = "assistant-input-received";
pub const ASSISTANT_MEMORY_UPDATED: &str = "assistant-memory-updated";
pub const ASSISTANT_MESSAGE_FINALIZED: &str = "assistant-message-finalized";

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Everything this subsystem ever publishes on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// One captured chunk, base64 text of its raw PCM bytes.
    UserAudioChunk { audio: String },
    /// Compact text extract of the visible UI state.
    UiContextSnapshot { text: String },
}

impl OutboundEvent {
    /// Wire name for this event.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::UserAudioChunk { .. } => USER_AUDIO_CHUNK,
            OutboundEvent::UiContextSnapshot { .. } => UI_CONTEXT_SNAPSHOT,
        }
    }

    /// Wire payload for this event.
    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::UserAudioChunk { audio } => Value::String(audio.clone()),
            OutboundEvent::UiContextSnapshot { text } => Value::String(text.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Opaque memory/metadata payload, forwarded verbatim to the chat-state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUpdate {
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

/// Parsed inbound channel events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One synthesized chunk, base64 text of its raw PCM bytes.
    AssistantAudioChunk { audio: String },
    /// The assistant's turn was cancelled — barge-in.
    AssistantResponseStopped,
    /// The remote service wants a fresh UI context snapshot.
    AssistantInputReceived,
    /// Memory/metadata mutation for the external chat-state store.
    AssistantMemoryUpdated(MemoryUpdate),
    /// A chat message reached its final form.
    AssistantMessageFinalized { message_id: String },
}

impl InboundEvent {
    /// Map a wire `(name, payload)` pair to a typed event.
    ///
    /// Unknown names yield `Ok(None)` — the wire vocabulary may grow ahead of
    /// this client. A known name with an ill-shaped payload is a
    /// `MalformedPacket` error; the caller drops the event and continues.
    pub fn parse(name: &str, payload: Value) -> Result<Option<InboundEvent>> {
        let event = match name {
            ASSISTANT_AUDIO_CHUNK => {
                let audio = payload
                    .as_str()
                    .ok_or_else(|| {
                        ColloquyError::MalformedPacket("audio payload is not a string".into())
                    })?
                    .to_owned();
                InboundEvent::AssistantAudioChunk { audio }
            }
            ASSISTANT_RESPONSE_STOPPED => InboundEvent::AssistantResponseStopped,
            ASSISTANT_INPUT_RECEIVED => InboundEvent::AssistantInputReceived,
            ASSISTANT_MEMORY_UPDATED => {
                let update: MemoryUpdate = serde_json::from_value(payload).map_err(|e| {
                    ColloquyError::MalformedPacket(format!("memory update payload: {e}"))
                })?;
                InboundEvent::AssistantMemoryUpdated(update)
            }
            ASSISTANT_MESSAGE_FINALIZED => {
                let message_id = payload
                    .as_str()
                    .ok_or_else(|| {
                        ColloquyError::MalformedPacket("message id is not a string".into())
                    })?
                    .to_owned();
                InboundEvent::AssistantMessageFinalized { message_id }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Outbound half of the channel, owned by the host application.
///
/// `publish` must not block: implementations enqueue onto their transport.
/// The capture pipeline calls it from a blocking thread once per chunk.
pub trait ChannelTransport: Send + Sync + 'static {
    fn publish(&self, event: OutboundEvent) -> Result<()>;
}
