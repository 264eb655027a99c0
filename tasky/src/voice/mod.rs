//! Voice session bridge
//!
//! Streams microphone PCM to a live model, plays its audio replies back to
//! back, and turns its tool calls into task board and health updates.

mod audio;
mod bridge;
mod pcm;
mod playback;
mod protocol;
mod transport;
mod ws;

use thiserror::Error;

pub use audio::{AudioSink, AudioSource, FRAME_SAMPLES, PcmReaderSource, PcmWriterSink};
pub use bridge::{ACTIVATED_MESSAGE, SessionEnd, SessionSummary, VoiceBridge, VoiceController};
pub use pcm::{decode_blob, decode_pcm16, encode_blob, encode_pcm16, pcm_mime_type};
pub use playback::PlaybackScheduler;
pub use protocol::{
    ADD_TASK_TOOL, Blob, ClientMessage, FunctionCall, ServerContent, ServerMessage, ToolCall, UPDATE_HEALTH_TOOL,
    voice_tools,
};
pub use transport::{ChannelTransport, LiveConnector, LiveTransport};
pub use ws::{WsConnector, WsLiveTransport};

use crate::state::StateError;

/// Errors from a voice session
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Malformed message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Voice session already active")]
    AlreadyActive,

    #[error(transparent)]
    State(#[from] StateError),
}
