//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System instruction for plan generation
pub const PLAN_SYSTEM: &str = include_str!("../../prompts/plan-system.pmt");

/// Per-style user turn for plan generation
pub const PLAN_USER: &str = include_str!("../../prompts/plan-user.pmt");

/// System instruction for live voice sessions
pub const VOICE_SYSTEM: &str = include_str!("../../prompts/voice-system.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "plan-system" => Some(PLAN_SYSTEM),
        "plan-user" => Some(PLAN_USER),
        "voice-system" => Some(VOICE_SYSTEM),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
