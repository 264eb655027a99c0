//! Interactive REPL for Tasky
//!
//! Plain lines are goals handed to the planner; slash commands browse and
//! edit the board, health stats, profile, journal and voice session.

mod session;

pub use session::{Outcome, ReplSession};

use eyre::Result;

use crate::config::Config;
use crate::planner::PlanGenerator;
use crate::state::StateManager;
use crate::voice::VoiceController;

/// File that voice replies are written to unless `/voice` names one
pub const VOICE_REPLY_FILE: &str = "voice-reply.pcm";

/// Run the interactive REPL
///
/// This is what `tasky` does when no subcommand is given.
pub async fn run_interactive(
    config: &Config,
    state: StateManager,
    generator: PlanGenerator,
    voice: VoiceController,
) -> Result<()> {
    let voice_output = config.storage.dir.join(VOICE_REPLY_FILE);
    let mut session = ReplSession::new(state, generator, voice, voice_output, config.voice.output_sample_rate);
    session.run().await
}
