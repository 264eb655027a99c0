//! Tasky - AI day planner
//!
//! A goal becomes three candidate plans generated in parallel, one per
//! style. Any plan can be synced onto a persistent task board. Health stats,
//! a profile, a journal and a notification center round out the state, and a
//! voice session lets a live model add tasks and update stats by talking.
//!
//! # Core Concepts
//!
//! - **Single Writer**: one actor owns all state; everything else sends commands
//! - **Immutable Snapshots**: each mutation produces a new `Arc<AppState>`
//! - **Slices**: sessions, profile, tasks and health persist independently
//! - **Fresh Identities**: syncing a plan always mints new task ids
//!
//! # Modules
//!
//! - [`domain`] - Tasks, sessions, artifacts, profile, health, notifications
//! - [`state`] - State actor, notification center, slice persistence
//! - [`planner`] - Parallel plan generation workflow
//! - [`llm`] - LLM client trait with Gemini and OpenAI implementations
//! - [`prompts`] - Handlebars prompt templates
//! - [`voice`] - Live voice session bridge
//! - [`repl`] - Interactive REPL
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod repl;
pub mod state;
pub mod view;
pub mod voice;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use domain::{
    AppNotification, Artifact, ArtifactStatus, DailyLog, HealthData, HealthUpdate, NotificationKind, PLAN_STYLES,
    Priority, Session, Task, UserProfile,
};
pub use llm::{CompletionRequest, CompletionResponse, GeminiClient, LlmClient, LlmError, OpenAIClient, create_client};
pub use planner::{GenerationReport, GeneratorOptions, PlanError, PlanGenerator, SlotOutcome};
pub use prompts::PromptLoader;
pub use state::{AppState, StateCommand, StateError, StateEvent, StateManager, StateOptions, StateResponse};
pub use voice::{VoiceController, VoiceError, WsConnector};
