//! State management
//!
//! A single actor owns [`AppState`]; every change goes through [`StateManager`].

mod app;
mod manager;
mod messages;
mod notifications;
mod slices;

pub use app::{AppState, DEFAULT_DUE_DATE, Slice, default_tasks};
pub use manager::{HEALTH_MESSAGE, NOTE_MESSAGE, SYNCED_MESSAGE, StateManager, StateOptions};
pub use messages::{StateCommand, StateError, StateEvent, StateResponse};
pub use notifications::NotificationCenter;
pub use slices::{HEALTH_KEY, PROFILE_KEY, SESSIONS_KEY, TASKS_KEY, load_state, persist};
