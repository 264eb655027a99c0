//! Durable slices: loading with per-slice fallback and whole-slice writes

use serde::Serialize;
use serde::de::DeserializeOwned;
use slicestore::SliceStore;
use tracing::{debug, info, warn};

use super::app::{AppState, Slice};
use super::messages::{StateError, StateResponse};
use crate::domain::{HealthData, Session, Task, UserProfile};

pub const SESSIONS_KEY: &str = "tasky_sessions";
pub const PROFILE_KEY: &str = "tasky_profile";
pub const TASKS_KEY: &str = "tasky_tasks";
pub const HEALTH_KEY: &str = "tasky_health";

impl Slice {
    /// Storage key of this slice
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sessions => SESSIONS_KEY,
            Self::Profile => PROFILE_KEY,
            Self::Tasks => TASKS_KEY,
            Self::Health => HEALTH_KEY,
        }
    }
}

/// Load one slice, falling back to `default` when it is absent or unreadable
fn load_or_default<T: DeserializeOwned>(store: &SliceStore, key: &str, default: impl FnOnce() -> T) -> T {
    match store.load::<T>(key) {
        Ok(Some(value)) => {
            debug!(%key, "load_or_default: loaded");
            value
        }
        Ok(None) => {
            debug!(%key, "load_or_default: absent, using default");
            default()
        }
        Err(e) => {
            warn!(%key, error = %e, "Slice could not be read, using default");
            default()
        }
    }
}

/// Build the startup state from the four slices
///
/// Each slice falls back independently; a bad slice never aborts startup.
/// The newest persisted session becomes current.
pub fn load_state(store: &SliceStore) -> AppState {
    debug!(path = %store.path().display(), "load_state: called");
    let defaults = AppState::default();

    let sessions: Vec<Session> = load_or_default(store, SESSIONS_KEY, Vec::new);
    let profile: UserProfile = load_or_default(store, PROFILE_KEY, || defaults.profile.clone());
    let tasks: Vec<Task> = load_or_default(store, TASKS_KEY, || defaults.tasks.clone());
    let health: HealthData = load_or_default(store, HEALTH_KEY, || defaults.health.clone());

    info!(
        sessions = sessions.len(),
        tasks = tasks.len(),
        profile = %profile.name,
        "Loaded state"
    );

    AppState {
        current_session_id: sessions.last().map(|s| s.id.clone()),
        sessions,
        tasks,
        profile,
        health,
        ..defaults
    }
}

fn save<T: Serialize>(store: &SliceStore, key: &str, value: &T) -> StateResponse<()> {
    store.save(key, value).map_err(|e| StateError::StoreError(e.to_string()))
}

/// Rewrite one whole slice from `state`
pub fn persist(store: &SliceStore, state: &AppState, slice: Slice) -> StateResponse<()> {
    debug!(?slice, "persist: called");
    match slice {
        Slice::Sessions => save(store, SESSIONS_KEY, &state.sessions),
        Slice::Profile => save(store, PROFILE_KEY, &state.profile),
        Slice::Tasks => save(store, TASKS_KEY, &state.tasks),
        Slice::Health => save(store, HEALTH_KEY, &state.health),
    }
}
