//! State manager messages
//!
//! Commands and responses for the actor pattern.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use super::app::AppState;
use crate::domain::{AppNotification, Artifact, DailyLog, HealthData, HealthUpdate, NotificationKind, Session, Task, UserProfile};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Plan generation
    BeginGeneration {
        prompt: String,
        reply: oneshot::Sender<Option<Session>>,
    },
    ResolveArtifact {
        session_id: String,
        slot: usize,
        artifact: Artifact,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    FinishGeneration {
        message: String,
        kind: NotificationKind,
        reply: oneshot::Sender<AppNotification>,
    },

    // Board
    SyncArtifact {
        artifact_id: String,
        reply: oneshot::Sender<StateResponse<Vec<Task>>>,
    },
    AddTask {
        task: Task,
        reply: oneshot::Sender<Task>,
    },
    ToggleTask {
        id: String,
        reply: oneshot::Sender<StateResponse<Task>>,
    },

    // Profile and health
    UpdateHealth {
        update: HealthUpdate,
        reply: oneshot::Sender<HealthData>,
    },
    UpdateProfile {
        profile: UserProfile,
        reply: oneshot::Sender<()>,
    },

    // Sessions
    SelectSession {
        id: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Notifications and journal
    Notify {
        message: String,
        kind: NotificationKind,
        reply: oneshot::Sender<AppNotification>,
    },
    ExpireToast {
        id: String,
    },
    ArchiveNote {
        content: String,
        reply: oneshot::Sender<Option<DailyLog>>,
    },

    // Reads
    Snapshot {
        reply: oneshot::Sender<Arc<AppState>>,
    },

    // Shutdown
    Shutdown,
}

/// Event broadcast when state changes that a front end should react to
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// A generation started with this session
    SessionCreated { session_id: String },
    /// One artifact of a session was replaced
    ArtifactResolved { session_id: String, slot: usize },
    /// The busy flag dropped
    GenerationFinished,
    /// The board changed
    TasksChanged,
    /// A toast appeared
    Notified(AppNotification),
    /// A toast left the active list
    ToastExpired { id: String },
}
