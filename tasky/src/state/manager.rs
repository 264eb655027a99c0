//! StateManager - actor that owns the application state
//!
//! Processes commands via channels so every mutation is applied by one task,
//! one at a time. Each mutation rewrites the slices it touched.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use slicestore::SliceStore;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::app::{AppState, Slice};
use super::messages::{StateCommand, StateError, StateEvent, StateResponse};
use super::slices;
use crate::config::Config;
use crate::domain::{
    AppNotification, Artifact, DailyLog, HealthData, HealthUpdate, NotificationKind, Session, Task, UserProfile,
};

/// Notification emitted after a sync
pub const SYNCED_MESSAGE: &str = "Synced plan to monitor.";

/// Notification emitted after a health update
pub const HEALTH_MESSAGE: &str = "Health stats synchronized.";

/// Notification emitted after a journal entry
pub const NOTE_MESSAGE: &str = "Note archived.";

/// Runtime options for the actor
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// How long a toast stays in the active list
    pub toast_ttl: Duration,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            toast_ttl: Duration::from_millis(5000),
        }
    }
}

impl From<&Config> for StateOptions {
    fn from(config: &Config) -> Self {
        Self {
            toast_ttl: Duration::from_millis(config.notifications.toast_ttl_ms),
        }
    }
}

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for state change notifications
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the slice store at `store_path`
    pub fn spawn(store_path: impl AsRef<Path>, options: StateOptions) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), ?options, "spawn: called");
        let store = SliceStore::open(store_path.as_ref())?;
        let state = slices::load_state(&store);

        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        let actor = Actor {
            state: Arc::new(state),
            store,
            options,
            event_tx: event_tx.clone(),
            self_tx: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx));

        info!("StateManager spawned");
        Ok(Self { tx, event_tx })
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }

    // === Plan generation ===

    /// Open a new session for `prompt` and raise the busy flag
    ///
    /// `None` when the prompt is blank or a generation is already running.
    pub async fn begin_generation(&self, prompt: &str) -> StateResponse<Option<Session>> {
        debug!(%prompt, "begin_generation: called");
        let prompt = prompt.to_string();
        self.request(|reply| StateCommand::BeginGeneration { prompt, reply })
            .await
    }

    /// Replace one artifact of a session
    pub async fn resolve_artifact(&self, session_id: &str, slot: usize, artifact: Artifact) -> StateResponse<()> {
        debug!(%session_id, %slot, "resolve_artifact: called");
        let session_id = session_id.to_string();
        self.request(|reply| StateCommand::ResolveArtifact {
            session_id,
            slot,
            artifact,
            reply,
        })
        .await?
    }

    /// Lower the busy flag and emit the outcome notification
    pub async fn finish_generation(&self, message: &str, kind: NotificationKind) -> StateResponse<AppNotification> {
        debug!(%message, %kind, "finish_generation: called");
        let message = message.to_string();
        self.request(|reply| StateCommand::FinishGeneration { message, kind, reply })
            .await
    }

    // === Board ===

    /// Copy an artifact's tasks onto the board
    pub async fn sync_artifact(&self, artifact_id: &str) -> StateResponse<Vec<Task>> {
        debug!(%artifact_id, "sync_artifact: called");
        let artifact_id = artifact_id.to_string();
        self.request(|reply| StateCommand::SyncArtifact { artifact_id, reply })
            .await?
    }

    /// Put a task on top of the board
    pub async fn add_task(&self, task: Task) -> StateResponse<Task> {
        debug!(text = %task.text, "add_task: called");
        self.request(|reply| StateCommand::AddTask { task, reply }).await
    }

    /// Flip a board task's completion
    pub async fn toggle_task(&self, id: &str) -> StateResponse<Task> {
        debug!(%id, "toggle_task: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::ToggleTask { id, reply }).await?
    }

    // === Profile and health ===

    pub async fn update_health(&self, update: HealthUpdate) -> StateResponse<HealthData> {
        debug!(?update, "update_health: called");
        self.request(|reply| StateCommand::UpdateHealth { update, reply })
            .await
    }

    pub async fn update_profile(&self, profile: UserProfile) -> StateResponse<()> {
        debug!(name = %profile.name, "update_profile: called");
        self.request(|reply| StateCommand::UpdateProfile { profile, reply })
            .await
    }

    // === Sessions ===

    pub async fn select_session(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "select_session: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::SelectSession { id, reply })
            .await?
    }

    // === Notifications and journal ===

    /// Show a toast and record it in history
    pub async fn notify(&self, message: &str, kind: NotificationKind) -> StateResponse<AppNotification> {
        debug!(%message, %kind, "notify: called");
        let message = message.to_string();
        self.request(|reply| StateCommand::Notify { message, kind, reply })
            .await
    }

    /// Add a journal entry; `None` for blank content
    pub async fn archive_note(&self, content: &str) -> StateResponse<Option<DailyLog>> {
        debug!("archive_note: called");
        let content = content.to_string();
        self.request(|reply| StateCommand::ArchiveNote { content, reply })
            .await
    }

    // === Reads ===

    /// Current immutable snapshot of the whole state
    pub async fn snapshot(&self) -> StateResponse<Arc<AppState>> {
        self.request(|reply| StateCommand::Snapshot { reply }).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// The actor: owns the state snapshot and the store
struct Actor {
    state: Arc<AppState>,
    store: SliceStore,
    options: StateOptions,
    event_tx: broadcast::Sender<StateEvent>,
    /// Used by toast timers; weak so the actor does not keep its own channel open
    self_tx: mpsc::WeakSender<StateCommand>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<StateCommand>) {
        debug!("StateManager actor started");
        while let Some(cmd) = rx.recv().await {
            if matches!(cmd, StateCommand::Shutdown) {
                info!("StateManager shutting down");
                break;
            }
            self.handle(cmd);
        }
        debug!("StateManager actor stopped");
    }

    /// Private copy of the state for the command being applied
    fn state_mut(&mut self) -> &mut AppState {
        Arc::make_mut(&mut self.state)
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn persist(&self, touched: &[Slice]) {
        for slice in touched {
            if let Err(e) = slices::persist(&self.store, &self.state, *slice) {
                warn!(key = slice.key(), error = %e, "Failed to persist slice");
            }
        }
    }

    fn notify(&mut self, message: &str, kind: NotificationKind) -> AppNotification {
        let notification = self.state_mut().notify(message, kind);
        self.emit(StateEvent::Notified(notification.clone()));
        self.schedule_expiry(notification.id.clone());
        notification
    }

    /// Remove the toast from the active list once its ttl has passed
    fn schedule_expiry(&self, id: String) {
        let ttl = self.options.toast_ttl;
        let weak = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(StateCommand::ExpireToast { id }).await;
            }
        });
    }

    fn handle(&mut self, cmd: StateCommand) {
        match cmd {
            StateCommand::BeginGeneration { prompt, reply } => {
                debug!("actor: BeginGeneration command");
                let session = self.state_mut().begin_generation(&prompt);
                if let Some(ref session) = session {
                    self.persist(&[Slice::Sessions]);
                    self.emit(StateEvent::SessionCreated {
                        session_id: session.id.clone(),
                    });
                }
                let _ = reply.send(session);
            }

            StateCommand::ResolveArtifact {
                session_id,
                slot,
                artifact,
                reply,
            } => {
                debug!(%session_id, %slot, "actor: ResolveArtifact command");
                let result = self.state_mut().resolve_artifact(&session_id, slot, artifact);
                if result.is_ok() {
                    self.persist(&[Slice::Sessions]);
                    self.emit(StateEvent::ArtifactResolved { session_id, slot });
                }
                let _ = reply.send(result);
            }

            StateCommand::FinishGeneration { message, kind, reply } => {
                debug!("actor: FinishGeneration command");
                self.state_mut().finish_generation();
                self.emit(StateEvent::GenerationFinished);
                let _ = reply.send(self.notify(&message, kind));
            }

            StateCommand::SyncArtifact { artifact_id, reply } => {
                debug!(%artifact_id, "actor: SyncArtifact command");
                let result = self.state_mut().sync_artifact(&artifact_id);
                if result.is_ok() {
                    self.persist(&[Slice::Tasks, Slice::Sessions]);
                    self.emit(StateEvent::TasksChanged);
                    self.notify(SYNCED_MESSAGE, NotificationKind::Achievement);
                }
                let _ = reply.send(result);
            }

            StateCommand::AddTask { task, reply } => {
                debug!("actor: AddTask command");
                let task = self.state_mut().add_task(task);
                self.persist(&[Slice::Tasks]);
                self.emit(StateEvent::TasksChanged);
                self.notify(&format!("Task Added: {}", task.text), NotificationKind::Success);
                let _ = reply.send(task);
            }

            StateCommand::ToggleTask { id, reply } => {
                debug!(%id, "actor: ToggleTask command");
                let result = self.state_mut().toggle_task(&id);
                if let Ok(ref task) = result {
                    self.persist(&[Slice::Tasks]);
                    self.emit(StateEvent::TasksChanged);
                    if task.completed {
                        self.notify(&format!("Completed: {}", task.text), NotificationKind::Success);
                    }
                }
                let _ = reply.send(result);
            }

            StateCommand::UpdateHealth { update, reply } => {
                debug!("actor: UpdateHealth command");
                let health = self.state_mut().update_health(&update);
                self.persist(&[Slice::Health]);
                self.notify(HEALTH_MESSAGE, NotificationKind::Success);
                let _ = reply.send(health);
            }

            StateCommand::UpdateProfile { profile, reply } => {
                debug!("actor: UpdateProfile command");
                self.state_mut().update_profile(profile);
                self.persist(&[Slice::Profile]);
                let _ = reply.send(());
            }

            StateCommand::SelectSession { id, reply } => {
                debug!(%id, "actor: SelectSession command");
                let _ = reply.send(self.state_mut().select_session(&id));
            }

            StateCommand::Notify { message, kind, reply } => {
                debug!("actor: Notify command");
                let _ = reply.send(self.notify(&message, kind));
            }

            StateCommand::ExpireToast { id } => {
                debug!(%id, "actor: ExpireToast command");
                if self.state_mut().notifications.expire(&id) {
                    self.emit(StateEvent::ToastExpired { id });
                }
            }

            StateCommand::ArchiveNote { content, reply } => {
                debug!("actor: ArchiveNote command");
                let entry = self.state_mut().archive_note(&content);
                if entry.is_some() {
                    self.notify(NOTE_MESSAGE, NotificationKind::Success);
                }
                let _ = reply.send(entry);
            }

            StateCommand::Snapshot { reply } => {
                let _ = reply.send(Arc::clone(&self.state));
            }

            StateCommand::Shutdown => {}
        }
    }
}
