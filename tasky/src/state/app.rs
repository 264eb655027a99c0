//! AppState - the whole application state as one value
//!
//! The actor holds it behind an `Arc` and applies each command to a private
//! copy, so any snapshot handed out earlier never changes underneath its reader.

use tracing::debug;

use super::messages::{StateError, StateResponse};
use super::notifications::NotificationCenter;
use crate::domain::{
    AppNotification, Artifact, DailyLog, HealthData, HealthUpdate, NotificationKind, Priority, Session, Task,
    UserProfile,
};

/// Due date given to manually added tasks that carry none
pub const DEFAULT_DUE_DATE: &str = "Today";

/// One independently persisted part of the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Sessions,
    Profile,
    Tasks,
    Health,
}

/// Everything Tasky knows
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sessions in creation order
    pub sessions: Vec<Session>,
    /// Session shown as "current", by id
    pub current_session_id: Option<String>,
    /// True while a plan generation is in flight
    pub busy: bool,
    /// The board, newest first
    pub tasks: Vec<Task>,
    pub profile: UserProfile,
    pub health: HealthData,
    pub notifications: NotificationCenter,
    /// Journal entries, newest first
    pub journal: Vec<DailyLog>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            current_session_id: None,
            busy: false,
            tasks: default_tasks(),
            profile: UserProfile::default(),
            health: HealthData::default(),
            notifications: NotificationCenter::new(),
            journal: Vec::new(),
        }
    }
}

/// The board shown on first launch
pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::new("Morning Routine & Coffee")
            .with_priority(Priority::Medium)
            .with_estimated_time("30m")
            .with_due_date("Today"),
        Task::new("Daily Goals Setup")
            .with_priority(Priority::High)
            .with_estimated_time("15m")
            .with_due_date("Today")
            .with_completed(true),
    ]
}

impl AppState {
    // === Queries ===

    /// The current session, if any
    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current_session_id.as_deref()?;
        self.session(id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Sessions for display, newest first
    pub fn sessions_newest_first(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().rev()
    }

    /// Locate an artifact and the session that owns it
    pub fn find_artifact(&self, artifact_id: &str) -> Option<(&Session, &Artifact)> {
        self.sessions
            .iter()
            .find_map(|s| s.artifact(artifact_id).map(|a| (s, a)))
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Step progress toward the profile's goal, in percent
    pub fn step_progress(&self) -> f64 {
        self.health.step_progress(&self.profile)
    }

    // === Transitions ===

    /// Start a generation for `prompt`
    ///
    /// Appends the new session, points "current" at it and raises the busy
    /// flag together. Returns `None` (and changes nothing) for a blank prompt
    /// or while another generation is in flight.
    pub fn begin_generation(&mut self, prompt: &str) -> Option<Session> {
        let prompt = prompt.trim();
        debug!(%prompt, busy = self.busy, "AppState::begin_generation: called");
        if prompt.is_empty() || self.busy {
            debug!("AppState::begin_generation: ignored");
            return None;
        }
        let session = Session::new(prompt);
        self.current_session_id = Some(session.id.clone());
        self.sessions.push(session.clone());
        self.busy = true;
        Some(session)
    }

    /// Replace the artifact in `slot` of the session with id `session_id`
    pub fn resolve_artifact(&mut self, session_id: &str, slot: usize, artifact: Artifact) -> StateResponse<()> {
        debug!(%session_id, %slot, status = %artifact.status, "AppState::resolve_artifact: called");
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| StateError::NotFound(session_id.to_string()))?;
        *session = session.with_artifact(slot, artifact);
        Ok(())
    }

    /// Lower the busy flag
    pub fn finish_generation(&mut self) {
        debug!("AppState::finish_generation: called");
        self.busy = false;
    }

    /// Copy an artifact's tasks onto the board under fresh identities
    ///
    /// The copies go on top in artifact order and the artifact becomes the
    /// session's selected plan. Returns the new board tasks.
    pub fn sync_artifact(&mut self, artifact_id: &str) -> StateResponse<Vec<Task>> {
        debug!(%artifact_id, "AppState::sync_artifact: called");
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.artifact(artifact_id).is_some())
            .ok_or_else(|| StateError::NotFound(artifact_id.to_string()))?;

        let copies: Vec<Task> = session
            .artifact(artifact_id)
            .map(|a| a.tasks.iter().map(Task::reissue).collect())
            .unwrap_or_default();
        session.selected_plan_id = Some(artifact_id.to_string());

        self.tasks.splice(0..0, copies.iter().cloned());
        debug!(count = copies.len(), board = self.tasks.len(), "AppState::sync_artifact: board updated");
        Ok(copies)
    }

    /// Put a task on top of the board; tasks without a due date are due "Today"
    pub fn add_task(&mut self, mut task: Task) -> Task {
        debug!(id = %task.id, text = %task.text, "AppState::add_task: called");
        if task.due_date.is_none() {
            task.due_date = Some(DEFAULT_DUE_DATE.to_string());
        }
        self.tasks.insert(0, task.clone());
        task
    }

    /// Flip a task's completion, returning the updated task
    pub fn toggle_task(&mut self, id: &str) -> StateResponse<Task> {
        debug!(%id, "AppState::toggle_task: called");
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        task.completed = !task.completed;
        Ok(task.clone())
    }

    pub fn update_health(&mut self, update: &HealthUpdate) -> HealthData {
        debug!(?update, "AppState::update_health: called");
        self.health = self.health.merged(update);
        self.health.clone()
    }

    pub fn update_profile(&mut self, profile: UserProfile) {
        debug!(name = %profile.name, "AppState::update_profile: called");
        self.profile = profile;
    }

    /// Point "current" at an existing session
    pub fn select_session(&mut self, id: &str) -> StateResponse<()> {
        debug!(%id, "AppState::select_session: called");
        if self.session(id).is_none() {
            return Err(StateError::NotFound(id.to_string()));
        }
        self.current_session_id = Some(id.to_string());
        Ok(())
    }

    /// Add a journal entry; blank content is ignored
    pub fn archive_note(&mut self, content: &str) -> Option<DailyLog> {
        let content = content.trim();
        debug!(len = content.len(), "AppState::archive_note: called");
        if content.is_empty() {
            return None;
        }
        let entry = DailyLog::new(content);
        self.journal.insert(0, entry.clone());
        Some(entry)
    }

    pub fn notify(&mut self, message: impl Into<String>, kind: NotificationKind) -> AppNotification {
        self.notifications.push(message, kind)
    }
}
