//! Notification center: active toasts plus the in-process history

use tracing::debug;

use crate::domain::{AppNotification, NotificationKind};

/// Toast queue and history
///
/// Every notification lands in both lists. Toasts leave the active list by
/// id when their timer fires; history is never trimmed.
#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
    active: Vec<AppNotification>,
    history: Vec<AppNotification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new notification and return it
    pub fn push(&mut self, message: impl Into<String>, kind: NotificationKind) -> AppNotification {
        let notification = AppNotification::new(message, kind);
        debug!(id = %notification.id, %kind, message = %notification.message, "NotificationCenter::push: called");
        self.active.push(notification.clone());
        self.history.push(notification.clone());
        notification
    }

    /// Drop a toast from the active list; false if it was already gone
    pub fn expire(&mut self, id: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        let removed = self.active.len() != before;
        debug!(%id, %removed, "NotificationCenter::expire: called");
        removed
    }

    /// Toasts currently on screen, oldest first
    pub fn active(&self) -> &[AppNotification] {
        &self.active
    }

    /// Every notification ever pushed, oldest first
    pub fn history(&self) -> &[AppNotification] {
        &self.history
    }
}
