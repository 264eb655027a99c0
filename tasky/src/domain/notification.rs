//! Notifications and journal entries

use serde::{Deserialize, Serialize};

use super::id::generate_id;

/// Kind of a notification, drives how it is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Overdue,
    Achievement,
    #[default]
    Success,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reminder => write!(f, "reminder"),
            Self::Overdue => write!(f, "overdue"),
            Self::Achievement => write!(f, "achievement"),
            Self::Success => write!(f, "success"),
        }
    }
}

/// A toast and history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    /// Creation time (unix ms)
    pub timestamp: i64,
}

impl AppNotification {
    pub fn new(message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: generate_id("notif"),
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A journal entry ("Journal a win")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub id: String,
    pub content: String,
    /// Creation time (unix ms)
    pub timestamp: i64,
}

impl DailyLog {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: generate_id("log"),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
