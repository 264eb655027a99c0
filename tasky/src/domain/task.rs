//! Task - one entry on the task board or inside a generated plan

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::id::generate_id;
use super::priority::Priority;

/// Domain type tag used when minting task IDs
pub const TASK_ID_TYPE: &str = "task";

/// A unit of work on the board
///
/// Board tasks and artifact tasks live in separate identity domains: copying a
/// task anywhere always goes through [`Task::reissue`], which mints a new ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Task {
    /// Create an open task with a fresh ID and default priority
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        debug!(%text, "Task::new: called");
        Self {
            id: generate_id(TASK_ID_TYPE),
            text,
            completed: false,
            priority: Priority::default(),
            estimated_time: None,
            due_date: None,
            category: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimated_time(mut self, estimated_time: impl Into<String>) -> Self {
        self.estimated_time = Some(estimated_time.into());
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Copy this task under a fresh identity, reopened
    pub fn reissue(&self) -> Self {
        debug!(from = %self.id, "Task::reissue: called");
        Self {
            id: generate_id(TASK_ID_TYPE),
            completed: false,
            ..self.clone()
        }
    }
}
