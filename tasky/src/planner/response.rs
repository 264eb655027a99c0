//! Wire shape of a generated plan and its parsing

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::PlanError;
use crate::domain::{Priority, Task};

/// The JSON object the model is asked to return
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanResponse {
    pub summary: String,
    pub tasks: Vec<PlanItem>,
}

/// One task as the model describes it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub text: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl PlanItem {
    /// Board-ready task with a fresh id, open
    pub fn to_task(&self) -> Task {
        let mut task = Task::new(self.text.trim()).with_priority(Priority::from_label(&self.priority));
        task.estimated_time = self.estimated_time.clone().filter(|s| !s.trim().is_empty());
        task.due_date = self.due_date.clone().filter(|s| !s.trim().is_empty());
        task
    }
}

impl PlanResponse {
    /// Tasks with freshly minted ids, all open
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks.iter().map(PlanItem::to_task).collect()
    }
}

/// Response schema sent with every plan request; all four task fields required
pub fn plan_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "priority": { "type": "string" },
                        "estimatedTime": { "type": "string" },
                        "dueDate": { "type": "string" }
                    },
                    "required": ["text", "priority", "estimatedTime", "dueDate"]
                }
            }
        },
        "required": ["summary", "tasks"]
    })
}

/// Strip a Markdown code fence some models wrap JSON in
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output into a plan
pub fn parse_plan(text: &str) -> Result<PlanResponse, PlanError> {
    debug!(len = text.len(), "parse_plan: called");
    serde_json::from_str(strip_fence(text)).map_err(|e| PlanError::Parse(e.to_string()))
}
