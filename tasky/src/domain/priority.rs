//! Priority levels for tasks

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Priority level for a Task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Parse a priority label produced by a model, falling back to the default
    ///
    /// Models answer with "High", "high priority", "urgent" and similar; anything
    /// that cannot be recognized becomes `Medium`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        if let Ok(priority) = normalized.parse() {
            return priority;
        }
        match normalized.split_whitespace().next() {
            Some("low" | "minor") => Self::Low,
            Some("high" | "urgent" | "critical") => Self::High,
            _ => {
                debug!(%label, "Priority::from_label: unrecognized label, using default");
                Self::default()
            }
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}
