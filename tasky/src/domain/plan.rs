//! Sessions and their plan artifacts
//!
//! A session is one goal submission. It always carries exactly
//! [`STYLE_COUNT`] artifacts, and the artifact in slot `i` is generated with
//! style `PLAN_STYLES[i]`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::id::{artifact_id, generate_id};
use super::task::Task;

/// Number of plan variants generated per session
pub const STYLE_COUNT: usize = 3;

/// The fixed, ordered plan styles; slot `i` of every session uses style `i`
pub const PLAN_STYLES: [&str; STYLE_COUNT] = ["Balanced Harmony", "Peak Focus Sprint", "Gentle Progress"];

/// Domain type tag used when minting session IDs
pub const SESSION_ID_TYPE: &str = "session";

/// Lifecycle of a generated plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Request in flight (or never resolved)
    Streaming,
    /// Plan parsed and stored
    Complete,
    /// Resolution failed and was recorded as such
    Error,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One AI-generated plan candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub style_name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub summary: String,
    pub status: ArtifactStatus,
}

impl Artifact {
    /// Placeholder for `slot` of a session, waiting on its request
    pub fn placeholder(session_id: &str, slot: usize) -> Self {
        Self {
            id: artifact_id(session_id, slot),
            style_name: PLAN_STYLES[slot % STYLE_COUNT].to_string(),
            tasks: Vec::new(),
            summary: String::new(),
            status: ArtifactStatus::Streaming,
        }
    }

    /// The completed version of this artifact
    pub fn resolved(&self, summary: String, tasks: Vec<Task>) -> Self {
        debug!(id = %self.id, task_count = tasks.len(), "Artifact::resolved: called");
        Self {
            id: self.id.clone(),
            style_name: self.style_name.clone(),
            tasks,
            summary,
            status: ArtifactStatus::Complete,
        }
    }

    /// The failed version of this artifact
    pub fn failed(&self) -> Self {
        debug!(id = %self.id, "Artifact::failed: called");
        Self {
            status: ArtifactStatus::Error,
            ..self.clone()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == ArtifactStatus::Streaming
    }
}

/// One goal submission with its fixed triple of plan candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub prompt: String,
    /// Creation time (unix ms)
    pub timestamp: i64,
    pub artifacts: [Artifact; STYLE_COUNT],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_plan_id: Option<String>,
}

impl Session {
    /// Create a session for `prompt` with every artifact streaming
    pub fn new(prompt: impl Into<String>) -> Self {
        let id = generate_id(SESSION_ID_TYPE);
        let prompt = prompt.into();
        debug!(%id, %prompt, "Session::new: called");
        let artifacts = std::array::from_fn(|slot| Artifact::placeholder(&id, slot));
        Self {
            id,
            prompt,
            timestamp: chrono::Utc::now().timestamp_millis(),
            artifacts,
            selected_plan_id: None,
        }
    }

    /// Copy of this session with `slot` replaced
    ///
    /// Out-of-range slots leave the session unchanged.
    pub fn with_artifact(&self, slot: usize, artifact: Artifact) -> Self {
        let mut next = self.clone();
        if let Some(existing) = next.artifacts.get_mut(slot) {
            *existing = artifact;
        } else {
            debug!(%slot, session_id = %self.id, "Session::with_artifact: slot out of range");
        }
        next
    }

    /// Find an artifact by ID
    pub fn artifact(&self, artifact_id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == artifact_id)
    }

    /// True once no artifact is still streaming
    pub fn is_settled(&self) -> bool {
        self.artifacts.iter().all(|a| !a.is_streaming())
    }

    /// Number of artifacts in the given status
    pub fn count_status(&self, status: ArtifactStatus) -> usize {
        self.artifacts.iter().filter(|a| a.status == status).count()
    }
}
