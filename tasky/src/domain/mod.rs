//! Domain types for Tasky
//!
//! - Task: an entry on the board or inside a plan
//! - Artifact / Session: one goal submission and its three plan candidates
//! - UserProfile / HealthData: singleton settings and readings
//! - AppNotification / DailyLog: toasts, history and journal entries

mod id;
mod notification;
mod plan;
mod priority;
mod profile;
mod task;

pub use id::{IdResolver, artifact_id, generate_id, short_id};
pub use notification::{AppNotification, DailyLog, NotificationKind};
pub use plan::{Artifact, ArtifactStatus, PLAN_STYLES, SESSION_ID_TYPE, STYLE_COUNT, Session};
pub use priority::Priority;
pub use profile::{HealthData, HealthUpdate, Theme, UserProfile};
pub use task::{TASK_ID_TYPE, Task};
