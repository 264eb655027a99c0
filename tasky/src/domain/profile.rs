//! User profile and health snapshot

use serde::{Deserialize, Serialize};

/// Display theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Glass,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
            Self::Glass => write!(f, "glass"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "glass" => Ok(Self::Glass),
            _ => Err(format!("Unknown theme: {}", s)),
        }
    }
}

/// The single user's profile and daily goals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub step_goal: u32,
    /// Hours of sleep
    pub sleep_goal: f64,
    /// Millilitres of water
    pub water_goal: u32,
    #[serde(default)]
    pub theme: Theme,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "User".to_string(),
            step_goal: 10_000,
            sleep_goal: 8.0,
            water_goal: 2500,
            theme: Theme::Light,
        }
    }
}

/// Latest health readings; a snapshot, not a time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub steps: u32,
    pub heart_rate: u32,
    pub sleep_hours: f64,
    /// Millilitres
    pub water_intake: u32,
    /// Time of the last update (unix ms)
    pub timestamp: i64,
}

impl Default for HealthData {
    fn default() -> Self {
        Self {
            steps: 4320,
            heart_rate: 72,
            sleep_hours: 6.5,
            water_intake: 1200,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl HealthData {
    /// Apply a partial update, stamping a new timestamp
    pub fn merged(&self, update: &HealthUpdate) -> Self {
        Self {
            steps: update.steps.unwrap_or(self.steps),
            heart_rate: update.heart_rate.unwrap_or(self.heart_rate),
            sleep_hours: update.sleep_hours.unwrap_or(self.sleep_hours),
            water_intake: update.water_intake.unwrap_or(self.water_intake),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Step progress toward the goal in percent, capped at 100
    pub fn step_progress(&self, profile: &UserProfile) -> f64 {
        if profile.step_goal == 0 {
            return 100.0;
        }
        (f64::from(self.steps) / f64::from(profile.step_goal) * 100.0).min(100.0)
    }
}

/// Partial health update; absent fields keep their previous value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_intake: Option<u32>,
}

impl HealthUpdate {
    pub fn is_empty(&self) -> bool {
        self.steps.is_none() && self.heart_rate.is_none() && self.sleep_hours.is_none() && self.water_intake.is_none()
    }
}
