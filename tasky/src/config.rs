//! Tasky configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Tasky configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Notification timing
    pub notifications: NotificationConfig,

    /// Plan generation behavior
    pub generation: GenerationConfig,

    /// Live voice session configuration
    pub voice: VoiceConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set.
    /// Call this before any AI request to fail fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tasky.yml
        let local_config = PathBuf::from(".tasky.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tasky/tasky.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tasky").join("tasky.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: the full `load` reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(PathBuf::from(".tasky.yml")),
            dirs::config_dir().map(|d| d.join("tasky").join("tasky.yml")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("gemini" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries for transient HTTP failures (0 = fail on first error)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-3-pro-preview".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted slices
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tasky on Linux)
        let dir = dirs::data_local_dir()
            .map(|d| d.join("tasky"))
            .unwrap_or_else(|| PathBuf::from(".tasky"));
        Self { dir }
    }
}

/// Notification timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long a toast stays active, measured from creation
    #[serde(rename = "toast-ttl-ms")]
    pub toast_ttl_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { toast_ttl_ms: 5000 }
    }
}

/// Plan generation behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Move artifacts whose response failed to parse to `error` instead of
    /// leaving them `streaming`
    #[serde(rename = "mark-failed-artifacts")]
    pub mark_failed_artifacts: bool,

    /// Directory with prompt template overrides (`*.pmt`)
    #[serde(rename = "prompts-dir", skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

impl GenerationConfig {
    /// Where prompt overrides are looked up: the configured directory, else `~/.config/tasky/prompts`
    pub fn prompt_overrides_dir(&self) -> Option<PathBuf> {
        self.prompts_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("tasky").join("prompts")))
    }
}

/// Live voice session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Live model identifier
    pub model: String,

    /// WebSocket endpoint of the live service
    pub url: String,

    /// Microphone sample rate (Hz)
    #[serde(rename = "input-sample-rate")]
    pub input_sample_rate: u32,

    /// Playback sample rate (Hz)
    #[serde(rename = "output-sample-rate")]
    pub output_sample_rate: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
        }
    }
}
