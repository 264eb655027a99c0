//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for the per-style plan request
#[derive(Debug, Clone, Serialize)]
pub struct PlanPromptContext<'a> {
    pub name: &'a str,
    pub goal: &'a str,
    pub style: &'a str,
}

/// Context for the live voice system instruction
#[derive(Debug, Clone, Serialize)]
pub struct VoicePromptContext<'a> {
    pub name: &'a str,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (`{name}.pmt` files)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that prefers templates from `user_dir`
    pub fn new(user_dir: Option<&Path>) -> Self {
        debug!(?user_dir, "PromptLoader::new: called");
        let user_dir = user_dir.filter(|d| d.exists()).map(Path::to_path_buf);
        if user_dir.is_none() {
            debug!("PromptLoader::new: no user override directory");
        }
        Self {
            hbs: Self::engine(),
            user_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    // Prompts are plain text, not HTML
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `{user_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// System instruction for plan generation
    pub fn plan_system(&self) -> Result<String> {
        self.render("plan-system", &serde_json::json!({}))
    }

    /// User turn for one plan style
    pub fn plan_user(&self, context: &PlanPromptContext<'_>) -> Result<String> {
        self.render("plan-user", context)
    }

    /// System instruction for a live voice session
    pub fn voice_system(&self, context: &VoicePromptContext<'_>) -> Result<String> {
        self.render("voice-system", context)
    }
}
