//! PlanGenerator - turns one goal into three plan candidates
//!
//! One session per goal, one concurrent request per style. Each request
//! resolves its own slot through the state actor; the busy flag drops only
//! after every slot has settled.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::PlanError;
use super::response::{parse_plan, plan_response_schema};
use crate::config::Config;
use crate::domain::{AppNotification, NotificationKind, PLAN_STYLES, STYLE_COUNT, Session};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts::{PlanPromptContext, PromptLoader};
use crate::state::StateManager;

/// Notification after a generation with at least one reachable request
pub const ARCHITECTED_MESSAGE: &str = "New plans architected.";

/// Notification when every request failed to reach the service
pub const UNAVAILABLE_MESSAGE: &str = "AI Service unavailable.";

/// Generation tuning
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Token cap per plan request
    pub max_tokens: u32,
    /// Record failed slots as `error` instead of leaving them `streaming`
    pub mark_failed_artifacts: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            mark_failed_artifacts: false,
        }
    }
}

impl From<&Config> for GeneratorOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            mark_failed_artifacts: config.generation.mark_failed_artifacts,
        }
    }
}

/// How one slot ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Plan parsed and written
    Complete { task_count: usize },
    /// The service answered but the answer was not a usable plan
    Unparsable(String),
    /// The request itself failed (network, HTTP status, credentials)
    Unavailable(String),
}

impl SlotOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Result of a finished generation
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub session_id: String,
    /// Outcome per slot, in style order
    pub outcomes: Vec<SlotOutcome>,
    /// The single notification emitted at the end
    pub notification: AppNotification,
}

impl GenerationReport {
    /// True when no request reached the service
    pub fn all_unavailable(&self) -> bool {
        self.outcomes.iter().all(|o| matches!(o, SlotOutcome::Unavailable(_)))
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_complete()).count()
    }
}

/// Runs plan generations against an LLM, writing results through the state actor
#[derive(Clone)]
pub struct PlanGenerator {
    llm: Arc<dyn LlmClient>,
    state: StateManager,
    prompts: Arc<PromptLoader>,
    options: GeneratorOptions,
}

impl PlanGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        state: StateManager,
        prompts: Arc<PromptLoader>,
        options: GeneratorOptions,
    ) -> Self {
        debug!(?options, "PlanGenerator::new: called");
        Self {
            llm,
            state,
            prompts,
            options,
        }
    }

    /// Start a generation in the background
    ///
    /// Returns the new session id, or `None` when the prompt is blank or a
    /// generation is already in flight. Progress is visible only through
    /// state changes and notifications.
    pub async fn submit_goal(&self, prompt: &str) -> Result<Option<String>, PlanError> {
        debug!(%prompt, "submit_goal: called");
        Ok(self.start(prompt).await?.map(|(session, _handle)| session.id))
    }

    /// Run a generation and wait for every slot to settle
    pub async fn run_goal(&self, prompt: &str) -> Result<Option<GenerationReport>, PlanError> {
        debug!(%prompt, "run_goal: called");
        match self.start(prompt).await? {
            Some((_session, handle)) => Ok(Some(handle.await.map_err(|e| PlanError::Task(e.to_string()))??)),
            None => Ok(None),
        }
    }

    /// Render prompts, open the session, and spawn the workflow
    async fn start(
        &self,
        prompt: &str,
    ) -> Result<Option<(Session, JoinHandle<Result<GenerationReport, PlanError>>)>, PlanError> {
        let goal = prompt.trim();
        if goal.is_empty() {
            debug!("start: blank prompt ignored");
            return Ok(None);
        }

        // Render before touching state so a bad template never leaves us busy
        let snapshot = self.state.snapshot().await?;
        let system = self.prompts.plan_system().map_err(|e| PlanError::Prompt(e.to_string()))?;
        let users = PLAN_STYLES
            .iter()
            .map(|&style| {
                self.prompts
                    .plan_user(&PlanPromptContext {
                        name: &snapshot.profile.name,
                        goal,
                        style,
                    })
                    .map_err(|e| PlanError::Prompt(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(session) = self.state.begin_generation(goal).await? else {
            debug!("start: generation already in flight, ignored");
            return Ok(None);
        };
        info!(session_id = %session.id, %goal, "Plan generation started");

        let this = self.clone();
        let spawned = session.clone();
        let handle = tokio::spawn(async move { this.generate(spawned, system, users).await });
        Ok(Some((session, handle)))
    }

    /// Fan out one request per style, then settle the session
    async fn generate(
        self,
        session: Session,
        system: String,
        users: Vec<String>,
    ) -> Result<GenerationReport, PlanError> {
        debug!(session_id = %session.id, "generate: called");
        let session = Arc::new(session);

        let handles: Vec<_> = users
            .into_iter()
            .enumerate()
            .take(STYLE_COUNT)
            .map(|(slot, user)| {
                let this = self.clone();
                let session = Arc::clone(&session);
                let system = system.clone();
                tokio::spawn(async move { this.resolve_slot(&session, slot, system, user).await })
            })
            .collect();

        let outcomes: Vec<SlotOutcome> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| SlotOutcome::Unparsable(format!("slot task failed: {}", e))))
            .collect();

        let all_unavailable = outcomes.iter().all(|o| matches!(o, SlotOutcome::Unavailable(_)));
        let (message, kind) = if all_unavailable {
            warn!(session_id = %session.id, "Every plan request failed");
            (UNAVAILABLE_MESSAGE, NotificationKind::Overdue)
        } else {
            (ARCHITECTED_MESSAGE, NotificationKind::Success)
        };
        let notification = self.state.finish_generation(message, kind).await?;

        let report = GenerationReport {
            session_id: session.id.clone(),
            outcomes,
            notification,
        };
        info!(
            session_id = %report.session_id,
            completed = report.completed(),
            "Plan generation finished"
        );
        Ok(report)
    }

    /// Request, parse, and write back one slot
    async fn resolve_slot(&self, session: &Session, slot: usize, system: String, user: String) -> SlotOutcome {
        let style = PLAN_STYLES[slot];
        debug!(session_id = %session.id, %slot, %style, "resolve_slot: called");
        let request = CompletionRequest::single(system, user, self.options.max_tokens)
            .with_response_schema(plan_response_schema());

        let outcome = match self.llm.complete(request).await {
            Ok(response) => match response.content.as_deref().map(parse_plan) {
                Some(Ok(plan)) => {
                    let summary = plan.summary.clone();
                    let tasks = plan.into_tasks();
                    let task_count = tasks.len();
                    let artifact = session.artifacts[slot].resolved(summary, tasks);
                    match self.state.resolve_artifact(&session.id, slot, artifact).await {
                        Ok(()) => SlotOutcome::Complete { task_count },
                        Err(e) => {
                            error!(session_id = %session.id, %slot, error = %e, "Failed to store resolved plan");
                            SlotOutcome::Unparsable(e.to_string())
                        }
                    }
                }
                Some(Err(e)) => {
                    error!(session_id = %session.id, %slot, %style, error = %e, "Plan response did not parse");
                    SlotOutcome::Unparsable(e.to_string())
                }
                None => {
                    error!(session_id = %session.id, %slot, %style, "Plan response was empty");
                    SlotOutcome::Unparsable("empty response".to_string())
                }
            },
            Err(e) if e.is_unavailable() => {
                warn!(session_id = %session.id, %slot, %style, error = %e, "Plan request failed");
                SlotOutcome::Unavailable(e.to_string())
            }
            // The service answered, just not with anything usable
            Err(e) => {
                error!(session_id = %session.id, %slot, %style, error = %e, "Plan response unusable");
                SlotOutcome::Unparsable(e.to_string())
            }
        };

        if !outcome.is_complete() && self.options.mark_failed_artifacts {
            let failed = session.artifacts[slot].failed();
            if let Err(e) = self.state.resolve_artifact(&session.id, slot, failed).await {
                warn!(session_id = %session.id, %slot, error = %e, "Failed to mark artifact as failed");
            }
        }
        outcome
    }
}
