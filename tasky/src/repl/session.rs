//! REPL session: goal submission plus slash commands over the state controller

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use eyre::{Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{HealthUpdate, IdResolver, Priority, Task, Theme, short_id};
use crate::planner::PlanGenerator;
use crate::state::{AppState, StateEvent, StateManager};
use crate::view;
use crate::voice::{PcmReaderSource, PcmWriterSink, SessionEnd, VoiceController};

/// What the caller should do after a line was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    Quit,
}

impl Outcome {
    fn say(text: impl Into<String>) -> Self {
        Self::Output(text.into())
    }
}

/// Interactive session
pub struct ReplSession {
    state: StateManager,
    generator: PlanGenerator,
    voice: VoiceController,
    voice_output: PathBuf,
    output_rate: u32,
}

impl ReplSession {
    pub fn new(
        state: StateManager,
        generator: PlanGenerator,
        voice: VoiceController,
        voice_output: PathBuf,
        output_rate: u32,
    ) -> Self {
        Self {
            state,
            generator,
            voice,
            voice_output,
            output_rate,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome().await?;
        let toasts = spawn_toast_printer(self.state.subscribe_events());

        let mut rl = DefaultEditor::new().map_err(|e| eyre!("Failed to initialize readline: {}", e))?;
        loop {
            let prompt = format!("{} ", ">".bright_green());
            let readline = tokio::task::block_in_place(|| rl.readline(&prompt));
            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.execute(input).await {
                        Ok(Outcome::Output(text)) => {
                            if !text.is_empty() {
                                println!("{}", text.trim_end());
                            }
                        }
                        Ok(Outcome::Quit) => break,
                        Err(e) => println!("{} {}", "Error:".red(), e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(eyre!("Readline error: {}", err)),
            }
        }

        if self.voice.is_active() {
            self.voice.deactivate().await;
        }
        toasts.abort();
        println!("Goodbye!");
        Ok(())
    }

    async fn print_welcome(&self) -> Result<()> {
        let snapshot = self.snapshot().await?;
        println!();
        println!("{}", "Tasky".bright_cyan().bold());
        println!("Hello, {}. Describe a goal to get three plans for it.", snapshot.profile.name);
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
        Ok(())
    }

    async fn snapshot(&self) -> Result<Arc<AppState>> {
        Ok(self.state.snapshot().await?)
    }

    /// Handle one line: slash commands, anything else is a goal
    pub async fn execute(&mut self, input: &str) -> Result<Outcome> {
        debug!(%input, "ReplSession::execute: called");
        let input = input.trim();
        let Some(command) = input.strip_prefix('/') else {
            return self.submit_goal(input).await;
        };

        let (cmd, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        let rest = rest.trim();
        match cmd {
            "help" | "h" => Ok(Outcome::say(help_text())),
            "quit" | "q" | "exit" => Ok(Outcome::Quit),
            "sessions" => self.list_sessions().await,
            "session" | "s" => self.show_session(rest).await,
            "sync" => self.sync(rest).await,
            "tasks" | "t" => Ok(Outcome::say(view::task_board(&self.snapshot().await?.tasks))),
            "add" | "a" => self.add_task(rest).await,
            "done" | "d" => self.toggle_task(rest).await,
            "health" => {
                let snapshot = self.snapshot().await?;
                Ok(Outcome::say(view::health_summary(&snapshot.health, &snapshot.profile)))
            }
            "steps" => self.update_health(rest, |n, u| u.steps = Some(n)).await,
            "water" => self.update_health(rest, |n, u| u.water_intake = Some(n)).await,
            "profile" => self.profile(rest).await,
            "notifications" | "n" => self.notifications().await,
            "journal" | "j" => self.journal(rest).await,
            "voice" | "v" => self.toggle_voice(rest).await,
            _ => Ok(Outcome::say(format!(
                "{} Unknown command: /{}\nType {} for available commands",
                "?".yellow(),
                cmd,
                "/help".yellow()
            ))),
        }
    }

    async fn submit_goal(&self, goal: &str) -> Result<Outcome> {
        match self.generator.submit_goal(goal).await? {
            Some(session_id) => Ok(Outcome::say(format!(
                "Architecting three plans... ({} to view)",
                format!("/session {}", short_id(&session_id)).yellow()
            ))),
            // Busy or blank: ignored
            None => Ok(Outcome::say(String::new())),
        }
    }

    async fn list_sessions(&self) -> Result<Outcome> {
        let snapshot = self.snapshot().await?;
        if snapshot.sessions.is_empty() {
            return Ok(Outcome::say("No sessions yet.".dimmed().to_string()));
        }
        let current = snapshot.current_session_id.as_deref();
        let lines: Vec<String> = snapshot
            .sessions_newest_first()
            .map(|s| view::session_line(s, Some(s.id.as_str()) == current))
            .collect();
        Ok(Outcome::say(lines.join("\n")))
    }

    async fn show_session(&self, reference: &str) -> Result<Outcome> {
        if !reference.is_empty() {
            let snapshot = self.snapshot().await?;
            let id = resolve(snapshot.sessions.iter().map(|s| s.id.as_str()), reference, "session")?;
            self.state.select_session(&id).await?;
        }
        let snapshot = self.snapshot().await?;
        match snapshot.current_session() {
            Some(session) => Ok(Outcome::say(view::session_detail(session))),
            None => Ok(Outcome::say("No sessions yet.".dimmed().to_string())),
        }
    }

    async fn sync(&self, reference: &str) -> Result<Outcome> {
        if reference.is_empty() {
            return Ok(Outcome::say("Usage: /sync <plan-id>"));
        }
        let snapshot = self.snapshot().await?;
        let ids = snapshot.sessions.iter().flat_map(|s| s.artifacts.iter().map(|a| a.id.as_str()));
        let id = resolve(ids, reference, "plan")?;
        let copied = self.state.sync_artifact(&id).await?;
        Ok(Outcome::say(format!("Synced {} tasks to the board.", copied.len())))
    }

    async fn add_task(&self, rest: &str) -> Result<Outcome> {
        let (text, priority) = parse_task_text(rest);
        if text.is_empty() {
            return Ok(Outcome::say("Usage: /add <text> [!high|!medium|!low]"));
        }
        let task = self.state.add_task(Task::new(text).with_priority(priority)).await?;
        Ok(Outcome::say(view::task_line(&task)))
    }

    async fn toggle_task(&self, reference: &str) -> Result<Outcome> {
        if reference.is_empty() {
            return Ok(Outcome::say("Usage: /done <task-id>"));
        }
        let snapshot = self.snapshot().await?;
        let id = resolve(snapshot.tasks.iter().map(|t| t.id.as_str()), reference, "task")?;
        let task = self.state.toggle_task(&id).await?;
        Ok(Outcome::say(view::task_line(&task)))
    }

    async fn update_health(&self, value: &str, apply: impl FnOnce(u32, &mut HealthUpdate)) -> Result<Outcome> {
        let n: u32 = value.parse().map_err(|_| eyre!("Expected a whole number, got '{}'", value))?;
        let mut update = HealthUpdate::default();
        apply(n, &mut update);
        self.state.update_health(update).await?;
        let snapshot = self.snapshot().await?;
        Ok(Outcome::say(view::health_summary(&snapshot.health, &snapshot.profile)))
    }

    async fn profile(&self, rest: &str) -> Result<Outcome> {
        let snapshot = self.snapshot().await?;
        if rest.is_empty() {
            return Ok(Outcome::say(view::profile_summary(&snapshot.profile)));
        }
        let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let value = value.trim();
        let mut profile = snapshot.profile.clone();
        match field {
            "name" if !value.is_empty() => profile.name = value.to_string(),
            "steps" => profile.step_goal = value.parse().map_err(|_| eyre!("Invalid step goal: {}", value))?,
            "water" => profile.water_goal = value.parse().map_err(|_| eyre!("Invalid water goal: {}", value))?,
            "sleep" => profile.sleep_goal = value.parse().map_err(|_| eyre!("Invalid sleep goal: {}", value))?,
            "theme" => profile.theme = value.parse::<Theme>().map_err(|e| eyre!(e))?,
            _ => return Ok(Outcome::say("Usage: /profile [name|steps|water|sleep|theme <value>]")),
        }
        self.state.update_profile(profile.clone()).await?;
        Ok(Outcome::say(view::profile_summary(&profile)))
    }

    async fn notifications(&self) -> Result<Outcome> {
        let snapshot = self.snapshot().await?;
        let history = snapshot.notifications.history();
        if history.is_empty() {
            return Ok(Outcome::say("No notifications.".dimmed().to_string()));
        }
        let mut lines = vec![format!(
            "{} ({} active)",
            "Notifications".bright_cyan().bold(),
            snapshot.notifications.active().len()
        )];
        lines.extend(history.iter().rev().map(|n| {
            format!("  {}  {}", view::timestamp(n.timestamp).dimmed(), view::notification_line(n))
        }));
        Ok(Outcome::say(lines.join("\n")))
    }

    async fn journal(&self, content: &str) -> Result<Outcome> {
        if !content.is_empty() {
            self.state.archive_note(content).await?;
        }
        let snapshot = self.snapshot().await?;
        if snapshot.journal.is_empty() {
            return Ok(Outcome::say("Journal is empty. /journal <text> adds a note.".dimmed().to_string()));
        }
        let lines: Vec<String> = snapshot.journal.iter().map(view::journal_line).collect();
        Ok(Outcome::say(lines.join("\n")))
    }

    async fn toggle_voice(&mut self, rest: &str) -> Result<Outcome> {
        if self.voice.is_active() {
            return match self.voice.deactivate().await {
                Some(Ok(summary)) => Ok(Outcome::say(format!(
                    "Voice off. {} tool calls, {:.1}s of audio.",
                    summary.tool_calls, summary.audio_seconds
                ))),
                Some(Err(e)) => Ok(Outcome::say(format!("Voice off ({}).", e))),
                None => Ok(Outcome::say("Voice off.")),
            };
        }

        // A session that ended on its own is reaped here
        if let Some(result) = self.voice.deactivate().await {
            match result {
                Ok(summary) if summary.end == SessionEnd::Closed => debug!("previous voice session closed by service"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "previous voice session failed"),
            }
        }

        let mut args = rest.split_whitespace();
        let Some(input) = args.next() else {
            return Ok(Outcome::say("Usage: /voice <pcm-input> [pcm-output]"));
        };
        let output = args.next().map(PathBuf::from).unwrap_or_else(|| self.voice_output.clone());
        let sink = PcmWriterSink::create(&output, self.output_rate)?;
        self.voice
            .activate(Box::new(PcmReaderSource::from_path(input)), Box::new(sink))
            .await?;
        Ok(Outcome::say(format!(
            "Voice on. Listening on {}, replies go to {}. /voice again to stop.",
            input,
            output.display()
        )))
    }
}

/// Resolve a short id against candidates, with a readable error
fn resolve<'a>(ids: impl IntoIterator<Item = &'a str>, reference: &str, what: &str) -> Result<String> {
    match IdResolver::new(ids).resolve(reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(eyre!("No {} matches '{}'", what, reference)),
        Err(candidates) => Err(eyre!(
            "'{}' matches {} {}s: {}",
            reference,
            candidates.len(),
            what,
            candidates.iter().map(|c| short_id(c)).collect::<Vec<_>>().join(", ")
        )),
    }
}

/// Split a trailing `!priority` marker off task text
fn parse_task_text(rest: &str) -> (&str, Priority) {
    match rest.rsplit_once(char::is_whitespace) {
        Some((text, marker)) if marker.starts_with('!') && marker.len() > 1 => {
            (text.trim(), Priority::from_label(&marker[1..]))
        }
        _ => (rest.trim(), Priority::default()),
    }
}

fn spawn_toast_printer(mut events: broadcast::Receiver<StateEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StateEvent::Notified(notification)) => {
                    println!("\r{}", view::notification_line(&notification));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "toast printer lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn help_text() -> String {
    let rows = [
        ("<goal>", "Generate three plans for a goal"),
        ("/sessions", "List goal sessions, newest first"),
        ("/session [id]", "Show (and select) a session"),
        ("/sync <plan-id>", "Copy a plan's tasks onto the board"),
        ("/tasks", "Show the task board"),
        ("/add <text> [!p]", "Add a task (priority !high, !medium, !low)"),
        ("/done <task-id>", "Toggle a task's completion"),
        ("/health", "Show health stats"),
        ("/steps <n>", "Set today's step count"),
        ("/water <ml>", "Set today's water intake"),
        ("/profile [k v]", "Show or edit the profile"),
        ("/notifications", "Show notification history"),
        ("/journal [text]", "Archive a note, or list the journal"),
        ("/voice <in> [out]", "Toggle the voice session (raw PCM files)"),
        ("/quit", "Exit"),
    ];
    let mut out = format!("{}\n", "Available Commands:".bright_cyan());
    for (cmd, desc) in rows {
        out.push_str(&format!("  {:20} {}\n", cmd.yellow(), desc));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::llm::client::mock::MockLlmClient;
    use crate::planner::GeneratorOptions;
    use crate::prompts::PromptLoader;
    use crate::state::StateOptions;
    use crate::voice::{LiveConnector, LiveTransport, VoiceError};
    use crate::config::VoiceConfig;

    struct NoConnector;

    #[async_trait::async_trait]
    impl LiveConnector for NoConnector {
        async fn connect(&self) -> std::result::Result<Box<dyn LiveTransport>, VoiceError> {
            Err(VoiceError::Transport("offline".to_string()))
        }
    }

    fn setup() -> (ReplSession, StateManager, TempDir) {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let state = StateManager::spawn(dir.path().join("store"), StateOptions::default()).unwrap();
        let prompts = Arc::new(PromptLoader::embedded_only());
        let generator = PlanGenerator::new(
            Arc::new(MockLlmClient::new(vec![])),
            state.clone(),
            prompts.clone(),
            GeneratorOptions::default(),
        );
        let voice = VoiceController::new(state.clone(), Arc::new(NoConnector), prompts, VoiceConfig::default());
        let session = ReplSession::new(state.clone(), generator, voice, dir.path().join("out.pcm"), 24_000);
        (session, state, dir)
    }

    fn output(outcome: Outcome) -> String {
        match outcome {
            Outcome::Output(text) => text,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_parse_task_text() {
        assert_eq!(parse_task_text("Buy milk !high"), ("Buy milk", Priority::High));
        assert_eq!(parse_task_text("Buy milk"), ("Buy milk", Priority::Medium));
        assert_eq!(parse_task_text("Wow !"), ("Wow !", Priority::Medium));
    }

    #[tokio::test]
    async fn test_add_and_toggle_by_short_id() {
        let (mut repl, state, _dir) = setup();
        let out = output(repl.execute("/add Buy milk !low").await.unwrap());
        assert!(out.contains("Buy milk"));

        let snapshot = state.snapshot().await.unwrap();
        let task = &snapshot.tasks[0];
        assert_eq!(task.priority, Priority::Low);

        let out = output(repl.execute(&format!("/done {}", short_id(&task.id))).await.unwrap());
        assert!(out.starts_with("[x]"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_errors() {
        let (mut repl, _state, _dir) = setup();
        assert!(repl.execute("/done nothing-like-this").await.is_err());
        assert!(repl.execute("/sync nope").await.is_err());
    }

    #[tokio::test]
    async fn test_health_and_profile_commands() {
        let (mut repl, state, _dir) = setup();
        repl.execute("/steps 8000").await.unwrap();
        repl.execute("/water 1500").await.unwrap();
        repl.execute("/profile name Ada").await.unwrap();
        assert!(repl.execute("/steps lots").await.is_err());

        let snapshot = state.snapshot().await.unwrap();
        assert_eq!(snapshot.health.steps, 8000);
        assert_eq!(snapshot.health.water_intake, 1500);
        assert_eq!(snapshot.profile.name, "Ada");
    }

    #[tokio::test]
    async fn test_journal_and_notifications() {
        let (mut repl, _state, _dir) = setup();
        let out = output(repl.execute("/journal Shipped it").await.unwrap());
        assert!(out.contains("Shipped it"));

        let out = output(repl.execute("/notifications").await.unwrap());
        assert!(out.contains("Note archived."));
    }

    #[tokio::test]
    async fn test_voice_failure_leaves_voice_off() {
        let (mut repl, _state, dir) = setup();
        let mic = dir.path().join("mic.pcm");
        std::fs::write(&mic, []).unwrap();

        let result = repl.execute(&format!("/voice {}", mic.display())).await;
        assert!(result.is_err());
        assert!(!repl.voice.is_active());
    }

    #[tokio::test]
    async fn test_quit_help_and_unknown() {
        let (mut repl, _state, _dir) = setup();
        assert_eq!(repl.execute("/quit").await.unwrap(), Outcome::Quit);
        assert!(output(repl.execute("/help").await.unwrap()).contains("/sync"));
        assert!(output(repl.execute("/bogus").await.unwrap()).contains("Unknown command"));
    }

    #[tokio::test]
    async fn test_blank_goal_is_ignored() {
        let (mut repl, state, _dir) = setup();
        assert_eq!(repl.execute("   ").await.unwrap(), Outcome::Output(String::new()));
        assert!(state.snapshot().await.unwrap().sessions.is_empty());
    }
}
