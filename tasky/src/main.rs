//! Tasky - AI day planner
//!
//! CLI entry point: one-shot commands, or the interactive REPL.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use tasky::cli::{Cli, Command, TaskCommand};
use tasky::config::Config;
use tasky::domain::{HealthUpdate, IdResolver, Priority, Task, short_id};
use tasky::llm::create_client;
use tasky::planner::PlanGenerator;
use tasky::prompts::PromptLoader;
use tasky::state::StateManager;
use tasky::view;
use tasky::voice::{AudioSink, AudioSource, PcmReaderSource, PcmWriterSink, VoiceController, WsConnector};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasky")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        None | Some("INFO") => tracing::Level::INFO,
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN" | "WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("tasky.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level from config file before the full load, so the load itself is logged
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Tasky loaded config: provider={}, model={}, storage={}",
        config.llm.provider,
        config.llm.model,
        config.storage.dir.display()
    );

    let state = StateManager::spawn(&config.storage.dir, (&config).into()).context("Failed to start state manager")?;

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        None => cmd_repl(&config, &state).await,
        Some(Command::Plan { goal }) => cmd_plan(&config, &state, &goal.join(" ")).await,
        Some(Command::Sessions) => cmd_sessions(&state).await,
        Some(Command::Show { session }) => cmd_show(&state, session.as_deref()).await,
        Some(Command::Sync { plan }) => cmd_sync(&state, &plan).await,
        Some(Command::Tasks) => cmd_tasks(&state).await,
        Some(Command::Task { command }) => cmd_task(&state, command).await,
        Some(Command::Health {
            steps,
            water,
            sleep,
            heart_rate,
        }) => {
            let update = HealthUpdate {
                steps,
                heart_rate,
                sleep_hours: sleep,
                water_intake: water,
            };
            cmd_health(&state, update).await
        }
        Some(Command::Profile {
            name,
            step_goal,
            sleep_goal,
            water_goal,
            theme,
        }) => cmd_profile(&state, name, step_goal, sleep_goal, water_goal, theme).await,
        Some(Command::Voice { input, output }) => cmd_voice(&config, &state, &input, &output).await,
        Some(Command::Notes { text }) => cmd_notes(&state, &text.join(" ")).await,
    };

    state.shutdown().await.ok();
    result
}

fn prompt_loader(config: &Config) -> Arc<PromptLoader> {
    Arc::new(PromptLoader::new(config.generation.prompt_overrides_dir().as_deref()))
}

fn plan_generator(config: &Config, state: &StateManager, prompts: Arc<PromptLoader>) -> Result<PlanGenerator> {
    config.validate()?;
    let llm = create_client(&config.llm).map_err(|e| eyre!("Failed to create LLM client: {}", e))?;
    Ok(PlanGenerator::new(llm, state.clone(), prompts, config.into()))
}

fn voice_controller(config: &Config, state: &StateManager, prompts: Arc<PromptLoader>) -> Result<VoiceController> {
    let connector = WsConnector::new(&config.voice.url, config.llm.api_key()?);
    Ok(VoiceController::new(
        state.clone(),
        Arc::new(connector),
        prompts,
        config.voice.clone(),
    ))
}

fn resolve_id<'a>(ids: impl IntoIterator<Item = &'a str>, reference: &str, what: &str) -> Result<String> {
    match IdResolver::new(ids).resolve(reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(eyre!("No {} matches '{}'", what, reference)),
        Err(candidates) => Err(eyre!(
            "'{}' is ambiguous: {}",
            reference,
            candidates.iter().map(|c| short_id(c)).collect::<Vec<_>>().join(", ")
        )),
    }
}

async fn cmd_repl(config: &Config, state: &StateManager) -> Result<()> {
    let prompts = prompt_loader(config);
    let generator = plan_generator(config, state, prompts.clone())?;
    let voice = voice_controller(config, state, prompts)?;
    tasky::repl::run_interactive(config, state.clone(), generator, voice).await
}

async fn cmd_plan(config: &Config, state: &StateManager, goal: &str) -> Result<()> {
    let generator = plan_generator(config, state, prompt_loader(config))?;
    println!("Architecting three plans for: {}", goal.bold());

    let Some(report) = generator.run_goal(goal).await? else {
        println!("{}", "Nothing to do: the goal is empty or a generation is already running.".dimmed());
        return Ok(());
    };

    let snapshot = state.snapshot().await?;
    if let Some(session) = snapshot.session(&report.session_id) {
        println!();
        print!("{}", view::session_detail(session));
    }
    println!();
    println!("{}", view::notification_line(&report.notification));
    Ok(())
}

async fn cmd_sessions(state: &StateManager) -> Result<()> {
    let snapshot = state.snapshot().await?;
    if snapshot.sessions.is_empty() {
        println!("No sessions yet. Try: tasky plan \"Plan my Monday\"");
        return Ok(());
    }
    let current = snapshot.current_session_id.as_deref();
    for session in snapshot.sessions_newest_first() {
        println!("{}", view::session_line(session, Some(session.id.as_str()) == current));
    }
    Ok(())
}

async fn cmd_show(state: &StateManager, reference: Option<&str>) -> Result<()> {
    if let Some(reference) = reference {
        let snapshot = state.snapshot().await?;
        let id = resolve_id(snapshot.sessions.iter().map(|s| s.id.as_str()), reference, "session")?;
        state.select_session(&id).await?;
    }
    let snapshot = state.snapshot().await?;
    match snapshot.current_session() {
        Some(session) => print!("{}", view::session_detail(session)),
        None => println!("No sessions yet."),
    }
    Ok(())
}

async fn cmd_sync(state: &StateManager, reference: &str) -> Result<()> {
    let snapshot = state.snapshot().await?;
    let ids = snapshot.sessions.iter().flat_map(|s| s.artifacts.iter().map(|a| a.id.as_str()));
    let id = resolve_id(ids, reference, "plan")?;
    let copied = state.sync_artifact(&id).await?;
    println!("Synced {} tasks to the board.", copied.len());
    for task in &copied {
        println!("  {}", view::task_line(task));
    }
    Ok(())
}

async fn cmd_tasks(state: &StateManager) -> Result<()> {
    let snapshot = state.snapshot().await?;
    print!("{}", view::task_board(&snapshot.tasks));
    Ok(())
}

async fn cmd_task(state: &StateManager, command: TaskCommand) -> Result<()> {
    let task = match command {
        TaskCommand::Add {
            text,
            priority,
            estimate,
            due,
        } => {
            let mut task = Task::new(text.join(" ")).with_priority(Priority::from_label(&priority));
            if let Some(estimate) = estimate {
                task = task.with_estimated_time(estimate);
            }
            if let Some(due) = due {
                task = task.with_due_date(due);
            }
            state.add_task(task).await?
        }
        TaskCommand::Toggle { id } => {
            let snapshot = state.snapshot().await?;
            let id = resolve_id(snapshot.tasks.iter().map(|t| t.id.as_str()), &id, "task")?;
            state.toggle_task(&id).await?
        }
    };
    println!("{}", view::task_line(&task));
    Ok(())
}

async fn cmd_health(state: &StateManager, update: HealthUpdate) -> Result<()> {
    if !update.is_empty() {
        state.update_health(update).await?;
    }
    let snapshot = state.snapshot().await?;
    print!("{}", view::health_summary(&snapshot.health, &snapshot.profile));
    Ok(())
}

async fn cmd_profile(
    state: &StateManager,
    name: Option<String>,
    step_goal: Option<u32>,
    sleep_goal: Option<f64>,
    water_goal: Option<u32>,
    theme: Option<String>,
) -> Result<()> {
    let snapshot = state.snapshot().await?;
    let mut profile = snapshot.profile.clone();
    if let Some(name) = name {
        profile.name = name;
    }
    if let Some(goal) = step_goal {
        profile.step_goal = goal;
    }
    if let Some(goal) = sleep_goal {
        profile.sleep_goal = goal;
    }
    if let Some(goal) = water_goal {
        profile.water_goal = goal;
    }
    if let Some(theme) = theme {
        profile.theme = theme.parse().map_err(|e: String| eyre!(e))?;
    }
    if profile != snapshot.profile {
        state.update_profile(profile.clone()).await?;
    }
    print!("{}", view::profile_summary(&profile));
    Ok(())
}

async fn cmd_voice(config: &Config, state: &StateManager, input: &str, output: &str) -> Result<()> {
    let mut controller = voice_controller(config, state, prompt_loader(config))?;

    let source: Box<dyn AudioSource> = match input {
        "-" => Box::new(PcmReaderSource::stdin()),
        path => Box::new(PcmReaderSource::from_path(path)),
    };
    let rate = config.voice.output_sample_rate;
    let sink: Box<dyn AudioSink> = match output {
        "-" => Box::new(PcmWriterSink::stdout(rate)),
        path => Box::new(PcmWriterSink::create(path, rate)?),
    };

    // stdout may carry audio, so status goes to stderr
    controller.activate(source, sink).await?;
    eprintln!("Voice session active. Ctrl-C to stop.");

    let result = tokio::select! {
        result = controller.wait() => result,
        _ = tokio::signal::ctrl_c() => controller.deactivate().await,
    };
    match result {
        Some(Ok(summary)) => {
            eprintln!(
                "Voice session ended ({:?}): {} tool calls, {} frames sent, {:.1}s of audio",
                summary.end, summary.tool_calls, summary.frames_sent, summary.audio_seconds
            );
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}

async fn cmd_notes(state: &StateManager, text: &str) -> Result<()> {
    if !text.trim().is_empty() {
        state.archive_note(text).await?;
    }
    let snapshot = state.snapshot().await?;
    if snapshot.journal.is_empty() {
        println!("Journal is empty.");
    }
    for entry in &snapshot.journal {
        println!("{}", view::journal_line(entry));
    }
    Ok(())
}
