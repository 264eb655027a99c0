//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tasky - AI day planner
#[derive(Parser)]
#[command(
    name = "tasky",
    about = "AI day planner: three plans per goal, a task board, health stats and a voice assistant",
    version,
    after_help = "Without a subcommand tasky starts the interactive REPL.\nLogs are written to: ~/.local/share/tasky/logs/tasky.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate three plans for a goal and wait for them
    Plan {
        /// The goal, e.g. "Plan my Monday"
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,
    },

    /// List goal sessions, newest first
    Sessions,

    /// Show a session's plans (the current session by default)
    Show {
        /// Session id or unique part of it
        session: Option<String>,
    },

    /// Copy a plan's tasks onto the task board
    Sync {
        /// Plan (artifact) id or unique part of it
        plan: String,
    },

    /// Show the task board
    Tasks,

    /// Add or toggle tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Show or update health stats
    Health {
        /// Today's step count
        #[arg(long)]
        steps: Option<u32>,

        /// Water intake in ml
        #[arg(long)]
        water: Option<u32>,

        /// Hours slept
        #[arg(long)]
        sleep: Option<f64>,

        /// Resting heart rate
        #[arg(long)]
        heart_rate: Option<u32>,
    },

    /// Show or update the profile
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        step_goal: Option<u32>,

        #[arg(long)]
        sleep_goal: Option<f64>,

        #[arg(long)]
        water_goal: Option<u32>,

        /// light, dark or glass
        #[arg(long)]
        theme: Option<String>,
    },

    /// Run a voice session over raw 16-bit PCM until Ctrl-C or the service hangs up
    Voice {
        /// Microphone PCM ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Reply PCM ("-" for stdout)
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// Archive a journal note, or list the journal
    Notes {
        /// Note text; lists the journal when omitted
        text: Vec<String>,
    },
}

/// Task board subcommands
#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Add a task to the top of the board
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Estimated time, e.g. "30m"
        #[arg(short, long)]
        estimate: Option<String>,

        /// Due date (defaults to "Today")
        #[arg(short, long)]
        due: Option<String>,
    },

    /// Toggle a task's completion
    Toggle {
        /// Task id or unique part of it
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["tasky"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_plan_joins_words() {
        let cli = Cli::parse_from(["tasky", "plan", "Plan", "my", "Monday"]);
        match cli.command {
            Some(Command::Plan { goal }) => assert_eq!(goal.join(" "), "Plan my Monday"),
            other => panic!("Expected Plan command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_task_add() {
        let cli = Cli::parse_from(["tasky", "task", "add", "Buy", "milk", "-p", "high", "--due", "Tomorrow"]);
        match cli.command {
            Some(Command::Task {
                command: TaskCommand::Add {
                    text, priority, due, ..
                },
            }) => {
                assert_eq!(text, vec!["Buy", "milk"]);
                assert_eq!(priority, "high");
                assert_eq!(due.as_deref(), Some("Tomorrow"));
            }
            other => panic!("Expected Task Add, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_health() {
        let cli = Cli::parse_from(["tasky", "health", "--steps", "9000"]);
        assert!(matches!(
            cli.command,
            Some(Command::Health {
                steps: Some(9000),
                water: None,
                ..
            })
        ));
    }

    #[test]
    fn test_cli_voice_defaults_to_stdio() {
        let cli = Cli::parse_from(["tasky", "voice"]);
        match cli.command {
            Some(Command::Voice { input, output }) => {
                assert_eq!(input, "-");
                assert_eq!(output, "-");
            }
            other => panic!("Expected Voice, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["tasky", "tasks", "-c", "/path/to/config.yml", "--log-level", "debug"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_plan_requires_goal() {
        assert!(Cli::try_parse_from(["tasky", "plan"]).is_err());
    }
}
