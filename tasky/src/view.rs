//! Terminal rendering shared by the REPL and the one-shot commands

use chrono::{Local, TimeZone};
use colored::{ColoredString, Colorize};

use crate::domain::{
    AppNotification, Artifact, ArtifactStatus, DailyLog, HealthData, NotificationKind, Priority, Session, Task,
    UserProfile, short_id,
};

/// Local wall-clock time for a unix-ms timestamp
pub fn timestamp(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".green(),
    }
}

pub fn task_line(task: &Task) -> String {
    let check = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let text = if task.completed {
        task.text.dimmed().strikethrough()
    } else {
        task.text.normal()
    };
    let mut details = vec![priority_label(task.priority).to_string()];
    details.extend(task.estimated_time.iter().cloned());
    details.extend(task.due_date.iter().cloned());
    format!(
        "{} {}  {}  ({})",
        check,
        short_id(&task.id).dimmed(),
        text,
        details.join(", ")
    )
}

pub fn task_board(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks.".dimmed().to_string();
    }
    let done = tasks.iter().filter(|t| t.completed).count();
    let mut out = format!("{} ({}/{} done)\n", "Task Board".bright_cyan().bold(), done, tasks.len());
    for task in tasks {
        out.push_str("  ");
        out.push_str(&task_line(task));
        out.push('\n');
    }
    out
}

fn status_label(status: ArtifactStatus) -> ColoredString {
    match status {
        ArtifactStatus::Streaming => "streaming".yellow(),
        ArtifactStatus::Complete => "complete".green(),
        ArtifactStatus::Error => "error".red(),
    }
}

pub fn session_line(session: &Session, current: bool) -> String {
    let marker = if current { "*".bright_green() } else { " ".normal() };
    let done = session.count_status(ArtifactStatus::Complete);
    format!(
        "{} {}  {}  {}  [{}/{} plans]",
        marker,
        short_id(&session.id).dimmed(),
        timestamp(session.timestamp),
        session.prompt,
        done,
        session.artifacts.len()
    )
}

pub fn artifact_detail(artifact: &Artifact, selected: bool) -> String {
    let marker = if selected { " (synced)".bright_green().to_string() } else { String::new() };
    let mut out = format!(
        "{} {} [{}]{}\n",
        artifact.style_name.bright_cyan().bold(),
        short_id(&artifact.id).dimmed(),
        status_label(artifact.status),
        marker
    );
    if !artifact.summary.is_empty() {
        out.push_str(&format!("  {}\n", artifact.summary.italic()));
    }
    for task in &artifact.tasks {
        out.push_str("    ");
        out.push_str(&task_line(task));
        out.push('\n');
    }
    out
}

pub fn session_detail(session: &Session) -> String {
    let mut out = format!("{} {}\n", "Goal:".bold(), session.prompt);
    for artifact in &session.artifacts {
        let selected = session.selected_plan_id.as_deref() == Some(artifact.id.as_str());
        out.push('\n');
        out.push_str(&artifact_detail(artifact, selected));
    }
    out
}

pub fn health_summary(health: &HealthData, profile: &UserProfile) -> String {
    format!(
        "{}\n  Steps:       {} / {} ({:.0}%)\n  Water:       {} / {} ml\n  Sleep:       {:.1} / {:.1} h\n  Heart rate:  {} bpm\n  Updated:     {}\n",
        "Health".bright_cyan().bold(),
        health.steps,
        profile.step_goal,
        health.step_progress(profile),
        health.water_intake,
        profile.water_goal,
        health.sleep_hours,
        profile.sleep_goal,
        health.heart_rate,
        timestamp(health.timestamp)
    )
}

pub fn profile_summary(profile: &UserProfile) -> String {
    format!(
        "{}\n  Name:        {}\n  Step goal:   {}\n  Sleep goal:  {:.1} h\n  Water goal:  {} ml\n  Theme:       {}\n",
        "Profile".bright_cyan().bold(),
        profile.name,
        profile.step_goal,
        profile.sleep_goal,
        profile.water_goal,
        profile.theme
    )
}

pub fn notification_line(notification: &AppNotification) -> String {
    let kind = match notification.kind {
        NotificationKind::Success => "success".green(),
        NotificationKind::Achievement => "achievement".bright_magenta(),
        NotificationKind::Overdue => "overdue".red(),
        NotificationKind::Reminder => "reminder".yellow(),
    };
    format!("[{}] {}", kind, notification.message)
}

pub fn journal_line(entry: &DailyLog) -> String {
    format!("{}  {}", timestamp(entry.timestamp).dimmed(), entry.content)
}
