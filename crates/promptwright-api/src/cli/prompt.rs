//! Prompt inspection CLI commands: show, history, pending, versions, set.
//!
//! Read-only views over the durable prompt record, plus `set` for seeding a
//! prompt by hand. Manual edits are versioned like regenerations so the
//! version list stays a complete log of what the bot was told.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use promptwright_core::repository::prompt::PromptRecordRepository;
use promptwright_types::training::PromptChangeReason;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum PromptCommand {
    /// Show the current prompt and training counters.
    Show {
        /// Prompt record to inspect (defaults to `default_user_id`).
        #[arg(long)]
        user: Option<String>,
    },

    /// List every modification ever recorded, oldest first.
    History {
        #[arg(long)]
        user: Option<String>,
    },

    /// List modifications waiting for the next regeneration.
    Pending {
        #[arg(long)]
        user: Option<String>,
    },

    /// List prompt versions, newest first.
    Versions {
        #[arg(long)]
        user: Option<String>,
    },

    /// Replace the prompt with the contents of a file.
    Set {
        /// File holding the new prompt text.
        file: PathBuf,

        #[arg(long)]
        user: Option<String>,
    },
}

/// Dispatch a `pwright prompt ...` command.
pub async fn run(state: &AppState, action: PromptCommand, json: bool) -> Result<()> {
    match action {
        PromptCommand::Show { user } => show_prompt(state, user, json).await,
        PromptCommand::History { user } => prompt_history(state, user, json).await,
        PromptCommand::Pending { user } => pending_modifications(state, user, json).await,
        PromptCommand::Versions { user } => prompt_versions(state, user, json).await,
        PromptCommand::Set { file, user } => set_prompt(state, &file, user, json).await,
    }
}

/// Print the current prompt.
///
/// # Examples
///
/// ```bash
/// pwright prompt show --user 5491122334455
/// ```
pub async fn show_prompt(state: &AppState, user: Option<String>, json: bool) -> Result<()> {
    let user_id = state.user_or_default(user);
    let record = state.prompts.get_or_create(&user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!();
    println!("  Prompt for '{}'", style(&user_id).cyan().bold());
    println!();
    if record.prompt.is_empty() {
        println!("  {}", style("(empty)").dim());
    } else {
        for line in record.prompt.lines() {
            println!("  {line}");
        }
    }
    println!();
    println!(
        "  {}  {} pending, {} recorded, {} failed regenerations",
        style("Training:").bold(),
        style(record.pending_modifications.len()).cyan(),
        record.history.len(),
        record.flush_failures
    );
    println!(
        "  {}  {}",
        style("Updated:").bold(),
        style(format_relative_time(&record.updated_at)).dim()
    );
    println!();
    Ok(())
}

/// Print the append-only modification history.
pub async fn prompt_history(state: &AppState, user: Option<String>, json: bool) -> Result<()> {
    let user_id = state.user_or_default(user);
    let record = state.prompts.get_or_create(&user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record.history)?);
        return Ok(());
    }

    if record.history.is_empty() {
        print_empty(&format!("No modifications recorded for '{user_id}'"));
        return Ok(());
    }

    let mut table = new_table(&["#", "Type", "Description", "Recorded"]);
    for (index, entry) in record.history.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1).fg(Color::DarkGrey),
            Cell::new(&entry.modification.modification_type).fg(Color::Cyan),
            Cell::new(&entry.modification.description),
            Cell::new(format_relative_time(&entry.recorded_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Modification history for '{}'", style(&user_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Print the pending batch, most recent first.
pub async fn pending_modifications(
    state: &AppState,
    user: Option<String>,
    json: bool,
) -> Result<()> {
    let user_id = state.user_or_default(user);
    let record = state.prompts.get_or_create(&user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record.pending_modifications)?);
        return Ok(());
    }

    if record.pending_modifications.is_empty() {
        print_empty(&format!("Nothing pending for '{user_id}'"));
        return Ok(());
    }

    let mut table = new_table(&["Type", "Description"]);
    for modification in &record.pending_modifications {
        table.add_row(vec![
            Cell::new(&modification.modification_type).fg(Color::Cyan),
            Cell::new(&modification.description),
        ]);
    }

    let threshold = state.config.training.flush_threshold.max(1);
    println!();
    println!(
        "  {} of {} modifications pending for '{}'",
        style(record.pending_modifications.len()).cyan().bold(),
        threshold,
        style(&user_id).cyan()
    );
    if record.flush_failures > 0 {
        println!(
            "  {} {} consecutive regeneration failures",
            style("!").yellow().bold(),
            record.flush_failures
        );
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Print the prompt version log, newest first.
pub async fn prompt_versions(state: &AppState, user: Option<String>, json: bool) -> Result<()> {
    let user_id = state.user_or_default(user);
    let versions = state.prompts.list_versions(&user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        print_empty(&format!("No prompt versions for '{user_id}'"));
        return Ok(());
    }

    let mut table = new_table(&["Version", "Reason", "Modifications", "Created", "Preview"]);
    for v in versions.iter().rev() {
        table.add_row(vec![
            Cell::new(format!("v{}", v.version)).fg(Color::Cyan),
            Cell::new(v.reason),
            Cell::new(v.modifications_applied),
            Cell::new(format_relative_time(&v.created_at)).fg(Color::DarkGrey),
            Cell::new(preview(&v.prompt, 60)),
        ]);
    }

    println!();
    println!("  Prompt versions for '{}'", style(&user_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Replace the prompt with a file's contents.
///
/// # Examples
///
/// ```bash
/// pwright prompt set restaurant.txt
/// ```
pub async fn set_prompt(
    state: &AppState,
    file: &std::path::Path,
    user: Option<String>,
    json: bool,
) -> Result<()> {
    let user_id = state.user_or_default(user);
    let content = tokio::fs::read_to_string(file).await?;
    let content = content.trim();
    if content.is_empty() {
        anyhow::bail!("{} is empty; refusing to clear the prompt", file.display());
    }

    let version = state
        .prompts
        .update_prompt(&user_id, content, PromptChangeReason::Manual, 0)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&version)?);
    } else {
        println!(
            "  {} Prompt for '{}' updated: version {}",
            style("ok").green().bold(),
            style(&user_id).cyan(),
            style(version.version).cyan()
        );
    }
    Ok(())
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_empty(message: &str) {
    println!();
    println!("  {} {message}", style("i").blue().bold());
    println!();
}

/// First line of `text`, cut to `max_chars` characters.
fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now() - *dt;

    if diff.num_seconds() < 60 {
        "just now".to_string()
    } else if diff.num_minutes() < 60 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
