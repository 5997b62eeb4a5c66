//! Interactive training loop.
//!
//! Feeds each terminal line to the training controller as an inbound message
//! for one conversation and prints the replies. Slash commands cover what a
//! chat transport would otherwise provide (voice notes, status).

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline_async::SharedWriter;
use tracing::info;

use promptwright_types::message::{AudioPayload, InboundMessage, TurnOutcome};
use promptwright_types::training::SessionId;

use crate::state::AppState;

use super::input::{InputEvent, TrainInput};

/// Slash commands understood by the loop.
#[derive(Debug, PartialEq, Eq)]
enum LoopCommand {
    Help,
    Exit,
    Status,
    Voice(PathBuf),
    Unknown(String),
}

fn parse_command(line: &str) -> Option<LoopCommand> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    Some(match name {
        "help" | "h" => LoopCommand::Help,
        "exit" | "quit" | "q" => LoopCommand::Exit,
        "status" => LoopCommand::Status,
        "voice" if !arg.is_empty() => LoopCommand::Voice(PathBuf::from(arg)),
        other => LoopCommand::Unknown(other.to_string()),
    })
}

/// MIME type for a voice-note file, from its extension.
fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        _ => "audio/ogg",
    }
}

/// Run the interactive training loop for one conversation.
///
/// # Examples
///
/// ```bash
/// pwright train --session demo --user 5491122334455
/// ```
pub async fn run_train_loop(
    state: &AppState,
    session: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let controller = state.training()?.clone();
    let session_id = SessionId::new(
        session.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::now_v7())),
    );
    let user_id = state.user_or_default(user);
    let training = &state.config.training;

    print_banner(state, &session_id, user_id.as_str());

    let idle_prompt = format!("  {} ", style("You >").green().bold());
    let training_prompt = format!("  {} ", style("Train >").yellow().bold());
    let (mut input, mut out) = TrainInput::new(idle_prompt.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        let message = match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                let _ = writeln!(out, "  {}", style("Press Ctrl+D to exit.").dim());
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => match parse_command(&text) {
                Some(LoopCommand::Help) => {
                    print_help(&mut out);
                    continue;
                }
                Some(LoopCommand::Exit) => break,
                Some(LoopCommand::Status) => {
                    let mode = if controller.is_training(&session_id) {
                        style("training").yellow()
                    } else {
                        style("idle").dim()
                    };
                    let _ = writeln!(
                        out,
                        "  {} {mode}, {} live sessions",
                        style("Session:").bold(),
                        controller.registry().len()
                    );
                    continue;
                }
                Some(LoopCommand::Voice(path)) => match tokio::fs::read(&path).await {
                    Ok(data) => InboundMessage::voice(
                        session_id.clone(),
                        AudioPayload {
                            data,
                            mime_type: mime_for_path(&path).to_string(),
                        },
                    )
                    .with_user(user_id.clone()),
                    Err(e) => {
                        let _ = writeln!(
                            out,
                            "  {} Cannot read {}: {e}",
                            style("!").red().bold(),
                            path.display()
                        );
                        continue;
                    }
                },
                Some(LoopCommand::Unknown(name)) => {
                    let _ = writeln!(
                        out,
                        "  {} Unknown command: /{name}. Type /help for available commands.",
                        style("?").yellow().bold()
                    );
                    continue;
                }
                None => InboundMessage::text(session_id.clone(), text).with_user(user_id.clone()),
            },
        };

        let spinner = thinking_spinner();
        let outcome = controller.handle_or_apologize(&message).await;
        spinner.finish_and_clear();

        match outcome {
            TurnOutcome::Handled(replies) => {
                for reply in &replies {
                    let _ = writeln!(out);
                    for line in reply.render().lines() {
                        let _ = writeln!(out, "  {line}");
                    }
                }
                let _ = writeln!(out);
            }
            TurnOutcome::NotHandled => {
                let _ = writeln!(
                    out,
                    "  {}",
                    style(format!(
                        "Not in a training session. Type '{}' to start.",
                        training.train_keyword
                    ))
                    .dim()
                );
            }
        }

        if controller.is_training(&session_id) {
            input.update_prompt(&training_prompt);
        } else {
            input.update_prompt(&idle_prompt);
        }
    }

    input.flush();
    info!(session_id = %session_id, "Terminal training loop closed");
    println!("\n  {}", style("Session ended.").dim());
    Ok(())
}

fn print_banner(state: &AppState, session_id: &SessionId, user_id: &str) {
    let training = &state.config.training;
    println!();
    println!("  * {}", style("Promptwright").cyan().bold());
    println!();
    println!("  {}  {}", style("Model:").bold(), style(&state.config.provider.model).dim());
    println!("  {}  {}", style("Session:").bold(), style(session_id).dim());
    println!("  {}  {}", style("Prompt of:").bold(), style(user_id).dim());
    println!();
    println!(
        "  {}",
        style(format!(
            "Type '{}' to start training, '{}' to stop. /help for commands, Ctrl+D to exit",
            training.train_keyword, training.exit_keyword
        ))
        .dim()
    );
    println!("  {}", style("---").dim());
    println!();
}

fn print_help(out: &mut SharedWriter) {
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", style("Commands").bold());
    let _ = writeln!(out, "  /voice <file>  Send an audio file as a voice note");
    let _ = writeln!(out, "  /status        Show whether this conversation is training");
    let _ = writeln!(out, "  /exit          Leave the loop (the session expires on its own)");
    let _ = writeln!(out);
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
