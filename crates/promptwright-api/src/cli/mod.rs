//! CLI command definitions for the `pwright` binary.
//!
//! Uses clap derive macros for argument parsing. Nouns group related verbs
//! (e.g., `pwright prompt show`, `pwright prompt versions`).

pub mod input;
pub mod prompt;
pub mod train;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use prompt::PromptCommand;

/// Train a bot's governing prompt by talking to it.
#[derive(Parser)]
#[command(name = "pwright", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "PROMPTWRIGHT_OTEL")]
    pub otel: bool,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,promptwright_core=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Chat with the bot in the terminal; `entrenar` starts a training session.
    Train {
        /// Conversation id (a fresh one is generated when omitted).
        #[arg(long)]
        session: Option<String>,

        /// Prompt record to train (defaults to `default_user_id`).
        #[arg(long, env = "PROMPTWRIGHT_USER_ID")]
        user: Option<String>,
    },

    /// Inspect or seed the governing prompt.
    Prompt {
        #[command(subcommand)]
        action: PromptCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_train_with_session() {
        let cli = Cli::try_parse_from(["pwright", "train", "--session", "chat-1"]).unwrap();
        match cli.command {
            Commands::Train { session, .. } => assert_eq!(session.as_deref(), Some("chat-1")),
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_parse_prompt_set() {
        let cli =
            Cli::try_parse_from(["pwright", "prompt", "set", "prompt.txt", "--user", "owner"])
                .unwrap();
        match cli.command {
            Commands::Prompt {
                action: PromptCommand::Set { file, user },
            } => {
                assert_eq!(file.to_str(), Some("prompt.txt"));
                assert_eq!(user.as_deref(), Some("owner"));
            }
            _ => panic!("expected prompt set"),
        }
    }

    #[test]
    fn test_log_directive_follows_verbosity() {
        let quiet = Cli::try_parse_from(["pwright", "--quiet", "prompt", "show"]).unwrap();
        assert_eq!(quiet.log_directive(), "error");

        let verbose = Cli::try_parse_from(["pwright", "-v", "prompt", "show"]).unwrap();
        assert_eq!(verbose.log_directive(), "info,promptwright_core=debug");

        let trace = Cli::try_parse_from(["pwright", "-vv", "prompt", "show"]).unwrap();
        assert_eq!(trace.log_directive(), "trace");
    }
}
