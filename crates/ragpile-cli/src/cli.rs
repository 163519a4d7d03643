//! CLI argument parsing with clap.

use clap::{Parser, Subcommand, ValueEnum};
use ragpile_core::models::AuthReason;
use std::path::PathBuf;

/// ragpile - talk to your ragpile assistant from the terminal
#[derive(Parser, Debug)]
#[command(name = "ragpile", version, about = "Talk to your ragpile assistant from the terminal")]
pub struct Cli {
    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the ragpile home directory (default: ~/.ragpile)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Send a prompt and stream the reply
    Chat {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,
        /// System prompt sent ahead of the user message
        #[arg(long, value_name = "TEXT")]
        system: Option<String>,
    },
    /// Browse conversation threads
    Threads {
        #[command(subcommand)]
        action: ThreadsCommand,
    },
    /// Inspect and edit scheduled jobs
    Schedules {
        #[command(subcommand)]
        action: SchedulesCommand,
    },
    /// Sign in and store the session
    Login {
        #[command(subcommand)]
        provider: LoginCommand,
    },
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List available models with pricing
    Models,
    /// Decode a repr-style tool-call payload
    ParseToolCalls { text: String },
    /// Show the resolved configuration
    Config,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ThreadsCommand {
    List,
    Show { id: String },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SchedulesCommand {
    List,
    Update {
        id: String,
        /// New job code
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,
        /// Read the new job code from a file
        #[arg(long, value_name = "PATH")]
        code_file: Option<PathBuf>,
        /// New interval in seconds
        #[arg(long, value_name = "SECONDS")]
        interval: Option<i64>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum LoginCommand {
    /// Sign in with Google, or grant a Google scope with --reason
    Google {
        #[arg(long, value_enum)]
        reason: Option<Reason>,
        /// Authorization code or redirect URL (prompted for when absent)
        #[arg(long)]
        code: Option<String>,
    },
    /// Sign in with a Telegram login widget payload
    Telegram {
        /// Widget payload as JSON
        #[arg(long)]
        payload: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum Reason {
    Email,
}

impl From<Reason> for AuthReason {
    fn from(reason: Reason) -> Self {
        match reason {
            Reason::Email => AuthReason::Email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ragpile").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_chat_joins_words() {
        let cli = parse(&["chat", "hello", "there", "-m", "gpt-4o"]);
        assert_eq!(
            cli.command,
            Command::Chat {
                prompt: vec!["hello".into(), "there".into()],
                model: Some("gpt-4o".into()),
                system: None,
            }
        );
    }

    #[test]
    fn test_chat_requires_prompt() {
        assert!(Cli::try_parse_from(["ragpile", "chat"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["threads", "show", "t1", "--json", "-v", "--home", "/tmp/rp"]);
        assert!(cli.json);
        assert!(cli.verbose);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/rp")));
        assert_eq!(
            cli.command,
            Command::Threads {
                action: ThreadsCommand::Show { id: "t1".into() }
            }
        );
    }

    #[test]
    fn test_schedule_update_code_conflicts_with_file() {
        let result = Cli::try_parse_from([
            "ragpile", "schedules", "update", "s1", "--code", "x", "--code-file", "f.py",
        ]);
        assert!(result.is_err());

        let cli = parse(&["schedules", "update", "s1", "--interval", "60"]);
        assert_eq!(
            cli.command,
            Command::Schedules {
                action: SchedulesCommand::Update {
                    id: "s1".into(),
                    code: None,
                    code_file: None,
                    interval: Some(60),
                }
            }
        );
    }

    #[test]
    fn test_login_google_reason() {
        let cli = parse(&["login", "google", "--reason", "email", "--code", "abc"]);
        assert_eq!(
            cli.command,
            Command::Login {
                provider: LoginCommand::Google {
                    reason: Some(Reason::Email),
                    code: Some("abc".into()),
                }
            }
        );
        assert_eq!(AuthReason::from(Reason::Email), AuthReason::Email);
    }
}
