//! Command-line definition for the `mnemo` binary.

use clap::{Args, Parser, Subcommand};
use mnemo_rs_config::MnemoConfig;
use std::path::PathBuf;

/// Chat with a model that remembers across sessions.
#[derive(Debug, Parser)]
#[command(name = "mnemo", version)]
pub struct Cli {
    /// Extra mnemo.json5 applied on top of the discovered layers
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Model name override
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// Memory store path override
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Wait for the whole reply instead of streaming it
    #[arg(long, global = true)]
    pub no_stream: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat (the default)
    Chat,
    /// Inspect or edit keyed memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// List or append notes
    Notes(NotesArgs),
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum MemoryAction {
    /// Print every key and value
    List,
    /// Store a value under a key
    Set { key: String, value: String },
    /// Remove a key
    Forget { key: String },
}

#[derive(Debug, Args, PartialEq, Eq)]
pub struct NotesArgs {
    /// Show at most this many notes
    #[arg(long)]
    pub limit: Option<usize>,
    #[command(subcommand)]
    pub action: Option<NotesAction>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum NotesAction {
    /// Append a note
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut MnemoConfig) {
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if let Some(db) = &self.db {
            config.memory.path = Some(db.to_string_lossy().into_owned());
        }
        if self.no_stream {
            config.model.stream = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, MemoryAction, NotesAction, NotesArgs};
    use clap::Parser;
    use mnemo_rs_config::MnemoConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["mnemo"]).expect("parse");
        assert_eq!(cli.command, None);
        assert_eq!(cli.no_stream, false);
    }

    #[test]
    fn admin_subcommands_parse() {
        let cli = Cli::try_parse_from(["mnemo", "memory", "set", "lang", "rust"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Memory {
                action: MemoryAction::Set {
                    key: "lang".to_string(),
                    value: "rust".to_string(),
                },
            })
        );

        let cli = Cli::try_parse_from(["mnemo", "notes", "--limit", "3"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Notes(NotesArgs {
                limit: Some(3),
                action: None,
            }))
        );

        let cli = Cli::try_parse_from(["mnemo", "notes", "add", "buy", "milk"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Notes(NotesArgs {
                limit: None,
                action: Some(NotesAction::Add {
                    text: vec!["buy".to_string(), "milk".to_string()],
                }),
            }))
        );
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "mnemo",
            "chat",
            "--model",
            "openai/gpt-4o",
            "--db",
            "/tmp/mem.db",
            "--no-stream",
        ])
        .expect("parse");
        let mut config = MnemoConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.model.name, "openai/gpt-4o");
        assert_eq!(config.memory.path.as_deref(), Some("/tmp/mem.db"));
        assert_eq!(config.model.stream, false);
    }
}
