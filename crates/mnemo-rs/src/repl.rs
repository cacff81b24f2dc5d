//! Interactive chat loop.

use crate::commands;
use anyhow::Context;
use log::{debug, info};
use mnemo_rs_core::{Directive, DispatcherHandle, TurnOutcome};
use mnemo_rs_memory::MemoryStore;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Session key for the terminal conversation.
pub const REPL_SESSION: &str = "cli";

const DEFAULT_NOTES_SHOWN: usize = 10;

const HELP: &str = "commands: /memory, /notes [n], /forget <key>, /remember <key>=<value>, /clear, /exit";

/// Supported slash commands.
#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Memory,
    Notes(usize),
    Forget(String),
    Remember { key: String, value: String },
    Clear,
    Help,
    Exit,
}

/// Parse a slash command from the input line.
fn parse_slash_command(input: &str) -> Result<Option<SlashCommand>, String> {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Ok(None);
    };
    let (command, rest) = match body.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (body, ""),
    };
    match command.to_lowercase().as_str() {
        "memory" => Ok(Some(SlashCommand::Memory)),
        "notes" => {
            if rest.is_empty() {
                return Ok(Some(SlashCommand::Notes(DEFAULT_NOTES_SHOWN)));
            }
            rest.parse()
                .map(|count| Some(SlashCommand::Notes(count)))
                .map_err(|_| "usage: /notes [n]".to_string())
        }
        "forget" => {
            if rest.is_empty() {
                return Err("usage: /forget <key>".to_string());
            }
            Ok(Some(SlashCommand::Forget(rest.to_string())))
        }
        "remember" => {
            let Some((key, value)) = rest.split_once('=') else {
                return Err("usage: /remember <key>=<value>".to_string());
            };
            let key = key.trim();
            if key.is_empty() {
                return Err("usage: /remember <key>=<value>".to_string());
            }
            Ok(Some(SlashCommand::Remember {
                key: key.to_string(),
                value: value.trim().to_string(),
            }))
        }
        "clear" => Ok(Some(SlashCommand::Clear)),
        "help" => Ok(Some(SlashCommand::Help)),
        "exit" | "quit" => Ok(Some(SlashCommand::Exit)),
        _ => Err(format!("unknown command: /{command}")),
    }
}

/// Read lines from stdin until `/exit` or end of input.
///
/// With `stream_replies` set, reply fragments are printed as they arrive;
/// otherwise the finished reply is printed in one piece.
pub async fn run(
    dispatcher: DispatcherHandle,
    store: Arc<dyn MemoryStore>,
    stream_replies: bool,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("mnemo ready. {HELP}");
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_slash_command(line) {
            Ok(Some(SlashCommand::Exit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = run_slash_command(&dispatcher, store.as_ref(), command).await {
                    eprintln!("error: {err:#}");
                }
            }
            Ok(None) => run_turn(&dispatcher, line, stream_replies).await?,
            Err(message) => eprintln!("{message}"),
        }
    }
    info!("repl finished");
    Ok(())
}

async fn run_slash_command(
    dispatcher: &DispatcherHandle,
    store: &dyn MemoryStore,
    command: SlashCommand,
) -> anyhow::Result<()> {
    debug!("handling slash command ({:?})", command);
    let mut out = io::stdout().lock();
    match command {
        SlashCommand::Memory => commands::print_memory(store, &mut out)?,
        SlashCommand::Notes(count) => commands::print_notes(store, Some(count), &mut out)?,
        SlashCommand::Forget(key) => commands::forget_memory(store, &key, &mut out)?,
        SlashCommand::Remember { key, value } => {
            commands::set_memory(store, &key, &value, &mut out)?
        }
        SlashCommand::Clear => {
            drop(out);
            dispatcher.clear_session(REPL_SESSION).await?;
            println!("history cleared");
        }
        SlashCommand::Help => writeln!(out, "{HELP}")?,
        SlashCommand::Exit => {}
    }
    Ok(())
}

async fn run_turn(
    dispatcher: &DispatcherHandle,
    input: &str,
    stream_replies: bool,
) -> anyhow::Result<()> {
    let outcome = if stream_replies {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            let mut printed = false;
            while let Some(chunk) = rx.recv().await {
                print!("{chunk}");
                let _ = io::stdout().flush();
                printed = true;
            }
            printed
        });
        let outcome = dispatcher
            .submit_streaming(REPL_SESSION, input, tx)
            .await?;
        let printed = printer.await.unwrap_or(false);
        if printed {
            println!();
        }
        if outcome.failed {
            println!("{}", outcome.reply);
        }
        outcome
    } else {
        let outcome = dispatcher.submit(REPL_SESSION, input).await?;
        println!("{}", outcome.reply);
        outcome
    };
    report_directives(&outcome);
    Ok(())
}

fn report_directives(outcome: &TurnOutcome) {
    for directive in &outcome.applied {
        match directive {
            Directive::Memorize { key, .. } => println!("  [memory] saved {key}"),
            Directive::Note { .. } => println!("  [memory] note added"),
        }
    }
    for failure in &outcome.failures {
        eprintln!("  [memory] not saved: {}", failure.error);
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_NOTES_SHOWN, SlashCommand, parse_slash_command};
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /memory").expect("parse"), None);
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(
            parse_slash_command("/memory").expect("parse"),
            Some(SlashCommand::Memory)
        );
        assert_eq!(
            parse_slash_command("/notes").expect("parse"),
            Some(SlashCommand::Notes(DEFAULT_NOTES_SHOWN))
        );
        assert_eq!(
            parse_slash_command("/notes 3").expect("parse"),
            Some(SlashCommand::Notes(3))
        );
        assert_eq!(
            parse_slash_command("/forget lang").expect("parse"),
            Some(SlashCommand::Forget("lang".to_string()))
        );
        assert_eq!(
            parse_slash_command(" /remember city = Paris, France ").expect("parse"),
            Some(SlashCommand::Remember {
                key: "city".to_string(),
                value: "Paris, France".to_string(),
            })
        );
        assert_eq!(
            parse_slash_command("/CLEAR").expect("parse"),
            Some(SlashCommand::Clear)
        );
        assert_eq!(
            parse_slash_command("/exit").expect("parse"),
            Some(SlashCommand::Exit)
        );
    }

    #[test]
    fn malformed_commands_report_usage() {
        assert_eq!(
            parse_slash_command("/notes many"),
            Err("usage: /notes [n]".to_string())
        );
        assert_eq!(
            parse_slash_command("/forget"),
            Err("usage: /forget <key>".to_string())
        );
        assert_eq!(
            parse_slash_command("/remember =x"),
            Err("usage: /remember <key>=<value>".to_string())
        );
        assert_eq!(
            parse_slash_command("/frobnicate"),
            Err("unknown command: /frobnicate".to_string())
        );
    }
}
