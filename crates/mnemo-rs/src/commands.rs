//! Administrative memory and note commands. These talk to the store directly.

use crate::cli::{MemoryAction, NotesAction, NotesArgs};
use anyhow::Context;
use mnemo_rs_memory::MemoryStore;
use std::io::Write;

pub fn run_memory(
    store: &dyn MemoryStore,
    action: MemoryAction,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match action {
        MemoryAction::List => print_memory(store, out),
        MemoryAction::Set { key, value } => set_memory(store, &key, &value, out),
        MemoryAction::Forget { key } => forget_memory(store, &key, out),
    }
}

pub fn run_notes(store: &dyn MemoryStore, args: NotesArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    match args.action {
        Some(NotesAction::Add { text }) => add_note(store, &text.join(" "), out),
        None => print_notes(store, args.limit, out),
    }
}

pub fn print_memory(store: &dyn MemoryStore, out: &mut dyn Write) -> anyhow::Result<()> {
    let entries = store.list_entries().context("failed to read memory")?;
    if entries.is_empty() {
        writeln!(out, "(no memory)")?;
    }
    for entry in entries {
        writeln!(out, "{} = {}", entry.key, entry.value)?;
    }
    Ok(())
}

pub fn print_notes(
    store: &dyn MemoryStore,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let notes = store.list_notes(limit).context("failed to read notes")?;
    if notes.is_empty() {
        writeln!(out, "(no notes)")?;
    }
    for note in notes {
        writeln!(
            out,
            "#{} [{}] {}",
            note.id,
            note.created_at.format("%Y-%m-%d %H:%M"),
            note.content
        )?;
    }
    Ok(())
}

pub fn set_memory(
    store: &dyn MemoryStore,
    key: &str,
    value: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let key = key.trim();
    anyhow::ensure!(!key.is_empty(), "memory key must not be empty");
    let entry = store
        .upsert_memory(key, value.trim())
        .with_context(|| format!("failed to store memory key {key}"))?;
    writeln!(out, "saved {} = {}", entry.key, entry.value)?;
    Ok(())
}

pub fn forget_memory(store: &dyn MemoryStore, key: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let removed = store
        .delete_memory(key.trim())
        .with_context(|| format!("failed to forget memory key {key}"))?;
    if removed {
        writeln!(out, "forgot {}", key.trim())?;
    } else {
        writeln!(out, "no memory under {}", key.trim())?;
    }
    Ok(())
}

pub fn add_note(store: &dyn MemoryStore, text: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "note must not be empty");
    let note = store.add_note(text).context("failed to add note")?;
    writeln!(out, "noted #{}", note.id)?;
    Ok(())
}
