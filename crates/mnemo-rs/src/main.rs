//! `mnemo`: terminal chat with persistent memory.

mod cli;
mod commands;
mod repl;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use log::{debug, info, warn};
use mnemo_rs::init_logging;
use mnemo_rs_config::{LayeredConfigOptions, MnemoConfig};
use mnemo_rs_core::{ChatEngine, HttpCompletionProvider, TurnDispatcher};
use mnemo_rs_memory::{MemoryStore, StoreProvider, open_store};
use std::io;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!(
        "starting mnemo (config_set={}, model_set={}, db_set={}, no_stream={})",
        cli.config.is_some(),
        cli.model.is_some(),
        cli.db.is_some(),
        cli.no_stream
    );
    let config = load_config(&cli)?;
    let store = open_configured_store(&config)?;

    match cli.command {
        None | Some(Command::Chat) => chat(config, store).await,
        Some(Command::Memory { action }) => {
            commands::run_memory(store.as_ref(), action, &mut io::stdout().lock())
        }
        Some(Command::Notes(args)) => {
            commands::run_notes(store.as_ref(), args, &mut io::stdout().lock())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MnemoConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = &cli.config {
        options = options.with_runtime_path(path);
    }
    let layered =
        MnemoConfig::load_layered_with_options(options).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());

    let mut config = layered.config;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .context("invalid config after command-line overrides")?;
    Ok(config)
}

fn open_configured_store(config: &MnemoConfig) -> anyhow::Result<Arc<dyn MemoryStore>> {
    let provider: StoreProvider = config
        .memory
        .provider
        .parse()
        .context("invalid memory provider")?;
    let path = config
        .memory
        .resolved_path()
        .context("cannot resolve a memory store path; set memory.path or pass --db")?;
    open_store(provider, &path)
        .with_context(|| format!("failed to open memory store at {}", path.display()))
}

async fn chat(config: MnemoConfig, store: Arc<dyn MemoryStore>) -> anyhow::Result<()> {
    let provider = HttpCompletionProvider::from_config(&config.model)
        .context("failed to configure completion provider")?;
    let engine = ChatEngine::from_config(&config, store.clone(), Arc::new(provider))
        .context("invalid memory capture policy")?;
    let (dispatcher, worker) = TurnDispatcher::spawn_with_session_limit(
        engine,
        config.relay.queue_capacity,
        config.relay.max_sessions,
    );

    if config.relay.enabled {
        warn!("relay enabled but no inbound source is configured; not starting relay");
    }

    // Streamed fragments are raw reply text, so stripping needs the finished reply.
    let stream_replies = config.model.stream && !config.context.strip_directives;
    repl::run(dispatcher, store, stream_replies).await?;
    worker.await.context("turn dispatcher stopped abnormally")?;
    Ok(())
}
