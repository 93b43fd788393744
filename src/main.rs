//! dfadev - Automaton Device Server
//!
//! Serves a deterministic finite automaton as a character device over TCP and
//! hands its state to a successor process on live update.

use clap::Parser;
use dfadev_server::{
    lifecycle, spawn_device_actor, CommandHandler, Config, Device, InitMode, Server, ServerConfig,
};
use dfadev_store::{FieldStore, FileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dfadev")]
#[command(about = "Automaton device server with live-update state handoff")]
#[command(version)]
struct Args {
    /// YAML config file (overrides DFADEV_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to initialize the automaton: fresh, live_update or restart
    #[arg(long)]
    init: Option<InitMode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let config = Config::from_file(path).map_err(|e| {
                tracing::error!("Failed to load config: {}", e);
                e
            })?;
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => match Config::load() {
            Ok(c) => c,
            Err(e) => {
                // An explicitly named config file must load
                if std::env::var("DFADEV_CONFIG").is_ok() {
                    tracing::error!("Failed to load config: {}", e);
                    return Err(e.into());
                }
                tracing::info!("Using default configuration");
                Config::default()
            }
        },
    };
    if let Some(mode) = args.init {
        config.lifecycle.init_mode = mode;
    }
    config.validate()?;

    tracing::info!("Starting dfadev server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  State directory: {}", config.lifecycle.state_dir.display());
    tracing::info!("  Init mode: {}", config.lifecycle.init_mode);
    tracing::info!("  Write cap: {} bytes", config.device.max_write_bytes);

    let store = Arc::new(FileStore::open(&config.lifecycle.state_dir)?);
    let automaton = lifecycle::init(config.lifecycle.init_mode, store.as_ref())?;

    let device = Device::new(automaton, config.device.max_write_bytes);
    let (handle, _actor) = spawn_device_actor(device, config.device.queue_depth);

    let store_dyn: Arc<dyn FieldStore> = store.clone();
    let handler = CommandHandler::new(handle.clone()).with_store(store_dyn);
    let server = Arc::new(Server::new(ServerConfig::from_config(&config), handler));

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Blocks until ctrl-c or a completed PREPARE_UPDATE
    server.run().await?;

    if server.handler().update_prepared() {
        tracing::info!("State handed off for live update");
    } else if config.lifecycle.save_on_shutdown {
        match handle.export().await {
            Ok(snapshot) => match lifecycle::save(&snapshot, store.as_ref()) {
                Ok(()) => tracing::info!("Saved device state to {}", store.dir().display()),
                Err(e) => tracing::error!("Failed to save device state: {}", e),
            },
            Err(e) => tracing::error!("Failed to export device state: {}", e),
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
