//! # agora
//!
//! Real-time hub binary: loads settings, opens the store, and serves the
//! WebSocket endpoint until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use agora_server::{start, Collaborators, Hub, JwtResolver, ServerConfig};
use agora_settings::{AgoraSettings, LoggingSettings};
use agora_store::{Database, SqliteCollaborators};
use agora_telemetry::{init_telemetry, parse_level, TelemetryConfig};

/// Agora real-time hub.
#[derive(Parser, Debug)]
#[command(name = "agora", about = "Agora real-time hub")]
struct Cli {
    /// Settings file (defaults to `~/.agora/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to bind, overriding settings (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,
}

fn telemetry_config(logging: &LoggingSettings) -> TelemetryConfig {
    let log_level = parse_level(&logging.level).unwrap_or(Level::INFO);
    let module_levels = logging
        .modules
        .iter()
        .filter_map(|(module, level)| parse_level(level).map(|l| (module.clone(), l)))
        .collect();
    TelemetryConfig {
        log_level,
        module_levels,
        json: logging.json,
    }
}

fn load(cli: &Cli) -> Result<AgoraSettings> {
    let mut settings = match &cli.config {
        Some(path) => agora_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => agora_settings::load_settings().context("Failed to load settings")?,
    };
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    let telemetry = init_telemetry(telemetry_config(&settings.logging));
    tracing::info!("starting agora");

    let AgoraSettings {
        server, auth, store, ..
    } = settings;

    let db_path = store.resolved_db_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let sqlite = Arc::new(SqliteCollaborators::new(db));

    let mut resolver = JwtResolver::new(auth.jwt_secret);
    if auth.require_known_user {
        resolver = resolver.with_user_directory(sqlite.clone());
    }

    let hub = Arc::new(Hub::new(
        Collaborators {
            identity: Arc::new(resolver),
            followers: sqlite.clone(),
            messages: sqlite,
        },
        telemetry.stats(),
        server.max_send_queue,
    ));

    let config = ServerConfig {
        host: server.host,
        port: server.port,
    };
    let handle = start(config, hub)
        .await
        .context("Failed to start server")?;
    tracing::info!(port = handle.port, "agora ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
