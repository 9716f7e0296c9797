use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tribunal_core::{
    load_config, DisputeOrchestrator, LocalObjectStore, LoggingDisputeActions, ResolutionEngine,
};
use tribunal_oracle::create_oracle;
use tribunal_server::state::AppState;
use tribunal_store::SqliteStore;

#[derive(Parser)]
#[command(name = "tribunal-server", version, about = "P2P dispute resolution service")]
struct Cli {
    #[arg(long, default_value = "config.yaml", help = "Path to the yaml config file")]
    config: PathBuf,

    #[arg(long, help = "Override the configured bind address")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tribunal-server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tribunal_server=info,tribunal_core=info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    let config = load_config(&cli.config)?;
    tracing::info!(app = %config.app.name, env = %config.app.env, "configuration loaded");

    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::create_dir_all(&config.storage.root)?;

    let store = Arc::new(SqliteStore::open(&config.database.path)?);
    let objects = Arc::new(LocalObjectStore::new(&config.storage.root));
    let (oracle, media) = create_oracle(&config.oracle.to_oracle_config())?;
    let actions = Arc::new(LoggingDisputeActions);

    let engine = ResolutionEngine::new(
        oracle,
        media,
        actions.clone(),
        config.oracle.model.clone(),
        config.resolution.confidence_threshold,
    );
    let orchestrator = Arc::new(DisputeOrchestrator::new(store.clone(), engine, actions)?);

    let state = AppState {
        orchestrator,
        store,
        objects,
    };

    let addr = cli.bind.unwrap_or(config.server.bind);
    tribunal_server::serve(state, &addr).await
}
