//! Bizflow — business-process document platform with executable agents.
//!
//! Boots the agent engine: opens the document store, wires the outbound
//! HTTP and email collaborators, starts the scheduler, and runs until
//! ctrl-c.

use anyhow::Result;
use bizflow_agents::{AgentManager, ReqwestFetcher};
use bizflow_channels::EmailNotifier;
use bizflow_core::BizflowConfig;
use bizflow_store::SqliteStore;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bizflow", version, about = "📄 Bizflow — documents that run themselves")]
struct Cli {
    /// Path to the config file (default: ~/.bizflow/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the document database path
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => BizflowConfig::load_from(std::path::Path::new(&expand_path(path)))?,
        None => BizflowConfig::load()?,
    };
    if let Some(db) = &cli.db_path {
        config.db_path = db.clone();
    }
    let db_path = expand_path(&config.db_path);

    let store = Arc::new(SqliteStore::open(std::path::Path::new(&db_path))?);
    let http = Arc::new(ReqwestFetcher::new(&config.http));
    let mailer = Arc::new(EmailNotifier::new(&config.email)?);

    let manager = AgentManager::new(&config.scheduler, store, http, mailer);
    manager.initialize().await;

    println!("📄 Bizflow v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database:  {db_path}");
    println!("   ⏰ Tick:      {}s", config.scheduler.tick_secs);
    println!("   🔄 Reconcile: {}s", config.scheduler.reconcile_secs);
    println!("   Press Ctrl-C to stop");

    // Mirror run progress into the process log for live observers.
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("📣 [{}] {:?}", event.agent_id, event.kind),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    manager.shutdown().await;
    Ok(())
}
