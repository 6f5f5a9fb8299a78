//! netree Daemon - Main entry point
//!
//! Loads the device tree and serves the hierarchy API over HTTP.

mod api;
mod config;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use netree_core::TraversalMethod;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netree")]
#[command(about = "Network device hierarchy service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netree.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the stored tree in this order (dfs or bfs) and exit
    #[arg(long, value_name = "METHOD")]
    dump: Option<TraversalMethod>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("netree v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        store = %config.store.path.display(),
        persist = config.store.persist,
        delete_policy = ?config.store.delete_policy,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone())?;

    if let Some(method) = args.dump {
        let devices = state.hierarchy.traverse(method);
        println!("{} devices ({}):", devices.len(), method);
        for device in devices {
            let parent = device
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:>6}  {:<8}  {:<8}  parent {:>6}  {}",
                device.id, device.kind, device.status, parent, device.name
            );
        }
    } else {
        server::run(state, &config.daemon.bind).await?;
    }

    Ok(())
}
