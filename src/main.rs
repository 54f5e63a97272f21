// Wren binary — run a standalone session with the development bridge, or
// inspect the shared registry. A real host embeds the library instead and
// supplies its own `HostBridge`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wren::config::{load_config, Config};
use wren::exec::ExecutionGateway;
use wren::host::{EchoBridge, HostBridge};
use wren::mesh::{BroadcastRouter, DiscoveryEngine, PeerTable};
use wren::registry::{FileRegistryStore, RegistryStore};
use wren::server::{AppState, DynamicEndpointRegistry};
use wren::session::{SessionIdentity, SessionManager};

#[derive(Parser)]
#[command(name = "wren", version, about = "Mesh coordination for automation bridges")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session in the foreground (development bridge).
    Run {
        /// Logical workspace reference for targeting.
        #[arg(long)]
        workspace: Option<String>,
        /// Window discriminator when several sessions share a workspace.
        #[arg(long, default_value_t = 0)]
        window: u32,
    },
    /// Print the shared registry's current view of the mesh.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wren=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command.unwrap_or(Command::Run {
        workspace: None,
        window: 0,
    }) {
        Command::Run { workspace, window } => run_session(config, workspace, window).await,
        Command::Status => print_status(&config),
    }
}

async fn run_session(config: Config, workspace: Option<String>, window: u32) -> Result<()> {
    let registry_path = match &config.registry.path {
        Some(path) => path.clone(),
        None => FileRegistryStore::default_path()?,
    };
    let store: Arc<dyn RegistryStore> = Arc::new(FileRegistryStore::new(registry_path));

    let bridge: Arc<dyn HostBridge> = Arc::new(EchoBridge);
    let capabilities = bridge
        .capabilities()
        .iter()
        .map(|c| c.qualified_name())
        .collect();

    let workspace = workspace.or_else(|| config.session.workspace_ref.clone());
    let window = if window != 0 { window } else { config.session.window_ref };

    let peers = PeerTable::new();
    let endpoints = Arc::new(DynamicEndpointRegistry::new());
    let manager = SessionManager::new(
        SessionIdentity::new(workspace, window),
        capabilities,
        Arc::clone(&store),
        Arc::clone(&endpoints),
        peers.clone(),
        config.mesh.clone(),
    );

    let listener = manager.start().await.context("Failed to start session")?;

    let discovery = DiscoveryEngine::new(
        Arc::clone(&store),
        peers.clone(),
        manager.id(),
        config.mesh.discovery_interval(),
        config.mesh.staleness_threshold(),
    );
    let discovery_task = discovery.spawn();

    let state = Arc::new(AppState {
        manager: Arc::clone(&manager),
        peers: peers.clone(),
        endpoints,
        gateway: ExecutionGateway::new(Arc::clone(&bridge)),
        broadcast: BroadcastRouter::new(peers, config.mesh.peer_timeout())?,
        bridge,
    });

    wren::server::serve(state, listener, shutdown_signal()).await?;

    discovery_task.abort();
    manager.stop().await;
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let registry_path = match &config.registry.path {
        Some(path) => path.clone(),
        None => FileRegistryStore::default_path()?,
    };
    let store = FileRegistryStore::new(registry_path);
    let sessions = store.read();

    if sessions.is_empty() {
        println!("No live sessions.");
        return Ok(());
    }

    println!("{} session(s):", sessions.len());
    let mut records: Vec<_> = sessions.values().collect();
    records.sort_by_key(|r| r.port);
    for record in records {
        println!(
            "  {}  port {}  pid {}  workspace {}  last seen {}",
            record.id,
            record.port,
            record.process_id,
            record.workspace_ref.as_deref().unwrap_or("-"),
            record.last_seen.to_rfc3339(),
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
