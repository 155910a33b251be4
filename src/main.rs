//! dragonpair - WhatsApp pairing page for DRAGONS-MD
//!
//! Runs the messaging client through a bridge process and relays its QR codes
//! and session state to every browser that has the pairing page open.

use anyhow::Result;
use clap::Parser;
use dragonpair_core::{Config, DisconnectPolicy, ReplayPolicy};
use dragonpair_server::{create_router, AppState, Relay};
use dragonpair_session::{BridgeClient, PairingSession, SessionDir};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// dragonpair - Pair a WhatsApp bot from the browser
#[derive(Parser, Debug)]
#[command(name = "dragonpair")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Session namespace for the messaging client
    #[arg(long, default_value = "dragons-md")]
    client_id: String,

    /// Directory where the messaging client stores sessions
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Program that runs the messaging client bridge
    #[arg(long, default_value = "node")]
    bridge: String,

    /// Argument for the bridge program (repeatable)
    #[arg(long = "bridge-arg", default_value = "bridge/whatsapp-bridge.js")]
    bridge_args: Vec<String>,

    /// Show the client's browser window
    #[arg(long)]
    no_headless: bool,

    /// On disconnect: keep the session, or reset it and pair again
    #[arg(long, default_value = "keep")]
    on_disconnect: String,

    /// What newly connected browsers receive: last-known or none
    #[arg(long, default_value = "last-known")]
    replay: String,

    /// QR image size in pixels
    #[arg(long, default_value = "300")]
    qr_size: u32,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("dragonpair v{}", env!("CARGO_PKG_VERSION"));

    let disconnect_policy: DisconnectPolicy = args
        .on_disconnect
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let replay_policy: ReplayPolicy = args.replay.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let mut config = Config::new()
        .with_port(args.port)
        .with_client_id(args.client_id)
        .with_headless(!args.no_headless)
        .with_qr_size(args.qr_size)
        .with_disconnect_policy(disconnect_policy)
        .with_replay_policy(replay_policy)
        .with_bridge(args.bridge, args.bridge_args);
    if let Some(dir) = args.session_dir {
        config = config.with_session_root(dir);
    }
    config.validate()?;

    info!("Session directory: {:?}", config.session_dir());
    info!(
        "Disconnect policy: {:?}, replay policy: {:?}",
        config.disconnect_policy, config.replay_policy
    );

    let (command_tx, command_rx) = mpsc::channel(8);
    let state = Arc::new(AppState::new(config.clone(), command_tx));

    let client = BridgeClient::from_config(&config);
    let session = PairingSession::new(Box::new(client), SessionDir::from_config(&config));
    let relay_handle = tokio::spawn(Relay::new(state.clone(), session).run(command_rx));

    let router = create_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", config.port);
    info!("  Open http://localhost:{} to view the pairing page", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.shutdown_relay().await;
    relay_handle.await.ok();

    info!("Goodbye!");
    Ok(())
}
