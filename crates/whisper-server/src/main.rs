use tracing::info;
use tracing_subscriber::EnvFilter;

use whisper_core::{ChatServer, WhisperConfig};
use whisper_net::{parse_bootstrap_nodes, run_bootstrap, BootstrapConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,whisper=debug")),
        )
        .init();

    info!("Starting Whisper v{}", env!("CARGO_PKG_VERSION"));

    let config = WhisperConfig::from_env();
    info!(?config, "Loaded configuration");

    if config.is_bootstrap {
        // Overlay only: DHT server mode plus circuit relay, no sessions
        return run_bootstrap(BootstrapConfig {
            listen_port: config.p2p_port,
            key_path: config.p2p_key_path.clone(),
            bootstrap_nodes: parse_bootstrap_nodes(&config.bootstrap_nodes),
        })
        .await;
    }

    let server = ChatServer::start(config).await?;
    info!(
        peer_id = %server.local_peer_id(),
        "Chat mode running; waiting for the SSH transport to attach sessions"
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    server.shutdown().await;

    Ok(())
}
