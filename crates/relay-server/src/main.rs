//! Binary WebSocket server for the presence relay.

use relay_server::config::Config;
use relay_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!(
        "Starting relay-server on {}:{} (max_clients = {}, delivery = {:?}, origin = {})",
        config.bind_addr,
        config.port,
        config.max_clients,
        config.policy.delivery,
        config.allowed_origin
    );

    server::run(config).await
}
