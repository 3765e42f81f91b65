//! Tutti game server.
//!
//! Reads its settings from the environment (and `.env`), see
//! [`ServerConfig::from_env`]. Log filtering follows `RUST_LOG`, default
//! `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use tutti::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env may carry RUST_LOG, so load it before the filter is built
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        bind = %config.bind,
        max_rounds = config.game.max_rounds,
        max_players = config.game.max_players,
        "starting Tutti server"
    );

    let server = TuttiServerBuilder::from_config(config).build().await?;
    tracing::info!("listening on {}", server.local_addr()?);
    server.run().await?;
    Ok(())
}
