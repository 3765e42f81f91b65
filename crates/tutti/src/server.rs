//! `TuttiServer` builder and server loop.
//!
//! This is the entry point for running a Tutti game server. It ties
//! together all the layers: transport → protocol → room.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tutti_protocol::{Codec, JsonCodec};
use tutti_room::{GameConfig, GamePools, RoomRegistry};
use tutti_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ServerConfig, TuttiError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) connection_timeout: Duration,
}

/// Builder for configuring and starting a Tutti server.
///
/// # Example
///
/// ```rust,ignore
/// use tutti::prelude::*;
///
/// let server = TuttiServer::builder()
///     .bind("0.0.0.0:3000")
///     .game_config(GameConfig { max_rounds: 3, ..GameConfig::default() })
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TuttiServerBuilder {
    config: ServerConfig,
    pools: Option<Arc<dyn GamePools>>,
}

impl TuttiServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            pools: None,
        }
    }

    /// Starts from a loaded [`ServerConfig`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            pools: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets the rules every room is created with.
    pub fn game_config(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn room_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.room_idle_timeout = timeout;
        self
    }

    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.config.reap_interval = interval;
        self
    }

    /// Replaces the random room codes, categories, and letters.
    pub fn pools(mut self, pools: Arc<dyn GamePools>) -> Self {
        self.pools = Some(pools);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<TuttiServer<JsonCodec>, TuttiError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;

        let registry = match self.pools {
            Some(pools) => RoomRegistry::with_pools(self.config.game.clone(), pools),
            None => RoomRegistry::new(self.config.game.clone()),
        };

        let state = Arc::new(ServerState {
            registry: Mutex::new(registry),
            codec: JsonCodec,
            connection_timeout: self.config.connection_timeout,
        });

        Ok(TuttiServer {
            transport,
            state,
            room_idle_timeout: self.config.room_idle_timeout,
            reap_interval: self.config.reap_interval,
        })
    }
}

impl Default for TuttiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tutti game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TuttiServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    room_idle_timeout: Duration,
    reap_interval: Duration,
}

impl TuttiServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> TuttiServerBuilder {
        TuttiServerBuilder::new()
    }
}

impl<C> TuttiServer<C>
where
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns the idle-room reaper, then accepts connections and spawns a
    /// handler task for each. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), TuttiError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Tutti server running");

        tokio::spawn(reap_rooms(
            Arc::clone(&self.state),
            self.reap_interval,
            self.room_idle_timeout,
        ));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically destroys rooms nobody has used for `idle_timeout`.
async fn reap_rooms<C: Codec>(
    state: Arc<ServerState<C>>,
    every: Duration,
    idle_timeout: Duration,
) {
    let mut interval = tokio::time::interval(every.max(Duration::from_millis(1)));
    // the first tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let reaped = state.registry.lock().await.reap_idle(idle_timeout).await;
        for code in reaped {
            tracing::debug!(room = %code, "reaped idle room");
        }
    }
}
