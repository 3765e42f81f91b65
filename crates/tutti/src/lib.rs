//! # Tutti
//!
//! Server for a room-based word game. Players gather in a room, each round
//! draws a letter, everyone fills a word per category, and the other
//! players vote every answer valid or invalid.
//!
//! This crate wires the layers together: transport → protocol → room. The
//! game itself lives in [`tutti_room`]; this crate owns configuration, the
//! accept loop, and the per-connection handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tutti::prelude::*;
//!
//! # async fn run() -> Result<(), TuttiError> {
//! let server = TuttiServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::TuttiError;
pub use server::{TuttiServer, TuttiServerBuilder};

/// Everything needed to configure and run a server, plus the game types
/// most callers touch.
pub mod prelude {
    pub use crate::{ServerConfig, TuttiError, TuttiServer, TuttiServerBuilder};

    pub use tutti_protocol::{
        ClientEvent, Codec, JsonCodec, Phase, PlayerId, ProtocolError, RoomCode,
        ServerEvent,
    };
    pub use tutti_room::{GameConfig, GamePools, RandomPools, RoomError};
    pub use tutti_transport::{ConnectionId, TransportError};
}
