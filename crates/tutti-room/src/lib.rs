//! Game core for Tutti.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`Room`] state machine. The [`RoomRegistry`] creates rooms, maps
//! connections to seats, and routes actions.
//!
//! # Key types
//!
//! - [`Room`]: phases, rounds, answers, ballots, history
//! - [`tally`]: pure vote counting
//! - [`RoomRegistry`]: room code → actor, connection → seat
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`GamePools`]: room codes, categories, letters
//! - [`GameConfig`]: rounds, seats, timings

mod actor;
mod config;
mod error;
mod guard;
mod pools;
mod registry;
mod room;
mod tally;

pub use actor::{ConnectionSender, PlayerAction, RoomHandle, RoomInfo};
pub use config::GameConfig;
pub use error::RoomError;
pub use guard::{Operation, permits};
pub use pools::{
    BONUS_CATEGORIES, BONUS_CATEGORY_COUNT, FALLBACK_LETTER, GamePools, LETTERS,
    ROOM_CODE_LEN, RandomPools, STANDARD_CATEGORIES,
};
pub use registry::{RoomRegistry, Seat};
pub use room::{JoinIntent, JoinOutcome, Outbound, Player, Room, unix_millis};
pub use tally::{POINTS_PER_VALID_CATEGORY, Tally, tally};
