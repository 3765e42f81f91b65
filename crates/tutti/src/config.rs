//! Server configuration, loaded from the environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tutti_room::GameConfig;

/// Everything a server needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// A connection that sends nothing for this long is closed. Heartbeats
    /// count, and the server pings every half timeout, so only peers that
    /// stopped answering are dropped. Keep it above `game.round_duration`
    /// for clients that send no pings of their own.
    pub connection_timeout: Duration,

    /// Rooms with nobody connected are destroyed after this much quiet.
    pub room_idle_timeout: Duration,

    /// How often the reaper looks for idle rooms.
    pub reap_interval: Duration,

    /// Rules handed to every room.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            connection_timeout: Duration::from_secs(300),
            room_idle_timeout: Duration::from_secs(30 * 60),
            reap_interval: Duration::from_secs(60),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads `.env` if present, then reads the `TUTTI_*` variables.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `TUTTI_BIND` (or `PORT`) | `bind` |
    /// | `TUTTI_MAX_ROUNDS` | `game.max_rounds` |
    /// | `TUTTI_MAX_PLAYERS` | `game.max_players` |
    /// | `TUTTI_ROUND_SECS` | `game.round_duration` |
    /// | `TUTTI_REVEAL_DELAY_MS` | `game.vote_reveal_delay` |
    /// | `TUTTI_CONNECTION_TIMEOUT_SECS` | `connection_timeout` |
    /// | `TUTTI_ROOM_IDLE_SECS` | `room_idle_timeout` |
    /// | `TUTTI_REAP_INTERVAL_SECS` | `reap_interval` |
    ///
    /// Missing variables take the default. Values that do not parse also
    /// take the default, with a warning.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading from `lookup` instead
    /// of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind = match (lookup("TUTTI_BIND"), lookup("PORT")) {
            (Some(bind), _) if !bind.trim().is_empty() => bind.trim().to_string(),
            (_, Some(port)) => match port.trim().parse::<u16>() {
                Ok(port) => format!("0.0.0.0:{port}"),
                Err(_) => {
                    tracing::warn!(value = %port, "invalid PORT, using default bind");
                    defaults.bind.clone()
                }
            },
            _ => defaults.bind.clone(),
        };

        let game = GameConfig {
            max_rounds: setting(&lookup, "TUTTI_MAX_ROUNDS", defaults.game.max_rounds, |n| *n > 0),
            max_players: setting(&lookup, "TUTTI_MAX_PLAYERS", defaults.game.max_players, |n| *n > 0),
            round_duration: Duration::from_secs(setting(
                &lookup,
                "TUTTI_ROUND_SECS",
                defaults.game.round_duration.as_secs(),
                |_| true,
            )),
            vote_reveal_delay: Duration::from_millis(setting(
                &lookup,
                "TUTTI_REVEAL_DELAY_MS",
                defaults.game.vote_reveal_delay.as_millis() as u64,
                |_| true,
            )),
            command_buffer: defaults.game.command_buffer,
        };

        Self {
            bind,
            connection_timeout: Duration::from_secs(setting(
                &lookup,
                "TUTTI_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout.as_secs(),
                |n| *n > 0,
            )),
            room_idle_timeout: Duration::from_secs(setting(
                &lookup,
                "TUTTI_ROOM_IDLE_SECS",
                defaults.room_idle_timeout.as_secs(),
                |_| true,
            )),
            // tokio::time::interval panics on zero
            reap_interval: Duration::from_secs(setting(
                &lookup,
                "TUTTI_REAP_INTERVAL_SECS",
                defaults.reap_interval.as_secs(),
                |n| *n > 0,
            )),
            game,
        }
    }
}

/// Reads one variable, falling back to `default` when it is missing, does
/// not parse, or fails `accept`.
fn setting<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    accept: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, %default, "invalid setting, using default");
            default
        }
    }
}
