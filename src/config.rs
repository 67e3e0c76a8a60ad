//! Server configuration parsed from environment variables.
//!
//! Every setting has a default, and an unparseable value falls back to it
//! rather than aborting startup.

use std::time::Duration;

use crate::services::history::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ROOM_GRACE_SECS: u64 = 5;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_ROOM: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Maximum operations retained per room.
    pub history_limit: usize,
    /// Delay before an empty room is reclaimed.
    pub room_grace: Duration,
    /// Outbound frames buffered per connection.
    pub client_queue_capacity: usize,
    /// Room for connections that do not name one.
    pub default_room: String,
}

impl Config {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `ROOM_HISTORY_LIMIT`: default 500, minimum 1
    /// - `ROOM_GRACE_SECS`: default 5
    /// - `CLIENT_QUEUE_CAPACITY`: default 256, minimum 1
    /// - `DEFAULT_ROOM`: default `default`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let default_room = parse("DEFAULT_ROOM").unwrap_or_else(|| DEFAULT_ROOM.to_owned());

        Self {
            port: parse_or(parse("PORT"), DEFAULT_PORT),
            history_limit: parse_or(parse("ROOM_HISTORY_LIMIT"), DEFAULT_HISTORY_LIMIT).max(1),
            room_grace: Duration::from_secs(parse_or(parse("ROOM_GRACE_SECS"), DEFAULT_ROOM_GRACE_SECS)),
            client_queue_capacity: parse_or(parse("CLIENT_QUEUE_CAPACITY"), DEFAULT_CLIENT_QUEUE_CAPACITY).max(1),
            default_room,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
