//! Server configuration.
//!
//! Every knob has a default; [`ServerConfig::from_env`] overrides them
//! from the environment:
//!
//! | variable | default |
//! |---|---|
//! | `SERVER_HOST` | `0.0.0.0` |
//! | `SERVER_PORT` | `8080` |
//! | `MATCHMAKING_TIMEOUT_SECONDS` | `10` |
//! | `RECONNECT_TIMEOUT_SECONDS` | `30` |
//! | `BOT_MOVE_DELAY_MS` | `300` |

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use fourfold_hub::HubConfig;
use fourfold_matchmaking::QueueConfig;
use fourfold_transport::WsConfig;

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Path the WebSocket upgrade must use.
    pub path: String,
    /// Close a connection that sends nothing for this long.
    pub idle_timeout: Duration,
    /// Drop a new socket that hasn't finished the upgrade by then.
    pub handshake_timeout: Duration,
    /// Largest inbound frame, in bytes.
    pub max_message_size: usize,
}

impl ConnectionConfig {
    /// How often the writer pings the peer: 9/10 of the idle timeout, so
    /// a healthy client's pong always lands inside the window.
    pub fn ping_interval(&self) -> Duration {
        self.idle_timeout * 9 / 10
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub queue: QueueConfig,
    pub hub: HubConfig,
    /// Pause before the bot answers a move.
    pub bot_move_delay: Duration,
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            queue: QueueConfig::default(),
            hub: HubConfig::default(),
            bot_move_delay: Duration::from_millis(300),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("SERVER_HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host);
        let port = parse_or(&lookup, "SERVER_PORT", defaults.port);

        let match_timeout = parse_or(
            &lookup,
            "MATCHMAKING_TIMEOUT_SECONDS",
            defaults.queue.match_timeout.as_secs(),
        );
        let reconnect_timeout = parse_or(
            &lookup,
            "RECONNECT_TIMEOUT_SECONDS",
            defaults.hub.reconnect_timeout.as_secs(),
        );
        let bot_delay = parse_or(
            &lookup,
            "BOT_MOVE_DELAY_MS",
            defaults.bot_move_delay.as_millis() as u64,
        );

        Self {
            host,
            port,
            queue: QueueConfig {
                match_timeout: Duration::from_secs(match_timeout),
                ..defaults.queue
            },
            hub: HubConfig {
                reconnect_timeout: Duration::from_secs(reconnect_timeout),
                ..defaults.hub
            },
            bot_move_delay: Duration::from_millis(bot_delay),
            connection: defaults.connection,
        }
    }

    /// Transport settings. The bot's name is reserved so no client can
    /// pose as the bot.
    pub(crate) fn ws_config(&self) -> WsConfig {
        WsConfig {
            path: self.connection.path.clone(),
            max_message_size: self.connection.max_message_size,
            idle_timeout: Some(self.connection.idle_timeout),
            handshake_timeout: self.connection.handshake_timeout,
            reserved_usernames: vec![self.hub.bot_name.clone()],
        }
    }

    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, %default, "ignoring invalid setting");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr(), "0.0.0.0:8080");
        assert_eq!(c.queue.match_timeout, Duration::from_secs(10));
        assert_eq!(c.hub.reconnect_timeout, Duration::from_secs(30));
        assert_eq!(c.bot_move_delay, Duration::from_millis(300));
        assert_eq!(c.connection.max_message_size, 512);
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let c = config(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("MATCHMAKING_TIMEOUT_SECONDS", "5"),
            ("RECONNECT_TIMEOUT_SECONDS", "45"),
            ("BOT_MOVE_DELAY_MS", "0"),
        ]);
        assert_eq!(c.bind_addr(), "127.0.0.1:9000");
        assert_eq!(c.queue.match_timeout, Duration::from_secs(5));
        assert_eq!(c.hub.reconnect_timeout, Duration::from_secs(45));
        assert_eq!(c.bot_move_delay, Duration::ZERO);
    }

    #[test]
    fn test_from_lookup_invalid_value_falls_back() {
        let c = config(&[("SERVER_PORT", "eighty"), ("BOT_MOVE_DELAY_MS", "-3")]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.bot_move_delay, Duration::from_millis(300));
    }

    #[test]
    fn test_ping_interval_is_nine_tenths_of_idle() {
        let c = ConnectionConfig::default();
        assert_eq!(c.ping_interval(), Duration::from_secs(54));
    }

    #[test]
    fn test_ws_config_reserves_bot_name() {
        let mut c = ServerConfig::default();
        c.hub.bot_name = "Robo".to_string();
        let ws = c.ws_config();
        assert_eq!(ws.reserved_usernames, ["Robo"]);
        assert_eq!(ws.idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(ws.handshake_timeout, Duration::from_secs(10));
    }
}
