//! Hub configuration.

use std::time::Duration;

/// Settings for the connection hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How long a disconnected player has to come back before forfeiting.
    pub reconnect_timeout: Duration,

    /// Outbound buffer per connection. When it's full the oldest pending
    /// message is dropped.
    pub outbound_capacity: usize,

    /// Username given to the bot seat.
    pub bot_name: String,

    /// Capacity of the register/unregister command channel.
    pub channel_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            reconnect_timeout: Duration::from_secs(30),
            outbound_capacity: 256,
            bot_name: "Bot".to_string(),
            channel_size: 64,
        }
    }
}
