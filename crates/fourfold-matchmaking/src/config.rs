//! Queue configuration.

use std::time::Duration;

/// Settings for the matchmaking actor.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a player may wait before `on_timeout` fires.
    pub match_timeout: Duration,

    /// How often the actor checks for timed-out entries. A player is
    /// swept on the first check at or after `match_timeout`.
    pub sweep_interval: Duration,

    /// Capacity of the command channel. Callers wait when it is full.
    pub channel_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            match_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            channel_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.match_timeout, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.channel_size, 64);
    }
}
