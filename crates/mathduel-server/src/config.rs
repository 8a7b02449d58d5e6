//! Server configuration.

use std::time::Duration;

/// Tunables for a running server. Defaults match production behavior;
/// tests shrink the delays to keep themselves fast.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Grace period between a round resolving and the automatic advance
    /// that reveals the next round's cards.
    pub advance_delay: Duration,

    /// Debounce window for presence broadcasts: membership changes within
    /// this window coalesce into one snapshot.
    pub presence_debounce: Duration,

    /// Retention window for the idle-room sweep. Only relevant if room
    /// deletion ever becomes deferred; see `RoomRegistry::sweep_idle_rooms`.
    pub idle_room_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_secs(5),
            presence_debounce: Duration::from_millis(200),
            idle_room_ttl: Duration::from_secs(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.advance_delay, Duration::from_secs(5));
        assert_eq!(config.presence_debounce, Duration::from_millis(200));
        assert_eq!(config.idle_room_ttl, Duration::from_secs(600));
    }
}
