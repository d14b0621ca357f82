use serde::{Deserialize, Serialize};
use serp_proto::SERVER_PORT;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Tunables of the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// UDP port the relay binds on all interfaces.
    pub port: u16,
    /// Maximum number of registered clients.
    pub max_clients: usize,
    /// Seconds of silence after which a client is evicted.
    pub client_timeout_secs: u64,
    /// Seconds of silence after which a client is pinged.
    pub ping_after_secs: u64,
    /// How often client timeouts are advanced.
    pub process_timeout_every_secs: u64,
    /// Seconds with an empty client table before the relay goes to sleep.
    pub sleep_timeout_secs: u64,
    /// Coarse poll interval while sleeping.
    pub sleep_duration_secs: u64,
    /// Read timeout of the relay socket.
    pub socket_timeout_secs: u64,
    /// How many random draws the id allocator makes before giving up.
    pub id_alloc_attempts: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: SERVER_PORT,
            max_clients: 50,
            client_timeout_secs: 60,
            ping_after_secs: 30,
            process_timeout_every_secs: 1,
            sleep_timeout_secs: 180,
            sleep_duration_secs: 3,
            socket_timeout_secs: 5,
            id_alloc_attempts: 10,
        }
    }
}

/// Loads a config file, falling back to the defaults on any failure.
pub fn load_config(path: &Path) -> RelayConfig {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "bad config file, using defaults");
                RelayConfig::default()
            }
        },
        Err(err) => {
            warn!(path = %path.display(), %err, "config file unreadable, using defaults");
            RelayConfig::default()
        }
    }
}
