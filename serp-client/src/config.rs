use serde::{Deserialize, Serialize};
use serp_proto::SERVER_PORT;
use std::net::SocketAddr;
use std::time::Duration;

/// Tunables of the client network manager.
///
/// The defaults match the relay's expectations; `bytes_per_second` is the
/// knob most applications end up turning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the relay server.
    pub server_addr: SocketAddr,
    /// Outgoing send rate enforced by the token bucket.
    pub bytes_per_second: u32,
    /// How long an unacknowledged reliable fragment waits before it is
    /// queued again.
    pub resend_interval: Duration,
    /// How long a reliable send keeps retransmitting before it is dropped.
    pub safe_send_timeout: Duration,
    /// How long an unfinished incoming message (and the duplicate-detection
    /// record of a finished one) is retained.
    pub incoming_timeout: Duration,
    /// How often an unanswered connection request is repeated.
    pub advertise_retry: Duration,
    /// Read timeout of the client socket, polled from the update loop.
    pub socket_timeout: Duration,
    /// How many random ephemeral ports to try before giving up.
    pub bind_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], SERVER_PORT)),
            bytes_per_second: 500_000,
            resend_interval: Duration::from_millis(100),
            safe_send_timeout: Duration::from_secs(5),
            incoming_timeout: Duration::from_secs(10),
            advertise_retry: Duration::from_secs(1),
            socket_timeout: Duration::from_millis(1),
            bind_attempts: 10,
        }
    }
}
