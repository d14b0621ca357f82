//! # SERP client network manager
//!
//! Connects to a SERP relay and gives the application one operation: send
//! an opaque message to one or more peers identified by 16-bit ids.
//! Underneath, large messages are fragmented across the fixed UDP packet
//! bound and reassembled on arrival, reliable sends are acknowledged per
//! fragment per destination and retransmitted until complete or expired,
//! and all outgoing traffic is paced by a byte-rate token bucket.
//!
//! [`ClientSession`] is the pure state machine (datagrams in, datagrams
//! out, time passed explicitly); [`NetworkManager`] binds it to a UDP
//! socket for real use. Everything runs on the caller's thread; the only
//! blocking point is the socket's 1 ms read timeout.

pub mod config;
pub mod error;
pub mod fragment;
pub mod manager;
pub mod outgoing;
pub mod pacing;
pub mod reassembly;
pub mod session;
pub mod transport;

use serp_proto::{ClientId, MessageId};

/// Notifications surfaced to the application alongside the message inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The relay accepted our advertisement and assigned an identity.
    Connected(ClientId),
    /// The relay ended our registration.
    Disconnected,
    /// Every destination acknowledged every fragment of a reliable send.
    SendCompleted(MessageId),
    /// A reliable send expired before all acknowledgements arrived and was
    /// discarded.
    SendExpired(MessageId),
    /// The relay reported an error.
    ServerError { option: u16, body: Vec<u8> },
}

pub use config::ClientConfig;
pub use error::ClientError;
pub use manager::NetworkManager;
pub use session::{ClientSession, Message};
pub use transport::UdpChannel;
