//! # SERP relay server
//!
//! A single stateful process terminating UDP for up to 50 identified
//! clients: admission, singlecast and multicast routing, heartbeat and
//! eviction. Every routing decision is best-effort; reliability is the
//! clients' business.
//!
//! [`Relay`] is the pure state machine (datagrams in, addressed datagrams
//! out); [`daemon::run`] binds it to the well-known port and drives it.

pub mod config;
pub mod daemon;
pub mod error;
pub mod relay;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::Relay;
