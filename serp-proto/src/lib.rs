//! # SERP wire framing
//!
//! The Snacker Engine Relay Protocol frames every datagram with a fixed
//! 16-byte SERP header followed by a 4-byte SMP sub-header and an opaque
//! payload. Multicast packets additionally carry a trailer of destination
//! ids past the length recorded in the header.
//!
//! All multi-byte integer fields are big-endian on the wire. Conversion
//! happens exclusively at the encode/decode boundary in this crate;
//! everything above it works with host-endian values.

pub mod constants;
pub mod error;
pub mod frame;
pub mod header;
pub mod smp;
pub mod types;

pub use constants::{
    HEADERS_LEN, MAX_PACKET, MAX_PARTS, SERP_HEADER_LEN, SERVER_PORT, SMP_HEADER_LEN,
};
pub use error::WireError;
pub use frame::{encode_packet, multicast_capacity, read_trailer, singlecast_capacity};
pub use header::{SerpHeader, SmpHeader};
pub use smp::{AdvertisementOption, EchoOption, ErrorOption, MessageKind};
pub use types::{ClientId, MessageId};
