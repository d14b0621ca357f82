/// Size of the SERP header on the wire.
pub const SERP_HEADER_LEN: usize = 16;
/// Size of the SMP sub-header on the wire.
pub const SMP_HEADER_LEN: usize = 4;
/// Combined header overhead of every well-formed packet.
pub const HEADERS_LEN: usize = SERP_HEADER_LEN + SMP_HEADER_LEN;

/// Hard upper bound on a packet: headers, payload and multicast trailer.
/// Socket buffers and allocators are sized to this; larger sends are
/// rejected before they reach the wire.
pub const MAX_PACKET: usize = 4000;

/// Maximum number of fragments in one logical message. The `total` field
/// of the SERP header is a single byte.
pub const MAX_PARTS: usize = 255;

/// Well-known UDP port of the relay server.
pub const SERVER_PORT: u16 = 33333;

/// First SMP kind value available to applications. Values below this are
/// reserved for protocol control traffic.
pub const APPLICATION_KIND_BASE: u16 = 0x1000;
