use crate::constants::{HEADERS_LEN, MAX_PACKET};
use crate::error::WireError;
use crate::header::{SerpHeader, SmpHeader};
use crate::types::ClientId;
use smallvec::SmallVec;

/// Payload capacity of a singlecast packet.
pub fn singlecast_capacity() -> usize {
    MAX_PACKET - HEADERS_LEN
}

/// Payload capacity of a multicast packet carrying `destinations` trailer
/// entries, or `None` when the trailer alone exceeds the packet bound.
pub fn multicast_capacity(destinations: usize) -> Option<usize> {
    (MAX_PACKET - HEADERS_LEN).checked_sub(destinations.checked_mul(2)?)
}

/// On-wire size of a packet with the given payload and trailer sizes.
pub fn packet_wire_len(payload_len: usize, destinations: usize) -> usize {
    HEADERS_LEN + payload_len + 2 * destinations
}

/// Assembles one complete datagram: SERP header, SMP header, payload, and
/// (for multicast) the big-endian destination trailer.
///
/// The caller is responsible for a `len` field consistent with the payload;
/// the trailer is excluded from `len` by definition.
pub fn encode_packet(
    serp: &SerpHeader,
    smp: &SmpHeader,
    payload: &[u8],
    destinations: &[ClientId],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(packet_wire_len(payload.len(), destinations.len()));
    buf.extend_from_slice(&serp.encode());
    buf.extend_from_slice(&smp.encode());
    buf.extend_from_slice(payload);
    for dst in destinations {
        buf.extend_from_slice(&dst.0.to_be_bytes());
    }
    buf
}

/// Parses the multicast destination trailer occupying `[len..]` of the
/// datagram.
///
/// An odd number of trailer bytes means a malformed packet and is rejected
/// outright rather than truncated.
pub fn read_trailer(datagram: &[u8], len: u16) -> Result<SmallVec<[ClientId; 8]>, WireError> {
    let start = len as usize;
    if start > datagram.len() {
        return Err(WireError::LengthMismatch {
            header: len,
            datagram: datagram.len(),
        });
    }
    let trailer = &datagram[start..];
    if trailer.len() % 2 != 0 {
        return Err(WireError::MalformedTrailer);
    }
    Ok(trailer
        .chunks_exact(2)
        .map(|pair| ClientId(u16::from_be_bytes([pair[0], pair[1]])))
        .collect())
}
