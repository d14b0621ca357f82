use thiserror::Error;

/// Errors surfaced by the framing layer.
///
/// These never cross the wire; the dispatch layer decides between
/// drop-and-log and reply-and-log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("datagram too short: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("header length field {header} exceeds datagram length {datagram}")]
    LengthMismatch { header: u16, datagram: usize },
    #[error("multicast trailer has odd length")]
    MalformedTrailer,
    #[error("packet would exceed the maximum packet size")]
    PacketTooLarge,
}
