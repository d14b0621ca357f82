use crate::constants::{HEADERS_LEN, SERP_HEADER_LEN, SMP_HEADER_LEN};
use crate::types::{ClientId, MessageId};

/// Bit 0 of `flags`: the sender requires per-fragment acknowledgements.
const SAFE_SEND_BIT: u32 = 1 << 0;

/// The fixed 16-byte frame prefix of every SERP datagram.
///
/// `len` counts this header, the SMP header and the payload — but not the
/// multicast trailer, which lives past `len` in the datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerpHeader {
    pub src: ClientId,
    pub dst: ClientId,
    pub len: u16,
    /// 0-based fragment index.
    pub part: u8,
    /// Fragment count of the logical message, at least 1.
    pub total: u8,
    pub id: MessageId,
    pub flags: u32,
}

impl SerpHeader {
    pub fn new(
        src: ClientId,
        dst: ClientId,
        len: u16,
        part: u8,
        total: u8,
        id: MessageId,
    ) -> Self {
        Self {
            src,
            dst,
            len,
            part,
            total,
            id,
            flags: 0,
        }
    }

    pub fn encode(&self) -> [u8; SERP_HEADER_LEN] {
        let mut buf = [0u8; SERP_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.src.0.to_be_bytes());
        buf[2..4].copy_from_slice(&self.dst.0.to_be_bytes());
        buf[4..6].copy_from_slice(&self.len.to_be_bytes());
        buf[6] = self.part;
        buf[7] = self.total;
        buf[8..12].copy_from_slice(&self.id.0.to_be_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; SERP_HEADER_LEN]) -> Self {
        Self {
            src: ClientId(u16::from_be_bytes([buf[0], buf[1]])),
            dst: ClientId(u16::from_be_bytes([buf[2], buf[3]])),
            len: u16::from_be_bytes([buf[4], buf[5]]),
            part: buf[6],
            total: buf[7],
            id: MessageId(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]])),
            flags: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }

    /// Decodes the header at the front of a datagram, if there is room.
    pub fn read(datagram: &[u8]) -> Option<Self> {
        let bytes: &[u8; SERP_HEADER_LEN] = datagram.get(..SERP_HEADER_LEN)?.try_into().ok()?;
        Some(Self::decode(bytes))
    }

    pub fn safe_send(&self) -> bool {
        self.flags & SAFE_SEND_BIT != 0
    }

    pub fn set_safe_send(&mut self) {
        self.flags |= SAFE_SEND_BIT;
    }
}

/// The 4-byte SMP sub-header placed immediately after the SERP header.
///
/// `kind` selects the message family; the interpretation of `option`
/// depends on it. Raw values are kept here so application-defined kinds
/// pass through untouched; control traffic goes through [`MessageKind`].
///
/// [`MessageKind`]: crate::smp::MessageKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmpHeader {
    pub kind: u16,
    pub option: u16,
}

impl SmpHeader {
    pub fn new(kind: impl Into<u16>, option: u16) -> Self {
        Self {
            kind: kind.into(),
            option,
        }
    }

    pub fn encode(&self) -> [u8; SMP_HEADER_LEN] {
        let mut buf = [0u8; SMP_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.kind.to_be_bytes());
        buf[2..4].copy_from_slice(&self.option.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; SMP_HEADER_LEN]) -> Self {
        Self {
            kind: u16::from_be_bytes([buf[0], buf[1]]),
            option: u16::from_be_bytes([buf[2], buf[3]]),
        }
    }

    /// Decodes the sub-header of a datagram that already carries a SERP
    /// header, if there is room.
    pub fn read(datagram: &[u8]) -> Option<Self> {
        let bytes: &[u8; SMP_HEADER_LEN] = datagram
            .get(crate::constants::SERP_HEADER_LEN..HEADERS_LEN)?
            .try_into()
            .ok()?;
        Some(Self::decode(bytes))
    }
}
