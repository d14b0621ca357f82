use serp_proto::{ClientId, MessageId, SmpHeader};
use std::time::Instant;

/// What became of a fragment offered to a [`PartialMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Stored; the message is now complete.
    Complete,
    /// Stored; more fragments are missing.
    Stored,
    /// The slot was already filled. The payload is ignored.
    Duplicate,
    /// `part` is not a valid index for this message.
    PartOutOfRange,
    /// A non-terminal fragment did not match the established fragment size.
    SizeMismatch,
}

/// A fragmented message under reassembly, keyed by `(id, src)` at the
/// session level.
///
/// Invariant: `missing` equals the number of `None` slots in `parts`.
#[derive(Debug)]
pub struct PartialMessage {
    pub src: ClientId,
    pub id: MessageId,
    pub safe_send: bool,
    pub header: SmpHeader,
    parts: Vec<Option<Vec<u8>>>,
    missing: u32,
    /// Size every non-terminal fragment must have, fixed by the first
    /// non-terminal fragment to arrive.
    expected_part_len: Option<usize>,
    pub first_received: Instant,
}

impl PartialMessage {
    /// `total` must already be normalized to at least 1.
    pub fn new(
        src: ClientId,
        id: MessageId,
        safe_send: bool,
        header: SmpHeader,
        total: u8,
        now: Instant,
    ) -> Self {
        Self {
            src,
            id,
            safe_send,
            header,
            parts: vec![None; total.max(1) as usize],
            missing: total.max(1) as u32,
            expected_part_len: None,
            first_received: now,
        }
    }

    pub fn total(&self) -> u8 {
        self.parts.len() as u8
    }

    pub fn missing(&self) -> u32 {
        self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// Offers the payload of fragment `part`.
    pub fn accept(&mut self, part: u8, payload: &[u8]) -> FragmentOutcome {
        let idx = part as usize;
        if idx >= self.parts.len() {
            return FragmentOutcome::PartOutOfRange;
        }

        let terminal = idx == self.parts.len() - 1;
        if !terminal {
            match self.expected_part_len {
                Some(expected) if expected != payload.len() => {
                    return FragmentOutcome::SizeMismatch;
                }
                None => self.expected_part_len = Some(payload.len()),
                _ => {}
            }
        }

        if self.parts[idx].is_some() {
            return FragmentOutcome::Duplicate;
        }

        self.parts[idx] = Some(payload.to_vec());
        self.missing -= 1;
        if self.missing == 0 {
            FragmentOutcome::Complete
        } else {
            FragmentOutcome::Stored
        }
    }

    /// Concatenates the fragments in part order. Must only be called once
    /// the message is complete.
    pub fn assemble(self) -> Vec<u8> {
        debug_assert!(self.is_complete());
        let size = self.parts.iter().flatten().map(Vec::len).sum();
        let mut body = Vec::with_capacity(size);
        for part in self.parts.into_iter().flatten() {
            body.extend_from_slice(&part);
        }
        body
    }
}
