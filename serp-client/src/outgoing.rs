use crate::fragment::FragmentPlan;
use serp_proto::{ClientId, MessageId, SmpHeader};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::Instant;

/// One entry of the rate-limited outgoing queue.
///
/// `Basic` packets are fully encoded up front and sent once. `Reliable`
/// entries are references into the safe-outgoing table and are encoded at
/// pop time against the destinations still missing an acknowledgement, so
/// a retransmission never carries destinations that already acked.
#[derive(Debug)]
pub enum QueuedPacket {
    Basic { bytes: Vec<u8> },
    Reliable { id: MessageId, part: u8 },
}

/// Acknowledgement state of one fragment of a reliable send.
///
/// Invariant: `remaining` equals the number of `false` entries in
/// `per_dest`.
#[derive(Debug)]
struct PartAcks {
    remaining: u32,
    per_dest: Vec<bool>,
}

/// An outgoing reliable message: payload split into parts, plus the
/// per-part per-destination acknowledgement matrix.
///
/// The entry lives until every destination acked every part, or until the
/// safe-send timeout elapses since `first_sent` — whichever comes first.
#[derive(Debug)]
pub struct SafeOutgoing {
    pub id: MessageId,
    pub header: SmpHeader,
    destinations: SmallVec<[ClientId; 8]>,
    parts: Vec<Vec<u8>>,
    acks: Vec<PartAcks>,
    unacked_parts_total: u32,
    unacked_parts_per_dest: Vec<u32>,
    dest_index: HashMap<ClientId, usize>,
    pub first_sent: Instant,
    pub last_sent: Instant,
}

impl SafeOutgoing {
    pub fn new(
        id: MessageId,
        header: SmpHeader,
        destinations: &[ClientId],
        payload: &[u8],
        plan: FragmentPlan,
        now: Instant,
    ) -> Self {
        let parts: Vec<Vec<u8>> = plan.slices(payload).map(<[u8]>::to_vec).collect();
        let dest_count = destinations.len();
        let acks = (0..parts.len())
            .map(|_| PartAcks {
                remaining: dest_count as u32,
                per_dest: vec![false; dest_count],
            })
            .collect();
        let dest_index = destinations
            .iter()
            .enumerate()
            .map(|(i, &d)| (d, i))
            .collect();
        Self {
            id,
            header,
            destinations: destinations.into(),
            unacked_parts_total: parts.len() as u32,
            unacked_parts_per_dest: vec![parts.len() as u32; dest_count],
            acks,
            parts,
            dest_index,
            first_sent: now,
            last_sent: now,
        }
    }

    pub fn part_count(&self) -> u8 {
        self.parts.len() as u8
    }

    pub fn part_payload(&self, part: u8) -> Option<&[u8]> {
        self.parts.get(part as usize).map(Vec::as_slice)
    }

    pub fn is_complete(&self) -> bool {
        self.unacked_parts_total == 0
    }

    pub fn unacked_parts_total(&self) -> u32 {
        self.unacked_parts_total
    }

    pub fn unacked_parts_for(&self, dest: ClientId) -> Option<u32> {
        self.dest_index
            .get(&dest)
            .map(|&i| self.unacked_parts_per_dest[i])
    }

    /// Destinations that have not yet acknowledged `part`, in the original
    /// destination order.
    pub fn unacked_destinations(&self, part: u8) -> SmallVec<[ClientId; 8]> {
        match self.acks.get(part as usize) {
            Some(acks) => self
                .destinations
                .iter()
                .zip(&acks.per_dest)
                .filter(|(_, &acked)| !acked)
                .map(|(&d, _)| d)
                .collect(),
            None => SmallVec::new(),
        }
    }

    /// Parts that at least one destination has not acknowledged.
    pub fn pending_parts(&self) -> SmallVec<[u8; 8]> {
        self.acks
            .iter()
            .enumerate()
            .filter(|(_, acks)| acks.remaining > 0)
            .map(|(part, _)| part as u8)
            .collect()
    }

    /// Records an acknowledgement of `part` from `from`.
    ///
    /// Idempotent: a repeated ack leaves the matrix unchanged. Returns
    /// whether anything changed; completion is visible via
    /// [`Self::is_complete`].
    pub fn record_ack(&mut self, from: ClientId, part: u8) -> bool {
        let Some(&dest) = self.dest_index.get(&from) else {
            return false;
        };
        let Some(acks) = self.acks.get_mut(part as usize) else {
            return false;
        };
        if acks.per_dest[dest] {
            return false;
        }
        acks.per_dest[dest] = true;
        acks.remaining -= 1;
        self.unacked_parts_per_dest[dest] -= 1;
        if acks.remaining == 0 {
            self.unacked_parts_total -= 1;
        }
        true
    }
}
