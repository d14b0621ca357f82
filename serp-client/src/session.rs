use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fragment::{self, FragmentPlan};
use crate::outgoing::{QueuedPacket, SafeOutgoing};
use crate::pacing::SendBudget;
use crate::reassembly::{FragmentOutcome, PartialMessage};
use crate::ClientEvent;
use rand::RngCore;
use serp_proto::{
    encode_packet, AdvertisementOption, ClientId, EchoOption, MessageId, MessageKind, SerpHeader,
    SmpHeader, HEADERS_LEN,
};
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A complete application-level message, delivered or about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The sending client, or [`ClientId::SERVER`] for relay traffic.
    pub src: ClientId,
    pub header: SmpHeader,
    pub body: Vec<u8>,
}

/// The client-side protocol engine, free of any I/O.
///
/// Datagrams from the relay go into [`handle_datagram`], which returns
/// frames to transmit immediately (acknowledgements and echo replies skip
/// the rate limiter). [`update`] runs the timeout sweeps and drains the
/// paced outgoing queue. Time is always passed in, never sampled, so the
/// whole engine is deterministic under test.
///
/// [`handle_datagram`]: ClientSession::handle_datagram
/// [`update`]: ClientSession::update
pub struct ClientSession {
    config: ClientConfig,
    client_id: ClientId,
    connected: bool,
    connect_requested: bool,
    last_advertise: Option<Instant>,
    next_message_id: MessageId,
    queue: VecDeque<QueuedPacket>,
    budget: SendBudget,
    safe_outgoing: HashMap<MessageId, SafeOutgoing>,
    partial_incoming: HashMap<(MessageId, ClientId), PartialMessage>,
    seen_reliable: HashMap<(MessageId, ClientId), Instant>,
    inbox: Vec<Message>,
    events: VecDeque<ClientEvent>,
}

impl ClientSession {
    pub fn new(config: ClientConfig, rng: &mut dyn RngCore) -> Self {
        let budget = SendBudget::new(config.bytes_per_second);
        Self {
            config,
            client_id: ClientId::SERVER,
            connected: false,
            connect_requested: false,
            last_advertise: None,
            next_message_id: MessageId(rng.next_u32()),
            queue: VecDeque::new(),
            budget,
            safe_outgoing: HashMap::new(),
            partial_incoming: HashMap::new(),
            seen_reliable: HashMap::new(),
            inbox: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_bytes_per_second(&mut self, bytes_per_second: u32) {
        self.config.bytes_per_second = bytes_per_second;
        self.budget.set_rate(bytes_per_second);
    }

    fn next_id(&mut self) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id = id.wrapping_add(1);
        id
    }

    /// A headers-only control frame addressed to `dst`, sent as a single
    /// unfragmented packet.
    fn control_frame(&self, dst: ClientId, id: MessageId, smp: SmpHeader) -> Vec<u8> {
        let serp = SerpHeader::new(self.client_id, dst, HEADERS_LEN as u16, 0, 1, id);
        encode_packet(&serp, &smp, &[], &[])
    }

    /// Builds the advertisement request and arms the retry timer. The
    /// request is repeated from [`update`](Self::update) until the relay
    /// answers.
    pub fn connect(&mut self, now: Instant) -> Vec<u8> {
        self.connect_requested = true;
        self.last_advertise = Some(now);
        let id = self.next_id();
        self.control_frame(
            ClientId::SERVER,
            id,
            SmpHeader::new(MessageKind::Advertisement, AdvertisementOption::Request.raw()),
        )
    }

    /// Builds the disconnect notice and forgets the registration.
    pub fn disconnect(&mut self) -> Vec<u8> {
        self.connected = false;
        self.connect_requested = false;
        let id = self.next_id();
        self.control_frame(
            ClientId::SERVER,
            id,
            SmpHeader::new(
                MessageKind::Advertisement,
                AdvertisementOption::Disconnect.raw(),
            ),
        )
    }

    /// Queues an unreliable message to one destination.
    pub fn send(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dest: ClientId,
    ) -> Result<MessageId, ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let plan = fragment::plan(body.len(), 0)?;
        let id = self.next_id();
        self.enqueue_basic(id, header, body, plan, dest, &[]);
        Ok(id)
    }

    /// Queues an unreliable message to several destinations at once. A
    /// single destination collapses to a singlecast.
    pub fn send_multicast(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dests: &[ClientId],
    ) -> Result<MessageId, ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        match dests {
            [] => Err(ClientError::NoDestinations),
            [single] => self.send(header, body, *single),
            _ => {
                let plan = fragment::plan(body.len(), dests.len())?;
                let id = self.next_id();
                self.enqueue_basic(id, header, body, plan, ClientId::MULTICAST, dests);
                Ok(id)
            }
        }
    }

    /// Queues a reliable message: every fragment is retransmitted until
    /// the destination acknowledges it or the safe-send timeout expires.
    pub fn send_reliable(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dest: ClientId,
        now: Instant,
    ) -> Result<MessageId, ClientError> {
        self.send_reliable_multicast(header, body, &[dest], now)
    }

    /// Reliable multicast: the acknowledgement matrix tracks every
    /// destination separately, and retransmissions go only to the
    /// destinations still missing.
    pub fn send_reliable_multicast(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dests: &[ClientId],
        now: Instant,
    ) -> Result<MessageId, ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        if dests.is_empty() {
            return Err(ClientError::NoDestinations);
        }
        let trailer_len = if dests.len() > 1 { dests.len() } else { 0 };
        let plan = fragment::plan(body.len(), trailer_len)?;
        let id = self.next_id();
        let entry = SafeOutgoing::new(id, header, dests, body, plan, now);
        for part in 0..entry.part_count() {
            self.queue.push_back(QueuedPacket::Reliable { id, part });
        }
        self.safe_outgoing.insert(id, entry);
        Ok(id)
    }

    fn enqueue_basic(
        &mut self,
        id: MessageId,
        header: SmpHeader,
        body: &[u8],
        plan: FragmentPlan,
        dst: ClientId,
        trailer: &[ClientId],
    ) {
        for part in 0..plan.total {
            let slice = plan.slice(body, part);
            let serp = SerpHeader::new(
                self.client_id,
                dst,
                (HEADERS_LEN + slice.len()) as u16,
                part,
                plan.total,
                id,
            );
            self.queue.push_back(QueuedPacket::Basic {
                bytes: encode_packet(&serp, &header, slice, trailer),
            });
        }
    }

    /// Moves all delivered messages out.
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.inbox)
    }

    /// Moves out only the delivered messages of one SMP kind, preserving
    /// the arrival order of the rest.
    pub fn take_messages_of_kind(&mut self, kind: u16) -> Vec<Message> {
        let mut taken = Vec::new();
        let mut rest = Vec::new();
        for msg in self.inbox.drain(..) {
            if msg.header.kind == kind {
                taken.push(msg);
            } else {
                rest.push(msg);
            }
        }
        self.inbox = rest;
        taken
    }

    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    /// Test and introspection hook into the reliable-send table.
    pub fn find_outgoing(&self, id: MessageId) -> Option<&SafeOutgoing> {
        self.safe_outgoing.get(&id)
    }

    pub fn pending_partials(&self) -> usize {
        self.partial_incoming.len()
    }

    pub fn queued_packets(&self) -> usize {
        self.queue.len()
    }

    /// Dispatches one datagram received from the relay.
    ///
    /// Returns frames to transmit right away: acknowledgements and echo
    /// replies are control traffic and bypass the token bucket, exactly
    /// like the relay's own replies.
    pub fn handle_datagram(
        &mut self,
        datagram: &[u8],
        now: Instant,
    ) -> SmallVec<[Vec<u8>; 2]> {
        let mut replies = SmallVec::new();

        let Some(serp) = SerpHeader::read(datagram) else {
            warn!(len = datagram.len(), "datagram shorter than a SERP header");
            return replies;
        };
        let len = serp.len as usize;
        if len > datagram.len() {
            warn!(
                header = len,
                datagram = datagram.len(),
                "length field exceeds datagram, dropping"
            );
            return replies;
        }
        if len < HEADERS_LEN {
            warn!(header = len, "packet too short for an SMP header, dropping");
            return replies;
        }
        // Guaranteed by the two checks above.
        let Some(smp) = SmpHeader::read(datagram) else {
            return replies;
        };
        let body = &datagram[HEADERS_LEN..len];

        if serp.src.is_server() {
            self.handle_server_packet(&serp, &smp, body, &mut replies);
            return replies;
        }

        match MessageKind::from_raw(smp.kind) {
            None => {
                warn!(kind = smp.kind, src = %serp.src, "unknown SMP kind, dropping");
            }
            Some(MessageKind::MessageReceived) => self.handle_ack(&serp),
            Some(_) => self.handle_data(&serp, &smp, body, now, &mut replies),
        }
        replies
    }

    fn handle_server_packet(
        &mut self,
        serp: &SerpHeader,
        smp: &SmpHeader,
        body: &[u8],
        replies: &mut SmallVec<[Vec<u8>; 2]>,
    ) {
        match MessageKind::from_raw(smp.kind) {
            Some(MessageKind::Advertisement) => match AdvertisementOption::from_raw(smp.option) {
                Some(AdvertisementOption::Ok) => {
                    if body.len() != 2 {
                        warn!(
                            len = body.len(),
                            "advertisement reply with malformed id payload"
                        );
                        return;
                    }
                    let id = ClientId(u16::from_be_bytes([body[0], body[1]]));
                    if !id.is_assignable() {
                        warn!(%id, "relay assigned a reserved id, ignoring");
                        return;
                    }
                    self.client_id = id;
                    self.connected = true;
                    info!(%id, "connected to relay");
                    self.events.push_back(ClientEvent::Connected(id));
                }
                Some(AdvertisementOption::Disconnect) => {
                    info!("relay ended the registration");
                    self.connected = false;
                    self.connect_requested = false;
                    self.events.push_back(ClientEvent::Disconnected);
                }
                Some(AdvertisementOption::Request) => {
                    warn!("relay sent a connection request, ignoring");
                }
                None => warn!(option = smp.option, "unknown advertisement option"),
            },
            Some(MessageKind::Echo) => match EchoOption::from_raw(smp.option) {
                Some(EchoOption::Request) => {
                    // The relay pings idle clients; answer with its own
                    // id and payload so the round trip is attributable.
                    let reply_serp = SerpHeader::new(
                        self.client_id,
                        ClientId::SERVER,
                        serp.len,
                        0,
                        1,
                        serp.id,
                    );
                    let reply_smp = SmpHeader::new(MessageKind::Echo, EchoOption::Reply.raw());
                    replies.push(encode_packet(&reply_serp, &reply_smp, body, &[]));
                }
                Some(EchoOption::Reply) => {
                    debug!("echo reply from relay");
                }
                None => warn!(option = smp.option, "unknown echo option"),
            },
            Some(MessageKind::Error) => {
                warn!(
                    option = smp.option,
                    body = %String::from_utf8_lossy(body),
                    "relay reported an error"
                );
                self.events.push_back(ClientEvent::ServerError {
                    option: smp.option,
                    body: body.to_vec(),
                });
            }
            _ => {
                warn!(kind = smp.kind, "unexpected SMP kind from relay, dropping");
            }
        }
    }

    /// A peer acknowledged one fragment of one of our reliable sends.
    fn handle_ack(&mut self, serp: &SerpHeader) {
        let Some(entry) = self.safe_outgoing.get_mut(&serp.id) else {
            // Already complete or expired; late acks are expected.
            return;
        };
        if entry.record_ack(serp.src, serp.part) && entry.is_complete() {
            debug!(id = %serp.id, "reliable send fully acknowledged");
            self.safe_outgoing.remove(&serp.id);
            self.events.push_back(ClientEvent::SendCompleted(serp.id));
        }
    }

    fn handle_data(
        &mut self,
        serp: &SerpHeader,
        smp: &SmpHeader,
        body: &[u8],
        now: Instant,
        replies: &mut SmallVec<[Vec<u8>; 2]>,
    ) {
        let key = (serp.id, serp.src);
        let safe = serp.safe_send();

        // A delivered reliable message may still see straggling duplicate
        // fragments; ack them without re-delivering.
        if safe && self.seen_reliable.contains_key(&key) {
            replies.push(self.ack_frame(serp));
            return;
        }

        let total = if serp.total == 0 {
            warn!(src = %serp.src, id = %serp.id, "fragment with total 0, treating as 1");
            1
        } else {
            serp.total
        };

        if total == 1 {
            self.inbox.push(Message {
                src: serp.src,
                header: *smp,
                body: body.to_vec(),
            });
            if safe {
                self.seen_reliable.insert(key, now);
                replies.push(self.ack_frame(serp));
            }
            return;
        }

        let entry = self
            .partial_incoming
            .entry(key)
            .or_insert_with(|| PartialMessage::new(serp.src, serp.id, safe, *smp, total, now));
        if entry.total() != total {
            warn!(
                src = %serp.src,
                id = %serp.id,
                recorded = entry.total(),
                got = total,
                "fragment disagrees with recorded total, dropping"
            );
            return;
        }

        match entry.accept(serp.part, body) {
            FragmentOutcome::Complete => {
                if let Some(done) = self.partial_incoming.remove(&key) {
                    let header = done.header;
                    let src = done.src;
                    self.inbox.push(Message {
                        src,
                        header,
                        body: done.assemble(),
                    });
                }
                if safe {
                    self.seen_reliable.insert(key, now);
                    replies.push(self.ack_frame(serp));
                }
            }
            FragmentOutcome::Stored | FragmentOutcome::Duplicate => {
                if safe {
                    replies.push(self.ack_frame(serp));
                }
            }
            FragmentOutcome::PartOutOfRange => {
                warn!(src = %serp.src, id = %serp.id, part = serp.part, "fragment index out of range");
            }
            FragmentOutcome::SizeMismatch => {
                warn!(src = %serp.src, id = %serp.id, part = serp.part, "fragment size mismatch, dropping");
            }
        }
    }

    /// The MESSAGE_RECEIVED frame acknowledging one specific fragment.
    fn ack_frame(&self, received: &SerpHeader) -> Vec<u8> {
        let serp = SerpHeader::new(
            self.client_id,
            received.src,
            HEADERS_LEN as u16,
            received.part,
            received.total,
            received.id,
        );
        let smp = SmpHeader::new(MessageKind::MessageReceived, 0);
        encode_packet(&serp, &smp, &[], &[])
    }

    /// Runs the timeout sweeps and drains the paced queue. Returns the
    /// datagrams to transmit this tick.
    pub fn update(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut out = Vec::new();

        self.sweep_safe_outgoing(now);
        self.sweep_incoming(now);
        self.advertise_retry(now, &mut out);
        self.pump_queue(now, &mut out);

        out
    }

    fn sweep_safe_outgoing(&mut self, now: Instant) {
        let timeout = self.config.safe_send_timeout;
        let resend = self.config.resend_interval;

        let expired: Vec<MessageId> = self
            .safe_outgoing
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.first_sent) >= timeout)
            .map(|(&id, _)| id)
            .collect();
        for id in expired {
            warn!(%id, "reliable send expired without full acknowledgement");
            self.safe_outgoing.remove(&id);
            self.events.push_back(ClientEvent::SendExpired(id));
        }

        let mut to_requeue: Vec<(MessageId, SmallVec<[u8; 8]>)> = Vec::new();
        for (&id, entry) in self.safe_outgoing.iter_mut() {
            if now.saturating_duration_since(entry.last_sent) >= resend {
                let parts = entry.pending_parts();
                if !parts.is_empty() {
                    // Mark the entry as scheduled so one resend interval
                    // queues each part exactly once.
                    entry.last_sent = now;
                    to_requeue.push((id, parts));
                }
            }
        }
        for (id, parts) in to_requeue {
            debug!(%id, parts = parts.len(), "queueing retransmission");
            for part in parts {
                self.queue.push_back(QueuedPacket::Reliable { id, part });
            }
        }
    }

    fn sweep_incoming(&mut self, now: Instant) {
        let timeout = self.config.incoming_timeout;
        self.partial_incoming.retain(|(id, src), entry| {
            let keep = now.saturating_duration_since(entry.first_received) < timeout;
            if !keep {
                warn!(%id, %src, missing = entry.missing(), "discarding stale partial message");
            }
            keep
        });
        self.seen_reliable
            .retain(|_, received| now.saturating_duration_since(*received) < timeout);
    }

    fn advertise_retry(&mut self, now: Instant, out: &mut Vec<Vec<u8>>) {
        if !self.connect_requested || self.connected {
            return;
        }
        let due = match self.last_advertise {
            Some(last) => now.saturating_duration_since(last) >= self.config.advertise_retry,
            None => true,
        };
        if due {
            debug!("repeating connection request");
            self.last_advertise = Some(now);
            let id = self.next_id();
            out.push(self.control_frame(
                ClientId::SERVER,
                id,
                SmpHeader::new(MessageKind::Advertisement, AdvertisementOption::Request.raw()),
            ));
        }
    }

    fn pump_queue(&mut self, now: Instant, out: &mut Vec<Vec<u8>>) {
        let mut budget = self.budget.begin_tick(now);
        loop {
            let Some(head) = self.queue.front() else {
                self.budget.finish_drained();
                return;
            };
            let size = Self::wire_size(&self.safe_outgoing, head);
            if size == 0 {
                // A reliable reference whose message completed or expired.
                self.queue.pop_front();
                continue;
            }
            if size > budget {
                self.budget.finish_blocked(budget);
                return;
            }
            let Some(head) = self.queue.pop_front() else {
                return;
            };
            match head {
                QueuedPacket::Basic { bytes } => {
                    budget -= size;
                    out.push(bytes);
                }
                QueuedPacket::Reliable { id, part } => {
                    if let Some(frame) = self.encode_reliable(id, part, now) {
                        budget -= size;
                        out.push(frame);
                    }
                }
            }
        }
    }

    /// On-wire size the queue head would occupy, or 0 when popping it
    /// would send nothing.
    fn wire_size(safe_outgoing: &HashMap<MessageId, SafeOutgoing>, packet: &QueuedPacket) -> usize {
        match packet {
            QueuedPacket::Basic { bytes } => bytes.len(),
            QueuedPacket::Reliable { id, part } => {
                let Some(entry) = safe_outgoing.get(id) else {
                    return 0;
                };
                let Some(payload) = entry.part_payload(*part) else {
                    return 0;
                };
                let dests = entry.unacked_destinations(*part);
                match dests.len() {
                    0 => 0,
                    1 => HEADERS_LEN + payload.len(),
                    n => HEADERS_LEN + payload.len() + 2 * n,
                }
            }
        }
    }

    /// Encodes a reliable fragment against the destinations still missing
    /// an acknowledgement: one left means a plain singlecast, several mean
    /// a multicast whose trailer lists only the stragglers.
    fn encode_reliable(&mut self, id: MessageId, part: u8, now: Instant) -> Option<Vec<u8>> {
        let entry = self.safe_outgoing.get_mut(&id)?;
        let payload = entry.part_payload(part)?.to_vec();
        let dests = entry.unacked_destinations(part);
        if dests.is_empty() {
            return None;
        }
        let (dst, trailer): (ClientId, &[ClientId]) = if dests.len() == 1 {
            (dests[0], &[])
        } else {
            (ClientId::MULTICAST, &dests)
        };
        let mut serp = SerpHeader::new(
            self.client_id,
            dst,
            (HEADERS_LEN + payload.len()) as u16,
            part,
            entry.part_count(),
            id,
        );
        serp.set_safe_send();
        entry.last_sent = now;
        Some(encode_packet(&serp, &entry.header, &payload, trailer))
    }
}
