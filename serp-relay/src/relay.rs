use crate::config::RelayConfig;
use rand::rngs::StdRng;
use rand::Rng;
use serp_proto::{
    encode_packet, read_trailer, AdvertisementOption, ClientId, EchoOption, ErrorOption,
    MessageId, MessageKind, SerpHeader, SmpHeader, HEADERS_LEN, SERP_HEADER_LEN,
};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// A datagram the caller must transmit.
pub type Outbound = (SocketAddr, Vec<u8>);

/// One registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientEntry {
    pub addr: SocketAddr,
    /// Seconds since the last packet from this client.
    pub timeout_secs: u64,
}

/// The relay state machine: client table, admission, routing, liveness.
///
/// All handlers are pure with respect to I/O — they return the addressed
/// datagrams to send, and the daemon loop performs the sends. State lives
/// only in memory; a restart forgets everything.
pub struct Relay {
    config: RelayConfig,
    clients: HashMap<ClientId, ClientEntry>,
    next_message_id: u32,
    rng: StdRng,
    sleeping: bool,
    empty_secs: u64,
}

impl Relay {
    pub fn new(config: RelayConfig, rng: StdRng) -> Self {
        Self {
            config,
            clients: HashMap::new(),
            next_message_id: 1,
            rng,
            sleeping: false,
            empty_secs: 0,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_addr(&self, id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&id).map(|entry| entry.addr)
    }

    pub fn client_timeout(&self, id: ClientId) -> Option<u64> {
        self.clients.get(&id).map(|entry| entry.timeout_secs)
    }

    fn next_id(&mut self) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        MessageId(id)
    }

    /// A headers-plus-payload control frame from the server.
    fn server_frame(&mut self, dst: ClientId, smp: SmpHeader, payload: &[u8]) -> Vec<u8> {
        let id = self.next_id();
        let serp = SerpHeader::new(
            ClientId::SERVER,
            dst,
            (HEADERS_LEN + payload.len()) as u16,
            0,
            1,
            id,
        );
        encode_packet(&serp, &smp, payload, &[])
    }

    fn error_frame(&mut self, dst: ClientId, option: ErrorOption, payload: &[u8]) -> Vec<u8> {
        self.server_frame(
            dst,
            SmpHeader::new(MessageKind::Error, option.raw()),
            payload,
        )
    }

    /// Routes one received datagram. Returns the datagrams to send out.
    ///
    /// Any packet wakes the relay from sleep and zeroes the sender's
    /// timeout counter — unless the sender fails the impostor check, in
    /// which case the packet is dropped before touching any state.
    pub fn handle_datagram(&mut self, from: SocketAddr, datagram: &[u8]) -> SmallVec<[Outbound; 4]> {
        let mut out = SmallVec::new();

        if self.sleeping {
            info!("received a packet, waking up");
            self.sleeping = false;
        }
        self.empty_secs = 0;

        let Some(serp) = SerpHeader::read(datagram) else {
            warn!(len = datagram.len(), %from, "datagram shorter than a SERP header");
            return out;
        };
        if serp.len as usize > datagram.len() {
            warn!(
                header = serp.len,
                datagram = datagram.len(),
                %from,
                "length field exceeds datagram, dropping"
            );
            return out;
        }
        if let Some(entry) = self.clients.get(&serp.src) {
            if entry.addr != from {
                warn!(src = %serp.src, %from, "impostor address, dropping");
                return out;
            }
        }

        if serp.dst.is_server() {
            self.handle_server_message(&serp, from, datagram, &mut out);
        } else if serp.dst.is_multicast() {
            self.relay_multicast(&serp, datagram, &mut out);
        } else {
            self.relay_singlecast(&serp, datagram, &mut out);
        }

        if let Some(entry) = self.clients.get_mut(&serp.src) {
            entry.timeout_secs = 0;
        }
        out
    }

    /// Dispatches a packet addressed to the server itself (`dst == 0`).
    fn handle_server_message(
        &mut self,
        serp: &SerpHeader,
        from: SocketAddr,
        datagram: &[u8],
        out: &mut SmallVec<[Outbound; 4]>,
    ) {
        if (serp.len as usize) < HEADERS_LEN {
            warn!(%from, "server-addressed packet without an SMP header");
            return;
        }
        let Some(smp) = SmpHeader::read(datagram) else {
            return;
        };
        let body = &datagram[HEADERS_LEN..serp.len as usize];

        match MessageKind::from_raw(smp.kind) {
            Some(MessageKind::Advertisement) => match AdvertisementOption::from_raw(smp.option) {
                Some(AdvertisementOption::Request) => self.admit(from, out),
                Some(AdvertisementOption::Disconnect) => {
                    if self.clients.remove(&serp.src).is_some() {
                        info!(id = %serp.src, "client disconnected");
                    } else {
                        warn!(id = %serp.src, "disconnect from unregistered client");
                    }
                }
                Some(AdvertisementOption::Ok) => {
                    // Only the server hands out ids.
                    if let Some(addr) = self.client_addr(serp.src) {
                        let frame = self.error_frame(serp.src, ErrorOption::BadOption, &[]);
                        out.push((addr, frame));
                    } else {
                        warn!(src = %serp.src, "advertisement OK from unregistered client");
                    }
                }
                None => warn!(option = smp.option, "unknown advertisement option"),
            },
            Some(MessageKind::Echo) => match EchoOption::from_raw(smp.option) {
                Some(EchoOption::Request) => {
                    // Same id, same payload, back to where it came from.
                    let serp_reply =
                        SerpHeader::new(ClientId::SERVER, serp.src, serp.len, 0, 1, serp.id);
                    let smp_reply = SmpHeader::new(MessageKind::Echo, EchoOption::Reply.raw());
                    out.push((from, encode_packet(&serp_reply, &smp_reply, body, &[])));
                }
                Some(EchoOption::Reply) => {
                    debug!(src = %serp.src, "echo reply");
                }
                None => warn!(option = smp.option, "unknown echo option"),
            },
            Some(MessageKind::Error) => {
                if body.is_empty() {
                    warn!(client = %serp.src, option = smp.option, "client reported an error");
                } else {
                    warn!(
                        client = %serp.src,
                        option = smp.option,
                        message = %String::from_utf8_lossy(body),
                        "client reported an error"
                    );
                }
            }
            Some(_) => {
                warn!(kind = smp.kind, src = %serp.src, "unexpected SMP kind for the server");
            }
            None => {
                warn!(kind = smp.kind, src = %serp.src, "unknown SMP kind, dropping");
            }
        }
    }

    /// Admission. Requests are idempotent per address: a client that asks
    /// again gets its existing id back.
    fn admit(&mut self, from: SocketAddr, out: &mut SmallVec<[Outbound; 4]>) {
        if let Some(id) = self
            .clients
            .iter()
            .find(|(_, entry)| entry.addr == from)
            .map(|(&id, _)| id)
        {
            debug!(%id, %from, "repeated advertisement, replaying id");
            let frame = self.advertisement_ok(id);
            out.push((from, frame));
            return;
        }

        if self.clients.len() >= self.config.max_clients {
            warn!(%from, "client table full, refusing admission");
            let frame = self.error_frame(ClientId::SERVER, ErrorOption::TooManyClients, &[]);
            out.push((from, frame));
            return;
        }

        match self.allocate_id() {
            Some(id) => {
                self.clients.insert(
                    id,
                    ClientEntry {
                        addr: from,
                        timeout_secs: 0,
                    },
                );
                info!(%id, %from, "client connected");
                let frame = self.advertisement_ok(id);
                out.push((from, frame));
            }
            None => {
                warn!(%from, "could not allocate a client id");
                let frame = self.error_frame(
                    ClientId::SERVER,
                    ErrorOption::Unspecified,
                    b"could not allocate a client id",
                );
                out.push((from, frame));
            }
        }
    }

    fn advertisement_ok(&mut self, id: ClientId) -> Vec<u8> {
        self.server_frame(
            id,
            SmpHeader::new(MessageKind::Advertisement, AdvertisementOption::Ok.raw()),
            &id.0.to_be_bytes(),
        )
    }

    /// Draws a fresh id from the assignable range, bounded attempts.
    fn allocate_id(&mut self) -> Option<ClientId> {
        for _ in 0..self.config.id_alloc_attempts {
            let id = ClientId(self.rng.gen_range(1..=0xFFFE));
            if !self.clients.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }

    /// Forwards a packet addressed to one client, verbatim up to `len`.
    fn relay_singlecast(
        &mut self,
        serp: &SerpHeader,
        datagram: &[u8],
        out: &mut SmallVec<[Outbound; 4]>,
    ) {
        match self.clients.get(&serp.dst) {
            Some(entry) => {
                out.push((entry.addr, datagram[..serp.len as usize].to_vec()));
            }
            None => {
                debug!(dst = %serp.dst, src = %serp.src, "destination not registered");
                self.notify_not_found(serp.src, serp.dst, out);
            }
        }
    }

    /// Fans a multicast packet out to every trailer destination, rewriting
    /// the destination field per copy. The trailer itself is stripped.
    fn relay_multicast(
        &mut self,
        serp: &SerpHeader,
        datagram: &[u8],
        out: &mut SmallVec<[Outbound; 4]>,
    ) {
        let destinations = match read_trailer(datagram, serp.len) {
            Ok(destinations) => destinations,
            Err(err) => {
                warn!(src = %serp.src, %err, "bad multicast trailer, dropping");
                return;
            }
        };
        if destinations.is_empty() {
            warn!(src = %serp.src, "multicast with no destinations");
            return;
        }

        let mut frame = datagram[..serp.len as usize].to_vec();
        let mut header = *serp;
        for dst in destinations {
            match self.clients.get(&dst) {
                Some(entry) => {
                    header.dst = dst;
                    frame[..SERP_HEADER_LEN].copy_from_slice(&header.encode());
                    out.push((entry.addr, frame.clone()));
                }
                None => {
                    debug!(%dst, src = %serp.src, "multicast destination not registered");
                    self.notify_not_found(serp.src, dst, out);
                }
            }
        }
    }

    /// Reports an unknown destination back to the source — but only to a
    /// registered source. Replying to an unverified address would hand a
    /// forger an amplifier.
    fn notify_not_found(
        &mut self,
        src: ClientId,
        missing: ClientId,
        out: &mut SmallVec<[Outbound; 4]>,
    ) {
        if let Some(addr) = self.client_addr(src) {
            let frame = self.error_frame(src, ErrorOption::NotFound, &missing.0.to_be_bytes());
            out.push((addr, frame));
        }
    }

    /// Advances the liveness bookkeeping by `elapsed_secs`.
    ///
    /// Quiet clients are pinged past the ping threshold and evicted (with
    /// a disconnect notice) past the timeout. An empty table accumulates
    /// toward sleep mode instead.
    pub fn tick(&mut self, elapsed_secs: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        if self.clients.is_empty() {
            self.empty_secs += elapsed_secs;
            if !self.sleeping && self.empty_secs > self.config.sleep_timeout_secs {
                info!("no clients for a while, going to sleep");
                self.sleeping = true;
            }
            return out;
        }

        let mut evicted: Vec<ClientId> = Vec::new();
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            let Some(entry) = self.clients.get_mut(&id) else {
                continue;
            };
            entry.timeout_secs += elapsed_secs;
            let timeout = entry.timeout_secs;
            let addr = entry.addr;
            if timeout > self.config.client_timeout_secs {
                info!(%id, timeout, "disconnecting client for inactivity");
                let frame = self.server_frame(
                    id,
                    SmpHeader::new(
                        MessageKind::Advertisement,
                        AdvertisementOption::Disconnect.raw(),
                    ),
                    &[],
                );
                out.push((addr, frame));
                evicted.push(id);
            } else if timeout > self.config.ping_after_secs {
                debug!(%id, timeout, "pinging quiet client");
                let frame = self.server_frame(
                    id,
                    SmpHeader::new(MessageKind::Echo, EchoOption::Request.raw()),
                    &[],
                );
                out.push((addr, frame));
            }
        }
        for id in evicted {
            self.clients.remove(&id);
        }
        out
    }

    /// Sends a disconnect notice to every live client and clears the
    /// table. Called on cooperative shutdown.
    pub fn shutdown(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        let entries: Vec<(ClientId, SocketAddr)> = self
            .clients
            .iter()
            .map(|(&id, entry)| (id, entry.addr))
            .collect();
        for (id, addr) in entries {
            let frame = self.server_frame(
                id,
                SmpHeader::new(
                    MessageKind::Advertisement,
                    AdvertisementOption::Disconnect.raw(),
                ),
                &[],
            );
            out.push((addr, frame));
        }
        self.clients.clear();
        info!("relay shut down");
        out
    }
}
