use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{ClientSession, Message};
use crate::transport::UdpChannel;
use crate::ClientEvent;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serp_proto::{ClientId, MessageId, SmpHeader, MAX_PACKET};
use std::time::Instant;
use tracing::warn;

/// The client network manager: one socket, one session, one reusable
/// packet buffer.
///
/// Everything runs on the caller's thread. [`update`](Self::update) is
/// meant to be called once per frame: it drains the socket, dispatches,
/// runs the timeout sweeps and transmits whatever the rate limiter
/// releases.
pub struct NetworkManager {
    channel: UdpChannel,
    session: ClientSession,
    buf: Box<[u8; MAX_PACKET]>,
}

impl NetworkManager {
    /// Binds an ephemeral UDP port and prepares a session for the
    /// configured relay. Does not send anything yet.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut rng = StdRng::from_entropy();
        let channel = UdpChannel::bind(&config, &mut rng)?;
        let session = ClientSession::new(config, &mut rng);
        Ok(Self {
            channel,
            session,
            buf: Box::new([0u8; MAX_PACKET]),
        })
    }

    /// Asks the relay for an identity. The request is repeated from
    /// [`update`](Self::update) until answered.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let frame = self.session.connect(Instant::now());
        self.channel.send(&frame)?;
        Ok(())
    }

    /// Notifies the relay and forgets the registration.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        let frame = self.session.disconnect();
        self.channel.send(&frame)?;
        Ok(())
    }

    pub fn client_id(&self) -> ClientId {
        self.session.client_id()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn set_bytes_per_second(&mut self, bytes_per_second: u32) {
        self.session.set_bytes_per_second(bytes_per_second);
    }

    pub fn send(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dest: ClientId,
    ) -> Result<MessageId, ClientError> {
        self.session.send(header, body, dest)
    }

    pub fn send_multicast(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dests: &[ClientId],
    ) -> Result<MessageId, ClientError> {
        self.session.send_multicast(header, body, dests)
    }

    pub fn send_reliable(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dest: ClientId,
    ) -> Result<MessageId, ClientError> {
        self.session.send_reliable(header, body, dest, Instant::now())
    }

    pub fn send_reliable_multicast(
        &mut self,
        header: SmpHeader,
        body: &[u8],
        dests: &[ClientId],
    ) -> Result<MessageId, ClientError> {
        self.session
            .send_reliable_multicast(header, body, dests, Instant::now())
    }

    /// One cooperative step: receive, dispatch, sweep, transmit.
    ///
    /// Individual send failures are logged and the packet dropped, like
    /// every other best-effort UDP path here; only a hard receive fault
    /// propagates, at which point the owning loop is expected to stop.
    pub fn update(&mut self) -> Result<(), ClientError> {
        let now = Instant::now();
        while let Some(len) = self.channel.recv(&mut self.buf[..])? {
            let datagram = &self.buf[..len.min(MAX_PACKET)];
            let replies = self.session.handle_datagram(datagram, now);
            for frame in replies {
                if let Err(err) = self.channel.send(&frame) {
                    warn!(%err, "failed to send control reply");
                }
            }
        }
        for frame in self.session.update(now) {
            if let Err(err) = self.channel.send(&frame) {
                warn!(%err, "failed to send queued packet");
            }
        }
        Ok(())
    }

    pub fn take_messages(&mut self) -> Vec<Message> {
        self.session.take_messages()
    }

    pub fn take_messages_of_kind(&mut self, kind: u16) -> Vec<Message> {
        self.session.take_messages_of_kind(kind)
    }

    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.session.poll_event()
    }
}
