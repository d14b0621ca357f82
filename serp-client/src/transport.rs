use crate::config::ClientConfig;
use crate::error::ClientError;
use rand::Rng;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, warn};

/// Lowest port of the ephemeral range clients bind in.
pub const EPHEMERAL_PORT_MIN: u16 = 49152;
/// Highest port of the ephemeral range clients bind in.
pub const EPHEMERAL_PORT_MAX: u16 = 65535;

/// The client's bound UDP socket, fixed to one relay address.
///
/// Ordinary read timeouts surface as `Ok(None)` so the update loop can poll
/// without treating silence as a fault.
pub struct UdpChannel {
    socket: UdpSocket,
    server: SocketAddr,
}

impl UdpChannel {
    /// Binds to a uniformly random ephemeral port, retrying on conflicts.
    pub fn bind(config: &ClientConfig, rng: &mut impl Rng) -> Result<Self, ClientError> {
        for _ in 0..config.bind_attempts {
            let port = rng.gen_range(EPHEMERAL_PORT_MIN..=EPHEMERAL_PORT_MAX);
            match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)) {
                Ok(socket) => {
                    socket.set_read_timeout(Some(config.socket_timeout))?;
                    return Ok(Self {
                        socket,
                        server: config.server_addr,
                    });
                }
                Err(err) => {
                    debug!(port, %err, "bind failed, trying another port");
                }
            }
        }
        Err(ClientError::Bind(config.bind_attempts))
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives one datagram from the relay into `buf`.
    ///
    /// Returns `Ok(None)` on timeout. Datagrams arriving from any address
    /// other than the relay are dropped with a warning; nothing outside the
    /// relay is a valid peer.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((len, from)) => {
                    if from != self.server {
                        warn!(%from, "dropping datagram from unknown peer");
                        continue;
                    }
                    return Ok(Some(len));
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sends one datagram to the relay. A short write is an error.
    pub fn send(&self, frame: &[u8]) -> Result<usize, ClientError> {
        let sent = self.socket.send_to(frame, self.server)?;
        if sent != frame.len() {
            return Err(ClientError::PartialSend {
                sent,
                len: frame.len(),
            });
        }
        Ok(sent)
    }
}
