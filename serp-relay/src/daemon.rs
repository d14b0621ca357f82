use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::Relay;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serp_proto::MAX_PACKET;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Binds the relay socket and runs the main loop until `shutdown` is set
/// or the socket suffers a hard fault.
///
/// The loop is single-threaded and run-to-completion: one bounded `recv`,
/// then routing, then the once-per-second timeout bookkeeping. While the
/// relay sleeps (no clients for a while) the loop idles in coarse steps
/// and skips the bookkeeping entirely.
pub fn run(config: RelayConfig, shutdown: Arc<AtomicBool>) -> Result<(), RelayError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port))?;
    socket.set_read_timeout(Some(Duration::from_secs(config.socket_timeout_secs)))?;
    info!(port = config.port, "relay listening");

    let tick_every = Duration::from_secs(config.process_timeout_every_secs);
    let sleep_duration = Duration::from_secs(config.sleep_duration_secs);
    let mut relay = Relay::new(config, StdRng::from_entropy());
    let mut buf = [0u8; MAX_PACKET];
    let mut last_tick = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                for (addr, frame) in relay.handle_datagram(from, &buf[..len]) {
                    send_frame(&socket, addr, &frame);
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(err) => {
                error!(%err, "receive failed, stopping");
                break;
            }
        }

        if relay.is_sleeping() {
            thread::sleep(sleep_duration);
            last_tick = Instant::now();
            continue;
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_every {
            for (addr, frame) in relay.tick(elapsed.as_secs()) {
                send_frame(&socket, addr, &frame);
            }
            last_tick = Instant::now();
        }
    }

    for (addr, frame) in relay.shutdown() {
        send_frame(&socket, addr, &frame);
    }
    Ok(())
}

/// Best-effort send: failures are logged and the packet dropped. No
/// retries — reliability is the clients' responsibility.
fn send_frame(socket: &UdpSocket, addr: SocketAddr, frame: &[u8]) {
    match socket.send_to(frame, addr) {
        Ok(sent) if sent == frame.len() => {}
        Ok(sent) => warn!(%addr, sent, len = frame.len(), "short send"),
        Err(err) => warn!(%addr, %err, "send failed"),
    }
}
