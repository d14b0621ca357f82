use rand::rngs::StdRng;
use rand::SeedableRng;
use serp_client::transport::{UdpChannel, EPHEMERAL_PORT_MAX, EPHEMERAL_PORT_MIN};
use serp_client::ClientConfig;
use std::net::UdpSocket;
use std::time::Duration;

/// A config pointing at a throwaway "relay" socket on loopback.
fn config_for(server: &UdpSocket) -> ClientConfig {
    ClientConfig {
        server_addr: server.local_addr().unwrap(),
        socket_timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

#[test]
fn test_bind_picks_an_ephemeral_port() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut rng = StdRng::from_entropy();
    let channel = UdpChannel::bind(&config_for(&server), &mut rng).unwrap();
    let port = channel.local_addr().unwrap().port();
    assert!((EPHEMERAL_PORT_MIN..=EPHEMERAL_PORT_MAX).contains(&port));
}

#[test]
fn test_send_and_receive_loopback() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut rng = StdRng::from_entropy();
    let channel = UdpChannel::bind(&config_for(&server), &mut rng).unwrap();

    let sent = channel.send(b"ping").unwrap();
    assert_eq!(sent, 4);

    let mut buf = [0u8; 64];
    let (len, client_addr) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"ping");

    server.send_to(b"pong", client_addr).unwrap();
    let mut buf = [0u8; 64];
    let mut received = None;
    for _ in 0..40 {
        if let Some(len) = channel.recv(&mut buf).unwrap() {
            received = Some(len);
            break;
        }
    }
    let len = received.expect("no reply within the poll window");
    assert_eq!(&buf[..len], b"pong");
}

#[test]
fn test_recv_timeout_is_not_an_error() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut rng = StdRng::from_entropy();
    let channel = UdpChannel::bind(&config_for(&server), &mut rng).unwrap();
    let mut buf = [0u8; 64];
    assert!(channel.recv(&mut buf).unwrap().is_none());
}

#[test]
fn test_datagrams_from_strangers_are_dropped() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut rng = StdRng::from_entropy();
    let channel = UdpChannel::bind(&config_for(&server), &mut rng).unwrap();
    let port = channel.local_addr().unwrap().port();

    let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
    stranger.send_to(b"forged", ("127.0.0.1", port)).unwrap();

    // The forged datagram is skipped and the recv times out quietly.
    let mut buf = [0u8; 64];
    assert!(channel.recv(&mut buf).unwrap().is_none());
}
