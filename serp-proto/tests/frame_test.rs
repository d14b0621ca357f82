use serp_proto::frame::packet_wire_len;
use serp_proto::{
    encode_packet, multicast_capacity, read_trailer, singlecast_capacity, ClientId, MessageId,
    MessageKind, SerpHeader, SmpHeader, WireError, HEADERS_LEN, MAX_PACKET,
};

#[test]
fn test_capacities() {
    assert_eq!(singlecast_capacity(), MAX_PACKET - HEADERS_LEN);
    assert_eq!(singlecast_capacity(), 3980);
    assert_eq!(multicast_capacity(2), Some(3976));
    // The trailer alone can exhaust the packet.
    assert_eq!(multicast_capacity((MAX_PACKET - HEADERS_LEN) / 2), Some(0));
    assert_eq!(multicast_capacity(MAX_PACKET), None);
}

#[test]
fn test_encode_packet_multicast() {
    let payload = [0u8];
    let dests = [ClientId(42), ClientId(88)];
    let len = (HEADERS_LEN + payload.len()) as u16;
    let serp = SerpHeader::new(ClientId(17), ClientId::MULTICAST, len, 0, 1, MessageId(101));
    let smp = SmpHeader::new(MessageKind::Application(0x1000), 0);

    let datagram = encode_packet(&serp, &smp, &payload, &dests);
    assert_eq!(datagram.len(), packet_wire_len(payload.len(), dests.len()));
    // `len` excludes the trailer.
    assert_eq!(datagram.len(), len as usize + 4);
    assert_eq!(&datagram[len as usize..], &[0x00, 0x2a, 0x00, 0x58]);

    let trailer = read_trailer(&datagram, len).unwrap();
    assert_eq!(trailer.as_slice(), &dests);
}

#[test]
fn test_read_trailer_empty() {
    let serp = SerpHeader::new(ClientId(1), ClientId(2), HEADERS_LEN as u16, 0, 1, MessageId(0));
    let datagram = encode_packet(&serp, &SmpHeader::default(), &[], &[]);
    let trailer = read_trailer(&datagram, HEADERS_LEN as u16).unwrap();
    assert!(trailer.is_empty());
}

#[test]
fn test_read_trailer_rejects_odd_length() {
    let serp = SerpHeader::new(ClientId(1), ClientId::MULTICAST, 20, 0, 1, MessageId(0));
    let mut datagram = encode_packet(&serp, &SmpHeader::default(), &[], &[ClientId(9)]);
    datagram.push(0xff);
    assert_eq!(read_trailer(&datagram, 20), Err(WireError::MalformedTrailer));
}

#[test]
fn test_read_trailer_rejects_len_past_datagram() {
    let datagram = [0u8; 20];
    assert_eq!(
        read_trailer(&datagram, 24),
        Err(WireError::LengthMismatch { header: 24, datagram: 20 })
    );
}

#[test]
fn test_message_kind_raw_values() {
    assert_eq!(MessageKind::Echo.raw(), 0);
    assert_eq!(MessageKind::Error.raw(), 1);
    assert_eq!(MessageKind::Advertisement.raw(), 2);
    assert_eq!(MessageKind::MessageReceived.raw(), 3);
    assert_eq!(MessageKind::from_raw(3), Some(MessageKind::MessageReceived));
    assert_eq!(
        MessageKind::from_raw(0x1000),
        Some(MessageKind::Application(0x1000))
    );
    // The gap between control and application kinds is unassigned.
    assert_eq!(MessageKind::from_raw(4), None);
    assert_eq!(MessageKind::from_raw(0x0fff), None);
}

#[test]
fn test_client_id_classes() {
    assert!(ClientId::SERVER.is_server());
    assert!(ClientId::MULTICAST.is_multicast());
    assert!(!ClientId::SERVER.is_assignable());
    assert!(!ClientId::MULTICAST.is_assignable());
    assert!(ClientId(1).is_assignable());
    assert!(ClientId(0xFFFE).is_assignable());
}
