use proptest::prelude::*;
use serp_proto::{ClientId, MessageId, SerpHeader, SmpHeader, SERP_HEADER_LEN};

#[test]
fn test_serp_header_layout() {
    let mut header = SerpHeader::new(
        ClientId(0x1234),
        ClientId(0x5678),
        0x9abc,
        3,
        7,
        MessageId(0xdead_beef),
    );
    header.set_safe_send();

    let bytes = header.encode();
    // src, dst, len big-endian
    assert_eq!(&bytes[0..2], &[0x12, 0x34]);
    assert_eq!(&bytes[2..4], &[0x56, 0x78]);
    assert_eq!(&bytes[4..6], &[0x9a, 0xbc]);
    // part and total are single bytes
    assert_eq!(bytes[6], 3);
    assert_eq!(bytes[7], 7);
    assert_eq!(&bytes[8..12], &[0xde, 0xad, 0xbe, 0xef]);
    // flags: only bit 0 set
    assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x00, 0x01]);
}

#[test]
fn test_serp_header_round_trip() {
    let header = SerpHeader::new(ClientId(17), ClientId(42), 28, 0, 1, MessageId(100));
    assert_eq!(SerpHeader::decode(&header.encode()), header);
}

#[test]
fn test_safe_send_flag() {
    let mut header = SerpHeader::new(ClientId(1), ClientId(2), 20, 0, 1, MessageId(0));
    assert!(!header.safe_send());
    header.set_safe_send();
    assert!(header.safe_send());
    assert_eq!(header.flags, 1);
}

#[test]
fn test_smp_header_round_trip() {
    let header = SmpHeader { kind: 0x1000, option: 0x0002 };
    let bytes = header.encode();
    assert_eq!(&bytes, &[0x10, 0x00, 0x00, 0x02]);
    assert_eq!(SmpHeader::decode(&bytes), header);
}

#[test]
fn test_read_requires_minimum_length() {
    let header = SerpHeader::new(ClientId(1), ClientId(2), 20, 0, 1, MessageId(9));
    let mut datagram = header.encode().to_vec();
    assert!(SerpHeader::read(&datagram).is_some());
    // An SMP header needs 4 more bytes.
    assert!(SmpHeader::read(&datagram).is_none());
    datagram.extend_from_slice(&SmpHeader { kind: 0, option: 0 }.encode());
    assert!(SmpHeader::read(&datagram).is_some());

    assert!(SerpHeader::read(&datagram[..SERP_HEADER_LEN - 1]).is_none());
}

proptest! {
    #[test]
    fn prop_serp_decode_encode_identity(bytes in prop::array::uniform16(any::<u8>())) {
        let header = SerpHeader::decode(&bytes);
        prop_assert_eq!(header.encode(), bytes);
    }

    #[test]
    fn prop_serp_encode_decode_identity(
        src in any::<u16>(),
        dst in any::<u16>(),
        len in any::<u16>(),
        part in any::<u8>(),
        total in any::<u8>(),
        id in any::<u32>(),
        flags in any::<u32>(),
    ) {
        let header = SerpHeader {
            src: ClientId(src),
            dst: ClientId(dst),
            len,
            part,
            total,
            id: MessageId(id),
            flags,
        };
        prop_assert_eq!(SerpHeader::decode(&header.encode()), header);
    }

    #[test]
    fn prop_smp_round_trip(kind in any::<u16>(), option in any::<u16>()) {
        let header = SmpHeader { kind, option };
        prop_assert_eq!(SmpHeader::decode(&header.encode()), header);
    }
}
