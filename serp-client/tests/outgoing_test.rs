use serp_client::fragment::plan;
use serp_client::outgoing::SafeOutgoing;
use serp_proto::{ClientId, MessageId, SmpHeader};
use std::time::Instant;

fn safe_outgoing(payload_len: usize, dests: &[ClientId]) -> SafeOutgoing {
    let payload = vec![0xabu8; payload_len];
    let trailer = if dests.len() > 1 { dests.len() } else { 0 };
    let plan = plan(payload.len(), trailer).unwrap();
    SafeOutgoing::new(
        MessageId(7),
        SmpHeader::new(0x1000u16, 0),
        dests,
        &payload,
        plan,
        Instant::now(),
    )
}

#[test]
fn test_matrix_shape() {
    let b = ClientId(42);
    let c = ClientId(88);
    let out = safe_outgoing(9000, &[b, c]);
    assert_eq!(out.part_count(), 3);
    assert_eq!(out.unacked_parts_total(), 3);
    assert_eq!(out.unacked_parts_for(b), Some(3));
    assert_eq!(out.unacked_parts_for(c), Some(3));
    assert_eq!(out.unacked_destinations(0).as_slice(), &[b, c]);
    assert_eq!(out.pending_parts().as_slice(), &[0, 1, 2]);
}

#[test]
fn test_ack_shrinks_destination_set() {
    let b = ClientId(42);
    let c = ClientId(88);
    let mut out = safe_outgoing(9000, &[b, c]);

    assert!(out.record_ack(b, 1));
    assert_eq!(out.unacked_destinations(1).as_slice(), &[c]);
    assert_eq!(out.unacked_parts_for(b), Some(2));
    // Part 1 still pending until c acks it too.
    assert_eq!(out.unacked_parts_total(), 3);

    assert!(out.record_ack(c, 1));
    assert_eq!(out.unacked_parts_total(), 2);
    assert!(out.unacked_destinations(1).is_empty());
    assert_eq!(out.pending_parts().as_slice(), &[0, 2]);
}

#[test]
fn test_ack_idempotence() {
    let b = ClientId(42);
    let mut out = safe_outgoing(100, &[b]);
    assert!(out.record_ack(b, 0));
    // The second identical ack changes nothing.
    assert!(!out.record_ack(b, 0));
    assert_eq!(out.unacked_parts_total(), 0);
    assert!(out.is_complete());
}

#[test]
fn test_ack_from_unknown_destination_ignored() {
    let b = ClientId(42);
    let mut out = safe_outgoing(100, &[b]);
    assert!(!out.record_ack(ClientId(99), 0));
    assert_eq!(out.unacked_parts_total(), 1);
}

#[test]
fn test_ack_for_unknown_part_ignored() {
    let b = ClientId(42);
    let mut out = safe_outgoing(100, &[b]);
    assert!(!out.record_ack(b, 5));
    assert_eq!(out.unacked_parts_total(), 1);
}

#[test]
fn test_completion_requires_every_part_and_destination() {
    let b = ClientId(42);
    let c = ClientId(88);
    let mut out = safe_outgoing(9000, &[b, c]);
    for part in 0..3 {
        out.record_ack(b, part);
    }
    assert!(!out.is_complete());
    assert_eq!(out.unacked_parts_for(b), Some(0));
    assert_eq!(out.unacked_parts_for(c), Some(3));
    for part in 0..3 {
        out.record_ack(c, part);
    }
    assert!(out.is_complete());
}

#[test]
fn test_empty_payload_still_has_one_part() {
    let b = ClientId(42);
    let mut out = safe_outgoing(0, &[b]);
    assert_eq!(out.part_count(), 1);
    assert_eq!(out.part_payload(0), Some(&[] as &[u8]));
    out.record_ack(b, 0);
    assert!(out.is_complete());
}
