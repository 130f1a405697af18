//! Chunk-boundary and framing edge cases for the inbound path.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use futures::StreamExt;
use peer_wire::core::codec::PeerWireCodec;
use peer_wire::core::reassembler::FrameReassembler;
use peer_wire::error::ProtocolError;
use peer_wire::protocol::dispatcher::{EventKind, EventRouter};
use peer_wire::protocol::handshake::Handshake;
use peer_wire::protocol::message::{BlockRequest, Message};
use tokio_util::codec::FramedRead;

fn handshake() -> Handshake {
    Handshake::new([0xAB; 20], *b"-PW0001-abcdefghijkl")
}

fn kinds(reassembler: &mut FrameReassembler, chunk: &[u8]) -> Vec<EventKind> {
    reassembler
        .feed(chunk)
        .map(|frame| EventRouter::route(&frame.unwrap()).unwrap().kind)
        .collect()
}

#[test]
fn test_choke_split_inside_length_prefix() {
    let mut reassembler = FrameReassembler::after_handshake(1024);
    assert!(kinds(&mut reassembler, &[0, 0]).is_empty());
    assert_eq!(reassembler.pending_len(), 2);
    assert_eq!(kinds(&mut reassembler, &[0, 1, 0]), [EventKind::Choke]);
    assert_eq!(reassembler.pending_len(), 0);
}

#[test]
fn test_split_before_id_byte() {
    let mut reassembler = FrameReassembler::after_handshake(1024);
    assert!(kinds(&mut reassembler, &[0, 0, 0, 5]).is_empty());
    assert!(kinds(&mut reassembler, &[4]).is_empty());
    assert_eq!(kinds(&mut reassembler, &[0, 0, 0, 9]), [EventKind::Have]);
}

#[test]
fn test_split_inside_payload() {
    let wire = Message::Request(BlockRequest::new(1, 2, 3)).encode();
    let mut reassembler = FrameReassembler::after_handshake(1024);
    assert!(kinds(&mut reassembler, &wire[..9]).is_empty());
    assert_eq!(kinds(&mut reassembler, &wire[9..]), [EventKind::Request]);
}

#[test]
fn test_complete_frame_not_held_behind_partial_tail() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&Message::Interested.encode());
    wire.extend_from_slice(&Message::Unchoke.encode());
    // First 3 bytes of a Have
    wire.extend_from_slice(&[0, 0, 0]);

    let mut reassembler = FrameReassembler::after_handshake(1024);
    assert_eq!(
        kinds(&mut reassembler, &wire),
        [EventKind::Interested, EventKind::Unchoke]
    );
    assert_eq!(reassembler.pending_len(), 3);
    assert_eq!(kinds(&mut reassembler, &[5, 4, 0, 0, 0, 1]), [EventKind::Have]);
}

#[test]
fn test_handshake_and_messages_in_one_chunk() {
    let mut wire = handshake().encode().to_vec();
    wire.extend_from_slice(&[0, 0, 0, 0]);
    wire.extend_from_slice(&Message::Have { piece_index: 1 }.encode());

    let mut reassembler = FrameReassembler::new(1024);
    assert_eq!(
        kinds(&mut reassembler, &wire),
        [EventKind::Handshake, EventKind::KeepAlive, EventKind::Have]
    );
}

#[test]
fn test_partial_handshake_emits_nothing() {
    let wire = handshake().encode();
    let mut reassembler = FrameReassembler::new(1024);

    assert!(kinds(&mut reassembler, &wire[..wire.len() - 1]).is_empty());
    assert!(!reassembler.handshake_received());
    assert_eq!(
        kinds(&mut reassembler, &wire[wire.len() - 1..]),
        [EventKind::Handshake]
    );
    assert!(reassembler.handshake_received());
}

#[test]
fn test_handshake_framing_applied_once() {
    // A second handshake-shaped blob is read as a length prefix: 0x13 'B' 'i' 't'.
    let mut wire = handshake().encode().to_vec();
    wire.extend_from_slice(&handshake().encode());

    let mut reassembler = FrameReassembler::new(1024 * 1024);
    let results: Vec<_> = reassembler.feed(&wire).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().is_handshake());
    assert!(matches!(
        results[1],
        Err(ProtocolError::ProtocolViolation {
            length: 0x1342_6974,
            ..
        })
    ));
}

#[test]
fn test_oversized_length_fails_fast() {
    let mut reassembler = FrameReassembler::after_handshake(16 * 1024);
    let results: Vec<_> = reassembler.feed(&[0xFF, 0xFF, 0xFF, 0xFF]).collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(ProtocolError::ProtocolViolation {
            length: 0xFFFF_FFFF,
            max: 16384
        })
    ));
}

#[test]
fn test_frames_before_violation_are_kept() {
    let mut wire = Message::Choke.encode().to_vec();
    wire.extend_from_slice(&[0x7F, 0, 0, 0]);

    let mut reassembler = FrameReassembler::after_handshake(1024);
    let results: Vec<_> = reassembler.feed(&wire).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn test_frame_exactly_at_limit() {
    let body_len = 64;
    let mut wire = vec![0, 0, 0, body_len as u8, 5];
    wire.extend(std::iter::repeat(0xFF).take(body_len - 1));

    let mut reassembler = FrameReassembler::after_handshake(body_len);
    assert_eq!(kinds(&mut reassembler, &wire), [EventKind::Bitfield]);
}

#[tokio::test]
async fn test_framed_read_over_chunked_stream() {
    let mut wire = handshake().encode().to_vec();
    for msg in [
        Message::Unchoke,
        Message::Have { piece_index: 42 },
        Message::KeepAlive,
        Message::Port { listen_port: 6881 },
    ] {
        wire.extend_from_slice(&msg.encode());
    }

    let mut reader = chunked_reader(&wire, 3);
    let mut framed = FramedRead::new(&mut reader, PeerWireCodec::default());

    let mut routed = Vec::new();
    while let Some(frame) = framed.next().await {
        routed.push(EventRouter::route(&frame.unwrap()).unwrap());
    }

    let names: Vec<_> = routed.iter().map(|r| r.kind.name()).collect();
    assert_eq!(names, ["handshake", "unchoke", "have", "keep-alive", "port"]);
    assert_eq!(routed[2].message, Message::Have { piece_index: 42 });
}

/// A reader that hands out `wire` at most `chunk` bytes per read.
fn chunked_reader(wire: &[u8], chunk: usize) -> impl tokio::io::AsyncRead + Unpin {
    let chunks: Vec<std::io::Result<bytes::Bytes>> = wire
        .chunks(chunk)
        .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
        .collect();
    tokio_util::io::StreamReader::new(futures::stream::iter(chunks))
}
