use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use peer_wire::core::codec::PeerWireCodec;
use peer_wire::core::reassembler::FrameReassembler;
use peer_wire::protocol::dispatcher::EventRouter;
use peer_wire::protocol::message::{Block, Message};
use tokio_util::codec::Encoder;

#[allow(clippy::unwrap_used)]
fn bench_piece_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("piece_encode_decode");
    let block_sizes = [64usize, 4096, 16384, 128 * 1024];

    for &size in &block_sizes {
        let msg = Message::Piece(Block::new(1, 0, vec![0u8; size]));
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("encode_{size}b"), |b| {
            let mut codec = PeerWireCodec::after_handshake(1024 * 1024);
            b.iter_batched(
                || BytesMut::with_capacity(size + 16),
                |mut buf| codec.encode(&msg, &mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });

        let wire = msg.encode();
        group.bench_function(format!("decode_{size}b"), |b| {
            b.iter(|| {
                let decoded = Message::decode(&wire);
                assert!(decoded.is_ok());
            })
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");

    let mut wire = Vec::new();
    for i in 0..256 {
        wire.extend_from_slice(&Message::Have { piece_index: i }.encode());
        wire.extend_from_slice(&Message::Piece(Block::new(i, 0, vec![0u8; 1024])).encode());
    }
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for chunk in [7usize, 512, 16 * 1024] {
        group.bench_function(format!("chunk_{chunk}b"), |b| {
            b.iter(|| {
                let mut reassembler = FrameReassembler::after_handshake(1024 * 1024);
                let mut count = 0usize;
                for piece in wire.chunks(chunk) {
                    for frame in reassembler.feed(piece) {
                        EventRouter::route(&frame.unwrap()).unwrap();
                        count += 1;
                    }
                }
                assert_eq!(count, 512);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_piece_encode_decode, bench_reassembly);
criterion_main!(benches);
