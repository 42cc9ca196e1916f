//! Benchmarks for frame and transfer decoding
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wavescache::network::transfer::{compute_txid, decode_transfer};
use wavescache::network::wire::{build_score_frame, parse_frames};
use wavescache::network_type::NetworkType;

const TRANSFER_FRAME_HEX: &str = concat!(
    "000000a5123456781900000098a1d3f948040c2b4f19b50923f4e5a6605ca38b",
    "e3900da83940c656fd77d710182c7a0fa4b76cb789ac1a374f2b95e8ff2db726",
    "70bfc896992575e4e6f1f4d5cfcf5a87b18f04a9d59feec551438cc7437e39cd",
    "75328bc0c345bfc8fc918843c2548772ba2640000000000164155457a5000000",
    "003b9aca0000000000000186a001548d98afe734f1c188ca06fb6c1fc02b49fb",
    "0c2a2ae30713e90000",
);

fn transfer_frame() -> Vec<u8> {
    hex::decode(TRANSFER_FRAME_HEX).unwrap()
}

fn bench_parse_frames(c: &mut Criterion) {
    // One read holding a burst of transfers and a score
    let mut buf = Vec::new();
    for _ in 0..64 {
        buf.extend_from_slice(&transfer_frame());
    }
    buf.extend_from_slice(&build_score_frame(15_306_704_249_115_480_033_516));

    c.bench_function("parse_frames_64_transfers", |b| {
        b.iter(|| parse_frames(black_box(&buf)).filter(|f| f.is_ok()).count())
    });
}

fn bench_decode_transfer(c: &mut Criterion) {
    let frame = transfer_frame();
    let payload = &frame[17..];

    c.bench_function("decode_transfer", |b| {
        b.iter(|| decode_transfer(black_box(payload)).unwrap())
    });

    let tx = decode_transfer(payload).unwrap();
    c.bench_function("compute_txid", |b| b.iter(|| compute_txid(black_box(&tx))));
    c.bench_function("sender_address", |b| {
        b.iter(|| black_box(&tx).sender_address(NetworkType::Testnet).to_string())
    });
}

criterion_group!(benches, bench_parse_frames, bench_decode_transfer);
criterion_main!(benches);
