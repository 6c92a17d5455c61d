// Proof-of-work mining benchmarks.
//
// Covers a full mine-to-valid-nonce run against the network's real
// difficulty target, plus the bare header-hash/meets-target check mining
// spends almost all of its time in.

use criterion::{criterion_group, criterion_main, Criterion};

use nova_protocol::block::{Block, BlockHeader, MiningControl};
use nova_protocol::crypto::NovaKeypair;

fn bench_mine_single_transaction_block(c: &mut Criterion) {
    let miner = NovaKeypair::generate();
    let control = MiningControl::new();

    c.bench_function("mining/mine_block", |b| {
        b.iter(|| {
            let coinbase = Block::coinbase_for(&miner).to_json();
            Block::mine("0".repeat(64), vec![coinbase], &control).unwrap()
        });
    });
}

fn bench_header_hash(c: &mut Criterion) {
    let header = BlockHeader {
        prev_hash: "0".repeat(64),
        root: "f".repeat(64),
        timestamp: 1337.0,
        nonce: "0".repeat(64),
    };

    c.bench_function("mining/header_hash", |b| {
        b.iter(|| header.hash());
    });
}

criterion_group!(benches, bench_mine_single_transaction_block, bench_header_hash);
criterion_main!(benches);
