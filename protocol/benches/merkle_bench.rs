// Merkle tree build and proof benchmarks.
//
// Covers tree construction at various leaf counts and membership proof
// generation/verification, since both sit on a miner's and an SPV client's
// hot path respectively.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nova_protocol::merkle::{verify_proof, MerkleTree};

fn entries(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{{\"tx\":{i}}}")).collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle/build");

    for size in [8, 64, 512, 4096] {
        let items = entries(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| MerkleTree::build(items).unwrap());
        });
    }

    group.finish();
}

fn bench_proof(c: &mut Criterion) {
    let items = entries(4096);
    let tree = MerkleTree::build(&items).unwrap();

    c.bench_function("merkle/proof_generate", |b| {
        b.iter(|| tree.proof(&items[2048]).unwrap());
    });
}

fn bench_verify(c: &mut Criterion) {
    let items = entries(4096);
    let tree = MerkleTree::build(&items).unwrap();
    let root = tree.root().to_string();
    let proof = tree.proof(&items[2048]).unwrap();

    c.bench_function("merkle/proof_verify", |b| {
        b.iter(|| verify_proof(&items[2048], &proof, &root));
    });
}

criterion_group!(benches, bench_build, bench_proof, bench_verify);
criterion_main!(benches);
