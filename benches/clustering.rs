//! Benchmarks for corpus reconstruction and the clustering strategies
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use textpipe::clustering::{ClusterStrategy, ClusteringType};
use textpipe::corpus::{
    Corpus, CorpusTransfer, JsonTransferCodec, Node, TransferCodec, Type, FIRST_NODE_NUMBER,
};

/// Synthetic corpus: `types` types over `nodes` nodes, each type touching a
/// handful of nodes.
fn synthetic(types: u32, nodes: u32) -> CorpusTransfer {
    let mut node_records: Vec<Node> = (0..nodes).map(|i| Node::new(FIRST_NODE_NUMBER + i)).collect();
    let type_records = (0..types)
        .map(|t| {
            let mut ty = Type::new(t, format!("type{}", t));
            for k in 0..4 {
                let slot = (t * 7 + k * 13) % nodes;
                node_records[slot as usize].type_frequencies.insert(t, k + 1);
                ty = ty.with_frequency(FIRST_NODE_NUMBER + slot, (k + 1) as f64);
            }
            ty
        })
        .collect();
    CorpusTransfer {
        number_of_nodes: nodes as usize,
        number_of_types: types as usize,
        nodes: node_records,
        types: type_records,
    }
}

fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("corpus_reconstruction");

    for nodes in [1_000u32, 10_000, 100_000] {
        let record = synthetic(50, nodes);
        let bytes = JsonTransferCodec.encode(&record).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode_and_rebuild", nodes), &bytes, |b, bytes| {
            b.iter(|| {
                let record = JsonTransferCodec.decode(black_box(bytes)).unwrap();
                black_box(Corpus::from_transfer(record).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");

    for types in [20u32, 80, 200] {
        let corpus = Corpus::from_transfer(synthetic(types, 500)).unwrap();
        let type_list = corpus.type_list();
        group.throughput(Throughput::Elements(types as u64));

        for clustering_type in [
            ClusteringType::KMedoids,
            ClusteringType::Hierarchical,
            ClusteringType::NeighborJoining,
        ] {
            let strategy = ClusterStrategy::for_type(clustering_type);
            group.bench_with_input(
                BenchmarkId::new(clustering_type.code(), types),
                &type_list,
                |b, type_list| b.iter(|| black_box(strategy.cluster(type_list, "bench").unwrap())),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_reconstruction, bench_strategies);
criterion_main!(benches);
