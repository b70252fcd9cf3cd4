//! # Chain-Forensics Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | cf-02 Taint | `propagate` on a wide transaction | < 1ms at 50×50 |
//! | cf-03 Clustering | union-find merges | < 10ms per 10k unions |

use cf_02_taint_propagation::{propagate, TaintConfig};
use cf_03_address_clustering::UnionFind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use shared_types::{
    Address, Amount, FlowInput, FlowOutput, FlowTransaction, TxId, UtxoId, UtxoNode,
};
use std::collections::BTreeSet;

fn wide_transaction(width: usize) -> (FlowTransaction, Vec<Option<UtxoNode>>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let values: Vec<u64> = (0..width).map(|_| rng.gen_range(10_000..1_000_000)).collect();
    let total: u64 = values.iter().sum();

    let inputs = (0..width)
        .map(|i| FlowInput {
            prev_tx_id: TxId::from(format!("prev{i}")),
            prev_output_index: 0,
            prevout: None,
        })
        .collect();
    let outputs = (0..width)
        .map(|j| FlowOutput {
            output_index: j as u32,
            value: Amount::from_base_units(total / width as u64),
            addresses: BTreeSet::from([Address::from(format!("1Out{j}"))]),
            is_change: false,
        })
        .collect();
    let tx = FlowTransaction {
        tx_id: TxId::from("wide"),
        inputs,
        outputs,
        fee: Amount::ZERO,
        is_coinbase: false,
        is_coinjoin: false,
        timestamp: None,
        block_height: None,
    };
    let nodes = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Some(UtxoNode {
                utxo_id: UtxoId::new(TxId::from(format!("prev{i}")), 0),
                value: Amount::from_base_units(*v),
                owning_addresses: BTreeSet::from([Address::from(format!("1In{i}"))]),
                is_change: false,
                is_coinjoin: false,
                spent: false,
                taint_score: rng.gen_range(0.0..=1.0),
                block_height: None,
                timestamp: None,
            })
        })
        .collect();
    (tx, nodes)
}

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("cf-02-taint-propagation");
    let config = TaintConfig::default();

    for width in [2, 10, 50] {
        let (tx, nodes) = wide_transaction(width);
        group.throughput(Throughput::Elements((width * width) as u64));
        group.bench_with_input(BenchmarkId::new("propagate", width), &width, |b, _| {
            b.iter(|| black_box(propagate(&tx, &nodes, &config)))
        });
    }
    group.finish();
}

fn bench_union_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("cf-03-address-clustering");
    let addresses: Vec<Address> = (0..10_000).map(|i| Address::from(format!("1A{i}"))).collect();

    group.throughput(Throughput::Elements(addresses.len() as u64));
    group.bench_function("union_chain_10k", |b| {
        b.iter(|| {
            let mut uf = UnionFind::new();
            for pair in addresses.windows(2) {
                uf.union(&pair[0], &pair[1]);
            }
            black_box(uf.groups().len())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_propagate, bench_union_find);
criterion_main!(benches);
