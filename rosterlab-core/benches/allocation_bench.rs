//! Criterion benchmarks for the selection hot paths.
//!
//! Benchmarks:
//! 1. Candidate preparation (features, scoring, trap filter)
//! 2. Allocation per formation over prepared pools of growing size
//! 3. Greedy path with the exact pass disabled

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rosterlab_core::allocation::AllocationEngine;
use rosterlab_core::domain::Formation;
use rosterlab_core::params::SelectionParams;
use rosterlab_core::pipeline::PreparedPool;
use rosterlab_core::synthetic::SyntheticMarket;

fn bench_prepare(c: &mut Criterion) {
    let round = SyntheticMarket::new(11).with_size(120).generate();
    let params = SelectionParams::new(140.0, Formation::preset("4-3-3").expect("preset exists"));
    c.bench_function("prepare_720_candidates", |b| {
        b.iter(|| PreparedPool::prepare(black_box(&round.records), &round.history, &params, None, None))
    });
}

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    for size in [20usize, 60, 120] {
        let round = SyntheticMarket::new(7).with_size(size).generate();
        let formation = Formation::preset("4-3-3").expect("preset exists");
        let params = SelectionParams::new(140.0, formation);
        let prepared = PreparedPool::prepare(&round.records, &round.history, &params, None, None).expect("valid params");
        group.bench_with_input(BenchmarkId::from_parameter(size), &prepared, |b, prepared| {
            b.iter(|| prepared.roster_for(&params.allocation, &params.finalize))
        });
    }
    group.finish();
}

fn bench_greedy(c: &mut Criterion) {
    let round = SyntheticMarket::new(3).with_size(120).generate();
    let mut params = SelectionParams::new(140.0, Formation::preset("3-5-2").expect("preset exists"));
    params.allocation.exact_state_limit = 0;
    let prepared = PreparedPool::prepare(&round.records, &round.history, &params, None, None).expect("valid params");
    let pool = prepared.pool();
    c.bench_function("greedy_local_search_720", |b| {
        b.iter(|| AllocationEngine::new(&params.allocation).allocate(black_box(&pool)).total_score())
    });
}

criterion_group!(benches, bench_prepare, bench_allocate, bench_greedy);
criterion_main!(benches);
