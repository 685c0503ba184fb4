//! Criterion benchmarks for the per-append hot path.
//!
//! - Motif re-extraction over a full 100-token buffer
//! - Evidence ingest routed across 200 bands
//! - Tick over 1000 nodes

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use lm_core::{
    Aggressor, ContinuityStore, EvidenceEvent, EvidenceKind, EvidenceToken, MemoryConfig,
    MotifIndex,
};

fn full_buffer() -> Vec<EvidenceToken> {
    (0..100)
        .map(|i| EvidenceToken::ALL[(i * 7 + i / 3) % EvidenceToken::ALL.len()])
        .collect()
}

fn trade(ts: f64, price: f64, volume_usd: f64) -> EvidenceEvent {
    EvidenceEvent::new(
        ts,
        price,
        EvidenceKind::Trade {
            volume_usd,
            aggressor: Aggressor::Buyer,
        },
    )
}

fn bench_motif_observe(c: &mut Criterion) {
    let tokens = full_buffer();
    let mut index = MotifIndex::new(1024, 0.0);
    let mut ts = 0.0;
    c.bench_function("motif_observe_100_tokens", |b| {
        b.iter(|| {
            ts += 1.0;
            index.observe(black_box(&tokens), ts, 0.0001);
        })
    });
}

fn bench_ingest(c: &mut Criterion) {
    let mut store = ContinuityStore::new(MemoryConfig::default());
    for i in 0..200 {
        let _ = store.ingest(&trade(0.0, 100.0 + i as f64, 5_000.0));
    }
    let mut ts = 1.0;
    let mut i = 0usize;
    c.bench_function("ingest_200_bands", |b| {
        b.iter(|| {
            ts += 0.5;
            i = (i + 1) % 200;
            let _ = store.ingest(black_box(&trade(ts, 100.0 + i as f64, 2_500.0)));
        })
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut store = ContinuityStore::new(MemoryConfig::default());
    for i in 0..1_000 {
        let _ = store.ingest(&trade(0.0, 1_000.0 + i as f64 * 2.0, 50_000.0));
    }
    let mut now = 0.0;
    c.bench_function("tick_1000_nodes", |b| {
        b.iter(|| {
            now += 0.01;
            black_box(store.tick(now, Some(1_500.0)));
        })
    });
}

criterion_group!(benches, bench_motif_observe, bench_ingest, bench_tick);
criterion_main!(benches);
