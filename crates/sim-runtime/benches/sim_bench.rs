use criterion::{criterion_group, criterion_main, Criterion};
use sim_core::{DecisionRecord, FirmName, FirmSetup, MarketConfig};
use std::collections::BTreeMap;

fn bench_turns(c: &mut Criterion) {
    let setups: Vec<FirmSetup> = (0..8)
        .map(|i| FirmSetup::new(format!("F{i}"), 8_000.0 + 100.0 * i as f64, 0.1))
        .collect();
    let market = sim_runtime::Market::new(MarketConfig::default(), setups.clone()).unwrap();
    let decisions: BTreeMap<FirmName, DecisionRecord> = setups
        .iter()
        .map(|s| {
            (
                s.name.clone(),
                DecisionRecord {
                    price: s.unit_cost * 1.2,
                    marketing_brand_spend: 200_000.0,
                    rd_innovation_spend: 1_000_000.0,
                    ..DecisionRecord::default()
                },
            )
        })
        .collect();
    c.bench_function("advance_turn_8_firms", |b| {
        b.iter_batched(
            || market.clone(),
            |mut m| {
                let _ = m.advance_turn(&decisions);
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_turns);
criterion_main!(benches);
