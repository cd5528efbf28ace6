use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sim_calibrate::{
    auto_tune, BenchmarkOptions, CancelToken, CompanyInputs, CompanyOutputs, CompanyRecord,
    HistoricalScenario, HistoricalTurn, Param, SearchSpace,
};
use sim_core::{FirmName, MarketConfig};

fn build_scenario(turns: u32) -> HistoricalScenario {
    let record = |price: f64, share: f64| CompanyRecord {
        inputs: CompanyInputs {
            price,
            marketing_spend_ratio: 0.05,
            rd_spend_ratio: 0.05,
        },
        outputs: CompanyOutputs {
            actual_market_share: share,
            actual_margin: None,
        },
    };
    HistoricalScenario {
        scenario_name: "bench".into(),
        description: String::new(),
        turns_data: (1..=turns)
            .map(|t| {
                let drift = 0.01 * t as f64;
                HistoricalTurn {
                    turn: t,
                    note: String::new(),
                    companies: [
                        (FirmName::from("A"), record(500.0, 0.1 + drift)),
                        (FirmName::from("B"), record(200.0, 0.5 - drift)),
                    ]
                    .into_iter()
                    .collect(),
                }
            })
            .collect(),
    }
}

fn bench_grid(c: &mut Criterion) {
    let scenarios = [build_scenario(12)];
    let space = SearchSpace::empty()
        .with_axis(Param::PriceSensitivity, vec![1.0, 2.0, 3.0])
        .with_axis(Param::WeightQuality, vec![0.2, 0.4])
        .with_axis(Param::WeightBrand, vec![0.2, 0.4]);
    let base = MarketConfig::default();
    let options = BenchmarkOptions::default();
    c.bench_function("grid 12 points x 12 turns", |b| {
        b.iter(|| {
            let _ = black_box(auto_tune(
                &base,
                &space,
                &scenarios,
                &options,
                &CancelToken::new(),
            ));
        })
    });
}

criterion_group!(benches, bench_grid);
criterion_main!(benches);
