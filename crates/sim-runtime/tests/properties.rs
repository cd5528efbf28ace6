use proptest::prelude::*;
use sim_core::{DecisionRecord, FirmName, FirmSetup, MarketConfig, MarketSnapshot};
use sim_runtime::Market;
use std::collections::BTreeMap;

fn market() -> Market {
    Market::new(
        MarketConfig::default(),
        vec![
            FirmSetup::new("A", 8_500.0, 0.3),
            FirmSetup::new("B", 8_000.0, 0.3),
            FirmSetup::new("C", 9_000.0, 0.2),
        ],
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shares_always_partition_the_market(
        prices in proptest::collection::vec(1_000.0f64..20_000.0, 3),
        brand in proptest::collection::vec(0.0f64..5e6, 3),
        promo in proptest::collection::vec(0.0f64..1e8, 3),
    ) {
        let mut m = market();
        let decisions: BTreeMap<FirmName, DecisionRecord> = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, n)| {
                (
                    FirmName::from(*n),
                    DecisionRecord {
                        price: prices[i],
                        marketing_brand_spend: brand[i],
                        marketing_promo_spend: promo[i],
                        ..DecisionRecord::default()
                    },
                )
            })
            .collect();
        for _ in 0..3 {
            let snap = m.advance_turn(&decisions).unwrap();
            let total: f64 = snap.firms.values().map(|f| f.market_share).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            for f in snap.firms.values() {
                prop_assert!((0.0..=100.0).contains(&f.product_quality));
                prop_assert!((0.0..=100.0).contains(&f.brand_awareness));
            }
        }
    }
}

#[test]
fn snapshot_serializes_to_json() {
    let mut m = market();
    let d: BTreeMap<FirmName, DecisionRecord> = ["A", "B", "C"]
        .iter()
        .map(|n| (FirmName::from(*n), DecisionRecord::priced(10_000.0)))
        .collect();
    m.advance_turn(&d).unwrap();
    let snap = m.snapshot();
    let json = serde_json::to_string(&snap).unwrap();
    let back: MarketSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.turn, 1);
    assert_eq!(back.firms.len(), 4);
    assert_eq!(back.last_turn.map(|r| r.firms.len()), Some(4));
}
