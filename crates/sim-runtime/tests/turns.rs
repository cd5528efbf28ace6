use sim_core::{DecisionRecord, EffectType, FirmName, FirmSetup, MarketConfig, RawDecision};
use sim_events::ShockSchedule;
use sim_runtime::{Market, TurnError, TurnPhase, TurnScore};
use std::collections::BTreeMap;

fn two_firm_market(config: MarketConfig) -> Market {
    Market::new(
        config,
        vec![
            FirmSetup::new("A", 8_500.0, 0.4),
            FirmSetup::new("B", 8_500.0, 0.4),
        ],
    )
    .unwrap()
}

fn decisions(pairs: &[(&str, DecisionRecord)]) -> BTreeMap<FirmName, DecisionRecord> {
    pairs
        .iter()
        .map(|(n, d)| (FirmName::from(*n), *d))
        .collect()
}

fn priced(a: f64, b: f64) -> BTreeMap<FirmName, DecisionRecord> {
    decisions(&[
        ("A", DecisionRecord::priced(a)),
        ("B", DecisionRecord::priced(b)),
    ])
}

#[test]
fn market_starts_with_background_and_residual_share() {
    let m = two_firm_market(MarketConfig::default());
    let snap = m.snapshot();
    assert_eq!(snap.turn, 0);
    assert_eq!(snap.firms.len(), 3);
    let bg = snap.firm("Others").unwrap();
    assert!((bg.market_share - 0.2).abs() < 1e-12);
    assert!(snap.last_turn.is_none());
    assert_eq!(m.phase(), TurnPhase::Idle);
}

#[test]
fn shares_sum_to_one_every_turn() {
    let mut m = two_firm_market(MarketConfig::default());
    for t in 0..12 {
        let d = priced(10_000.0 - 100.0 * t as f64, 9_500.0);
        let snap = m.advance_turn(&d).unwrap();
        let total: f64 = snap.firms.values().map(|f| f.market_share).sum();
        assert!((total - 1.0).abs() < 1e-9, "turn {t}: {total}");
        let rec = snap.last_turn.unwrap();
        assert!((rec.total_share() - 1.0).abs() < 1e-9);
    }
    assert_eq!(m.turn(), 12);
    assert_eq!(m.history().len(), 12);
}

#[test]
fn firm_without_decision_gets_zero_share() {
    let mut m = two_firm_market(MarketConfig::default());
    let snap = m
        .advance_turn(&decisions(&[("A", DecisionRecord::priced(10_000.0))]))
        .unwrap();
    assert_eq!(snap.firm("B").unwrap().market_share, 0.0);
    let total = snap.firm("A").unwrap().market_share + snap.firm("Others").unwrap().market_share;
    assert!((total - 1.0).abs() < 1e-9);
    let rec = snap.last_turn.unwrap();
    assert_eq!(rec.firm("B").unwrap().revenue, 0.0);
}

#[test]
fn lower_price_wins_share() {
    let mut even = two_firm_market(MarketConfig::default());
    let base = even.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    let mut cut = two_firm_market(MarketConfig::default());
    let after = cut.advance_turn(&priced(10_000.0, 8_000.0)).unwrap();
    assert!(after.firm("B").unwrap().market_share > base.firm("B").unwrap().market_share);
    assert!(after.firm("A").unwrap().market_share < base.firm("A").unwrap().market_share);
}

#[test]
fn milestone_spend_improves_quality_and_cost() {
    let cfg = MarketConfig::default();
    let mut m = two_firm_market(cfg.clone());
    let q0 = m.registry().get("A").unwrap().product_quality;
    let c0 = m.registry().get("A").unwrap().unit_cost;
    let d = decisions(&[
        (
            "A",
            DecisionRecord {
                price: 10_000.0,
                rd_innovation_spend: cfg.rd_innovation_threshold,
                rd_efficiency_spend: cfg.rd_efficiency_threshold,
                ..DecisionRecord::default()
            },
        ),
        ("B", DecisionRecord::priced(10_000.0)),
    ]);
    let snap = m.advance_turn(&d).unwrap();
    let a = snap.firm("A").unwrap();
    assert!(a.product_quality > q0);
    assert!(a.unit_cost < c0);
    assert_eq!(a.rd_innovation_accumulator, 0.0);
    let rec = snap.last_turn.unwrap();
    assert_eq!(rec.firm("A").unwrap().innovation_milestones, 1);
    assert_eq!(rec.firm("A").unwrap().efficiency_milestones, 1);
}

#[test]
fn accumulator_carries_over_between_turns() {
    let cfg = MarketConfig::default();
    let mut m = two_firm_market(cfg.clone());
    let spend = cfg.rd_innovation_threshold * 0.6;
    let d = decisions(&[
        (
            "A",
            DecisionRecord {
                price: 10_000.0,
                rd_innovation_spend: spend,
                ..DecisionRecord::default()
            },
        ),
        ("B", DecisionRecord::priced(10_000.0)),
    ]);
    let first = m.advance_turn(&d).unwrap();
    assert_eq!(
        first.last_turn.unwrap().firm("A").unwrap().innovation_milestones,
        0
    );
    let second = m.advance_turn(&d).unwrap();
    assert_eq!(
        second.last_turn.as_ref().unwrap().firm("A").unwrap().innovation_milestones,
        1
    );
    let acc = second.firm("A").unwrap().rd_innovation_accumulator;
    assert!((acc - cfg.rd_innovation_threshold * 0.2).abs() < 1e-6);
}

#[test]
fn bankrupt_firm_is_frozen_but_kept() {
    let mut m = two_firm_market(MarketConfig::default());
    // Selling far below cost with heavy spend sinks A in one turn.
    let ruin = decisions(&[
        (
            "A",
            DecisionRecord {
                price: 1.0,
                marketing_brand_spend: 100_000_000.0,
                ..DecisionRecord::default()
            },
        ),
        ("B", DecisionRecord::priced(10_000.0)),
    ]);
    let snap = m.advance_turn(&ruin).unwrap();
    let a = snap.firm("A").unwrap();
    assert!(a.bankrupt);
    let capital_after_ruin = a.capital;

    let next = m.advance_turn(&ruin).unwrap();
    let a = next.firm("A").unwrap();
    assert!(a.bankrupt);
    assert_eq!(a.market_share, 0.0);
    assert_eq!(a.capital, capital_after_ruin);
    let line = next.last_turn.as_ref().unwrap();
    let a_line = line.firm("A").unwrap();
    assert_eq!(a_line.marketing_brand_spend, 0.0);
    assert_eq!(a_line.profit, 0.0);
    let total = next.firm("B").unwrap().market_share + next.firm("Others").unwrap().market_share;
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn assets_decay_without_spend() {
    let mut m = two_firm_market(MarketConfig::default());
    let mut prev = m.snapshot();
    for _ in 0..60 {
        let snap = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
        for (name, firm) in &snap.firms {
            let before = &prev.firms[name];
            assert!(firm.product_quality <= before.product_quality);
            assert!(firm.brand_awareness <= before.brand_awareness);
            assert!(firm.product_quality >= 0.0 && firm.brand_awareness >= 0.0);
        }
        prev = snap;
    }
    assert_eq!(prev.firm("A").unwrap().product_quality, 0.0);
}

#[test]
fn rd_ceiling_follows_capital_and_marketing_ceiling_waits_for_quarter() {
    let cfg = MarketConfig::default();
    let mut m = two_firm_market(cfg.clone());
    let mut rd = vec![m.registry().get("A").unwrap().rd_budget_ceiling];
    let mut mkt = vec![m.registry().get("A").unwrap().marketing_budget_ceiling];
    let mut capital = vec![m.registry().get("A").unwrap().capital];
    for _ in 0..8 {
        let snap = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
        let a = snap.firm("A").unwrap();
        rd.push(a.rd_budget_ceiling);
        mkt.push(a.marketing_budget_ceiling);
        capital.push(a.capital);
    }
    for t in 1..rd.len() {
        assert!(capital[t] > capital[t - 1]);
        assert!(rd[t] > rd[t - 1]);
    }
    for t in 1..mkt.len() {
        if t % cfg.budget_quarter_turns as usize != 0 {
            assert_eq!(mkt[t], mkt[t - 1], "marketing ceiling moved off-quarter at {t}");
        }
    }
    assert!(mkt[4] > mkt[3]);
}

#[test]
fn injected_event_starts_next_turn_and_expires() {
    let mut m = two_firm_market(MarketConfig::default());
    m.inject_event("Chip shortage", "A", EffectType::UnitCostMultiplier, 1.2, 2)
        .unwrap();
    let snap = m.snapshot();
    assert_eq!(snap.pending_events, vec!["Chip shortage".to_string()]);
    assert_eq!(snap.firm("A").unwrap().unit_cost, 8_500.0);

    let t1 = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert!((t1.firm("A").unwrap().unit_cost - 10_200.0).abs() < 1e-6);
    assert_eq!(t1.active_events.len(), 1);
    let t2 = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert!((t2.firm("A").unwrap().unit_cost - 12_240.0).abs() < 1e-6);
    assert!(t2.active_events.is_empty());
    let t3 = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert!((t3.firm("A").unwrap().unit_cost - 12_240.0).abs() < 1e-6);
    assert_eq!(t3.firm("B").unwrap().unit_cost, 8_500.0);
}

#[test]
fn zero_duration_event_is_rejected() {
    let mut m = two_firm_market(MarketConfig::default());
    assert!(matches!(
        m.inject_event("noop", "all", EffectType::BrandShock, 1.0, 0),
        Err(TurnError::Event(_))
    ));
}

#[test]
fn failed_turn_leaves_market_unchanged() {
    let mut m = two_firm_market(MarketConfig::default());
    m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    let before = m.snapshot();
    let err = m.advance_turn(&priced(f64::INFINITY, 10_000.0));
    assert!(err.is_err());
    assert_eq!(m.snapshot(), before);
    assert_eq!(m.turn(), 1);
}

#[derive(Debug)]
#[allow(dead_code)]
enum ScoreError {
    Turn(TurnError),
    NoTruth,
}

impl From<TurnError> for ScoreError {
    fn from(e: TurnError) -> Self {
        ScoreError::Turn(e)
    }
}

#[test]
fn scorer_attaches_errors_or_aborts() {
    let mut m = two_firm_market(MarketConfig::default());
    let snap = m
        .advance_turn_scored(&priced(10_000.0, 10_000.0), |rec| {
            let per_firm = rec
                .firms
                .keys()
                .map(|n| (n.clone(), 0.25))
                .collect();
            Ok::<_, TurnError>(Some(TurnScore {
                per_firm,
                aggregate: 0.5,
            }))
        })
        .unwrap();
    let rec = snap.last_turn.unwrap();
    assert_eq!(rec.aggregate_error, Some(0.5));
    assert_eq!(rec.firm("A").unwrap().error, Some(0.25));

    let before = m.snapshot();
    let res = m.advance_turn_scored(&priced(10_000.0, 10_000.0), |_| Err(ScoreError::NoTruth));
    assert!(matches!(res, Err(ScoreError::NoTruth)));
    assert_eq!(m.snapshot(), before);
}

#[test]
fn raw_decisions_resolve_with_defaults() {
    let m = two_firm_market(MarketConfig::default());
    let mut raw = BTreeMap::new();
    raw.insert(
        FirmName::from("A"),
        RawDecision {
            price: Some(9_000.0),
            marketing_brand_spend: Some(-3.0),
            ..RawDecision::default()
        },
    );
    raw.insert(FirmName::from("Ghost"), RawDecision::default());
    let resolved = m.resolve_decisions(&raw);
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved["A"].price, 9_000.0);
    assert_eq!(resolved["A"].marketing_brand_spend, 0.0);
    assert!((resolved["B"].price - 9_350.0).abs() < 1e-6);
    assert!(!resolved.contains_key("Ghost"));
}

#[test]
fn collaborator_spend_is_clipped_to_ceilings() {
    let m = two_firm_market(MarketConfig::default());
    let a = m.registry().get("A").unwrap().clone();
    let mut raw = BTreeMap::new();
    raw.insert(
        FirmName::from("A"),
        RawDecision {
            price: Some(10_000.0),
            marketing_brand_spend: Some(21_000_000.0),
            rd_innovation_spend: Some(a.rd_budget_ceiling * 3.0),
            rd_efficiency_spend: Some(a.rd_budget_ceiling),
            ..RawDecision::default()
        },
    );
    let resolved = m.resolve_decisions(&raw);
    let d = resolved["A"];
    assert!((d.total_marketing() - a.marketing_budget_ceiling).abs() < 1e-6);
    assert!((d.total_rd() - a.rd_budget_ceiling).abs() < 1e-6);
    assert!((d.rd_innovation_spend - 3.0 * d.rd_efficiency_spend).abs() < 1e-6);

    // Replay keeps declared spend.
    let replay = m.complete_decisions(&raw);
    assert_eq!(replay["A"].marketing_brand_spend, 21_000_000.0);
}

#[test]
fn schedule_injects_shocks_on_their_turn() {
    let schedule = ShockSchedule::from_yaml_str(
        "shocks:\n  - {turn: 2, description: tariff, effect_type: unit_cost_multiplier, impact_value: 1.5, duration: 1}\n",
    )
    .unwrap();
    let mut m = two_firm_market(MarketConfig::default()).with_schedule(schedule);
    let t1 = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert_eq!(t1.firm("B").unwrap().unit_cost, 8_500.0);
    let t2 = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert!((t2.firm("B").unwrap().unit_cost - 12_750.0).abs() < 1e-6);
}

#[test]
fn macro_adjust_grows_market_and_inflates_costs() {
    let cfg = MarketConfig {
        market_growth_rate: 0.1,
        inflation_rate: 0.01,
        ..MarketConfig::default()
    };
    let mut m = two_firm_market(cfg);
    let snap = m.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    assert!((snap.market_size - 11_000.0).abs() < 1e-6);
    assert!((snap.firm("A").unwrap().unit_cost - 8_585.0).abs() < 1e-6);
}

#[test]
fn seeded_noise_is_reproducible() {
    let cfg = MarketConfig {
        market_noise: 0.1,
        ..MarketConfig::default()
    };
    let mut a = two_firm_market(cfg.clone());
    let mut b = two_firm_market(cfg);
    for _ in 0..5 {
        let sa = a.advance_turn(&priced(10_000.0, 9_800.0)).unwrap();
        let sb = b.advance_turn(&priced(10_000.0, 9_800.0)).unwrap();
        assert_eq!(sa.last_turn, sb.last_turn);
    }
}

#[test]
fn oversubscribed_initial_shares_are_rejected() {
    let res = Market::new(
        MarketConfig::default(),
        vec![FirmSetup::new("A", 1.0, 0.7), FirmSetup::new("B", 1.0, 0.7)],
    );
    assert!(matches!(res, Err(TurnError::Validation(_))));
}

// Price-war stress test on the shipped defaults: A cuts its price 4% every
// turn, B holds.
#[test]
fn price_war_erodes_margins() {
    let mut m = two_firm_market(MarketConfig::default());
    let mut price_a = 10_000.0;
    for _ in 0..30 {
        price_a *= 0.96;
        m.advance_turn(&priced(price_a, 10_000.0)).unwrap();
    }
    let history = m.history();
    let active: Vec<_> = history
        .iter()
        .filter(|r| r.firm("A").unwrap().market_share > 0.0)
        .collect();
    assert!(active.len() >= 4);
    for w in active.windows(2) {
        let (prev, next) = (w[0].firm("A").unwrap(), w[1].firm("A").unwrap());
        assert!(next.market_share > prev.market_share);
        assert!(next.margin < prev.margin);
    }
    let first = history.first().unwrap();
    let last_active = active.last().unwrap();
    assert!(last_active.firm("A").unwrap().margin < 0.0);
    assert!(last_active.firm("A").unwrap().profit < first.firm("A").unwrap().profit);
    assert!(last_active.firm("B").unwrap().profit < first.firm("B").unwrap().profit);
    // Once out, A stays out.
    let out_from = active.len();
    for r in &history[out_from..] {
        assert_eq!(r.firm("A").unwrap().market_share, 0.0);
    }
}

#[test]
fn background_spend_is_opt_in() {
    let cfg = MarketConfig {
        background_rd_spend: 5_000_000.0,
        ..MarketConfig::default()
    };
    let mut idle = two_firm_market(MarketConfig::default());
    let mut investing = two_firm_market(cfg);
    let a = idle.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    let b = investing.advance_turn(&priced(10_000.0, 10_000.0)).unwrap();
    let others = |s: &sim_core::MarketSnapshot| s.firm("Others").unwrap().product_quality;
    assert_eq!(others(&a), a.firm("A").unwrap().product_quality);
    assert!(others(&b) > b.firm("A").unwrap().product_quality);
    assert!(b.firm("Others").unwrap().market_share > a.firm("Others").unwrap().market_share);
}

#[test]
fn firm_named_like_the_all_target_is_rejected() {
    let res = Market::new(
        MarketConfig::default(),
        vec![FirmSetup::new("All", 1.0, 0.4), FirmSetup::new("B", 1.0, 0.4)],
    );
    assert!(matches!(
        res,
        Err(TurnError::Validation(sim_core::ValidationError::ReservedName(_)))
    ));
}
