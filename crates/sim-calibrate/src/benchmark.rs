use serde::{Deserialize, Serialize};
use sim_core::{DecisionRecord, FirmName, FirmSetup, MarketConfig, MarketSnapshot, RawDecision, TurnRecord};
use sim_runtime::{Market, TurnScore};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::scenario::{leader, HistoricalScenario, HistoricalTurn};
use crate::CalibrationError;

/// Weight of the share term in the composite error.
pub const SHARE_WEIGHT: f64 = 0.7;
/// Weight of the margin term in the composite error.
pub const MARGIN_WEIGHT: f64 = 0.3;

/// How a historical scenario is turned into a simulated market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkOptions {
    /// Unit cost as a fraction of the first recorded price.
    pub cost_ratio: f64,
    pub initial_quality: f64,
    pub initial_brand: f64,
    /// Added to a turn's error when the simulated leader is not the actual one.
    pub rank_penalty: f64,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            cost_ratio: 0.7,
            initial_quality: 50.0,
            initial_brand: 50.0,
            rank_penalty: 0.1,
        }
    }
}

/// Result of replaying a whole scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub scenario_name: String,
    /// Aggregate error of each turn, rank penalty included, in turn order.
    pub per_turn: Vec<f64>,
    /// Mean of `per_turn`.
    pub mean_error: f64,
}

/// Result of replaying several scenarios with one configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// One report per scenario, in input order.
    pub reports: Vec<BenchmarkReport>,
    /// Unweighted mean of the scenario means, so long and short scenarios
    /// count the same.
    pub mean_error: f64,
}

/// Composite divergence of one firm: `0.7*|share gap| + 0.3*|margin gap|`.
///
/// A missing actual margin contributes nothing.
pub fn firm_error(sim_share: f64, actual_share: f64, sim_margin: f64, actual_margin: Option<f64>) -> f64 {
    let margin_gap = actual_margin.map_or(0.0, |m| (sim_margin - m).abs());
    SHARE_WEIGHT * (sim_share - actual_share).abs() + MARGIN_WEIGHT * margin_gap
}

/// Score one simulated turn against its recorded counterpart.
pub fn score_turn(
    record: &TurnRecord,
    truth: &HistoricalTurn,
    rank_penalty: f64,
) -> Result<TurnScore, CalibrationError> {
    let mut per_firm = BTreeMap::new();
    for (name, company) in &truth.companies {
        let line = record.firm(name.as_str()).ok_or_else(|| CalibrationError::MissingTruth {
            turn: truth.turn,
            firm: name.to_string(),
        })?;
        let err = firm_error(
            line.market_share,
            company.outputs.actual_market_share,
            line.margin,
            company.outputs.actual_margin,
        );
        if !err.is_finite() {
            return Err(CalibrationError::NonFinite { turn: truth.turn });
        }
        per_firm.insert(name.clone(), err);
    }
    if per_firm.is_empty() {
        return Err(CalibrationError::MissingTruth {
            turn: truth.turn,
            firm: "*".into(),
        });
    }
    let mut aggregate = per_firm.values().sum::<f64>() / per_firm.len() as f64;
    let simulated_leader = leader(
        record
            .firms
            .iter()
            .filter(|(n, _)| truth.companies.contains_key(*n))
            .map(|(n, l)| (n, l.market_share)),
    );
    if simulated_leader != truth.actual_leader() {
        aggregate += rank_penalty;
    }
    Ok(TurnScore {
        per_firm,
        aggregate,
    })
}

/// Replays a historical scenario with forced decisions and scores every turn.
#[derive(Clone, Debug)]
pub struct Benchmark {
    market: Market,
    scenario: HistoricalScenario,
    options: BenchmarkOptions,
}

impl Benchmark {
    /// Seed a market from the scenario's first recorded turn.
    pub fn new(
        config: MarketConfig,
        scenario: HistoricalScenario,
        options: BenchmarkOptions,
    ) -> Result<Self, CalibrationError> {
        let first = scenario.first_turn()?;
        let setups = first
            .companies
            .iter()
            .map(|(name, c)| {
                FirmSetup::new(
                    name.as_str(),
                    c.inputs.price * options.cost_ratio,
                    c.outputs.actual_market_share,
                )
                .with_assets(options.initial_quality, options.initial_brand)
            })
            .collect();
        let market = Market::new(config, setups)?;
        debug!(scenario = %scenario.scenario_name, turns = scenario.len(), "benchmark seeded");
        Ok(Self {
            market,
            scenario,
            options,
        })
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn scenario(&self) -> &HistoricalScenario {
        &self.scenario
    }

    /// Run one recorded turn with forced decisions and attach its error.
    pub fn run_benchmark_turn(&mut self, truth: &HistoricalTurn) -> Result<MarketSnapshot, CalibrationError> {
        step(&mut self.market, &self.options, truth)
    }

    /// Replay every recorded turn and average the per-turn error.
    pub fn run(mut self) -> Result<BenchmarkReport, CalibrationError> {
        let mut per_turn = Vec::with_capacity(self.scenario.len());
        for truth in &self.scenario.turns_data {
            let snap = step(&mut self.market, &self.options, truth)?;
            let err = snap
                .last_turn
                .and_then(|r| r.aggregate_error)
                .ok_or(CalibrationError::NonFinite { turn: truth.turn })?;
            per_turn.push(err);
        }
        if per_turn.is_empty() {
            return Err(CalibrationError::EmptyScenario);
        }
        let mean_error = per_turn.iter().sum::<f64>() / per_turn.len() as f64;
        info!(scenario = %self.scenario.scenario_name, mean_error, "benchmark complete");
        Ok(BenchmarkReport {
            scenario_name: self.scenario.scenario_name,
            per_turn,
            mean_error,
        })
    }
}

/// Replay every scenario on its own fresh market and average their errors.
///
/// The first scenario that fails aborts the suite.
pub fn run_suite(
    config: &MarketConfig,
    scenarios: &[HistoricalScenario],
    options: &BenchmarkOptions,
) -> Result<SuiteReport, CalibrationError> {
    if scenarios.is_empty() {
        return Err(CalibrationError::EmptyScenario);
    }
    let reports = scenarios
        .iter()
        .map(|s| Benchmark::new(config.clone(), s.clone(), options.clone())?.run())
        .collect::<Result<Vec<_>, _>>()?;
    let mean_error = reports.iter().map(|r| r.mean_error).sum::<f64>() / reports.len() as f64;
    info!(scenarios = reports.len(), mean_error, "benchmark suite complete");
    Ok(SuiteReport {
        reports,
        mean_error,
    })
}

/// Decisions derived from the recorded prices and spend ratios.
///
/// Spend is `ratio * price * market_size * current_share`; marketing goes to
/// brand building and R&D to innovation. Recorded spend is replayed as is,
/// without budget ceilings.
pub fn forced_decisions(market: &Market, truth: &HistoricalTurn) -> BTreeMap<FirmName, DecisionRecord> {
    let size = market.market_size();
    let raw: BTreeMap<FirmName, RawDecision> = truth
        .companies
        .iter()
        .filter_map(|(name, c)| {
            let Some(firm) = market.registry().get(name.as_str()) else {
                warn!(turn = truth.turn, firm = %name, "recorded firm not in market; ignored");
                return None;
            };
            let expected_revenue = c.inputs.price * size * firm.market_share;
            Some((
                name.clone(),
                RawDecision {
                    price: Some(c.inputs.price),
                    marketing_brand_spend: Some(c.inputs.marketing_spend_ratio * expected_revenue),
                    rd_innovation_spend: Some(c.inputs.rd_spend_ratio * expected_revenue),
                    ..RawDecision::default()
                },
            ))
        })
        .collect();
    market.complete_decisions(&raw)
}

fn step(
    market: &mut Market,
    options: &BenchmarkOptions,
    truth: &HistoricalTurn,
) -> Result<MarketSnapshot, CalibrationError> {
    let decisions = forced_decisions(market, truth);
    let snap = market.advance_turn_scored(&decisions, |record| {
        score_turn(record, truth, options.rank_penalty).map(Some)
    })?;
    debug!(
        turn = truth.turn,
        error = ?snap.last_turn.as_ref().and_then(|r| r.aggregate_error),
        "benchmark turn scored"
    );
    Ok(snap)
}
