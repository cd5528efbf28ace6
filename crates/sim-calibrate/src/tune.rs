use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sim_core::{validate_config, MarketConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::benchmark::{run_suite, BenchmarkOptions};
use crate::scenario::HistoricalScenario;
use crate::CalibrationError;

/// Tunable physics parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    PriceSensitivity,
    MarketingEfficiency,
    WeightQuality,
    WeightBrand,
    /// Quality and brand decay together.
    DecayRate,
    /// Innovation and efficiency thresholds together.
    RdThreshold,
    BackgroundStrength,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Param::PriceSensitivity => "price_sensitivity",
            Param::MarketingEfficiency => "marketing_efficiency",
            Param::WeightQuality => "weight_quality",
            Param::WeightBrand => "weight_brand",
            Param::DecayRate => "decay_rate",
            Param::RdThreshold => "rd_threshold",
            Param::BackgroundStrength => "background_strength",
        };
        f.write_str(s)
    }
}

/// One point of the search grid.
pub type ParamSet = BTreeMap<Param, f64>;

/// Declared axes of the grid search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub axes: BTreeMap<Param, Vec<f64>>,
    /// Candidates whose derived price weight falls below this are dropped.
    pub min_price_weight: f64,
}

impl Default for SearchSpace {
    fn default() -> Self {
        let axes = [
            (Param::PriceSensitivity, vec![1.0, 2.0, 3.0]),
            (Param::MarketingEfficiency, vec![0.5, 1.0, 1.5]),
            (Param::WeightQuality, vec![0.2, 0.3, 0.4]),
            (Param::WeightBrand, vec![0.2, 0.3, 0.4]),
            (Param::DecayRate, vec![0.5, 1.0]),
        ]
        .into_iter()
        .collect();
        Self {
            axes,
            min_price_weight: 0.1,
        }
    }
}

impl SearchSpace {
    pub fn empty() -> Self {
        Self {
            axes: BTreeMap::new(),
            min_price_weight: 0.1,
        }
    }

    pub fn with_axis(mut self, param: Param, values: Vec<f64>) -> Self {
        self.axes.insert(param, values);
        self
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        for (param, values) in &self.axes {
            if values.is_empty() {
                return Err(CalibrationError::InvalidSpace(format!("{param} has no values")));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(CalibrationError::InvalidSpace(format!(
                    "{param} has a non-finite value"
                )));
            }
        }
        if !self.min_price_weight.is_finite() {
            return Err(CalibrationError::InvalidSpace(
                "min_price_weight must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Number of grid points before filtering.
    pub fn size(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Full Cartesian product of the axes, in axis order.
    pub fn candidates(&self) -> Result<Vec<ParamSet>, CalibrationError> {
        self.validate()?;
        let mut out = vec![ParamSet::new()];
        for (param, values) in &self.axes {
            out = out
                .into_iter()
                .flat_map(|set| {
                    values.iter().map(move |v| {
                        let mut next = set.clone();
                        next.insert(*param, *v);
                        next
                    })
                })
                .collect();
        }
        Ok(out)
    }
}

/// Utility weights `(quality, brand, price)` implied by a candidate, if it
/// sets either the quality or the brand weight.
///
/// Candidate weights live on a scale that sums to 1. A weight the candidate
/// leaves unset is taken from the base config rescaled onto that scale, and
/// the price weight is the remainder `1 - w_q - w_b`.
pub fn derived_weights(base: &MarketConfig, set: &ParamSet) -> Option<(f64, f64, f64)> {
    if !set.contains_key(&Param::WeightQuality) && !set.contains_key(&Param::WeightBrand) {
        return None;
    }
    let total = base.weight_quality + base.weight_brand + base.weight_price;
    let normalised = |w: f64| {
        if total.is_finite() && total > 0.0 {
            w / total
        } else {
            1.0 / 3.0
        }
    };
    let wq = set
        .get(&Param::WeightQuality)
        .copied()
        .unwrap_or_else(|| normalised(base.weight_quality));
    let wb = set
        .get(&Param::WeightBrand)
        .copied()
        .unwrap_or_else(|| normalised(base.weight_brand));
    Some((wq, wb, 1.0 - wq - wb))
}

/// Price weight implied by a candidate, if it sets either utility weight.
pub fn derived_price_weight(base: &MarketConfig, set: &ParamSet) -> Option<f64> {
    derived_weights(base, set).map(|(_, _, wp)| wp)
}

/// Config for one candidate: `base` with the set's values written over it.
pub fn apply_params(base: &MarketConfig, set: &ParamSet) -> MarketConfig {
    let mut cfg = base.clone();
    for (param, v) in set {
        let v = *v;
        match param {
            Param::PriceSensitivity => cfg.price_sensitivity = v,
            Param::MarketingEfficiency => cfg.marketing_efficiency = v,
            Param::WeightQuality | Param::WeightBrand => {}
            Param::DecayRate => {
                cfg.quality_decay = v;
                cfg.brand_decay = v;
            }
            Param::RdThreshold => {
                cfg.rd_innovation_threshold = v;
                cfg.rd_efficiency_threshold = v;
            }
            Param::BackgroundStrength => cfg.background_strength = v,
        }
    }
    if let Some((wq, wb, wp)) = derived_weights(base, set) {
        cfg.weight_quality = wq;
        cfg.weight_brand = wb;
        cfg.weight_price = wp;
    }
    cfg
}

/// Shared flag for stopping a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a grid search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TuneResult {
    pub best_parameters: ParamSet,
    pub best_config: MarketConfig,
    pub best_error: f64,
    /// Candidates that ran to completion.
    pub evaluated: usize,
    /// Candidates that failed and were left out.
    pub skipped: usize,
    /// Candidates dropped by the price-weight floor.
    pub filtered: usize,
    pub cancelled: bool,
}

enum Outcome {
    Scored(f64),
    Failed,
    NotRun,
}

/// Average error of one configuration over every scenario of a suite.
pub fn evaluate(
    config: &MarketConfig,
    scenarios: &[HistoricalScenario],
    options: &BenchmarkOptions,
) -> Result<f64, CalibrationError> {
    validate_config(config)?;
    let report = run_suite(config, scenarios, options)?;
    if report.mean_error.is_finite() {
        Ok(report.mean_error)
    } else {
        Err(CalibrationError::NonFinite {
            turn: scenarios.iter().map(|s| s.len() as u32).max().unwrap_or(0),
        })
    }
}

/// Grid search for the parameter set with the lowest benchmark error.
///
/// A candidate's score is its mean error across `scenarios`. Candidates run
/// on isolated markets in parallel. A candidate that fails on any scenario
/// is skipped. The token is checked before each candidate starts; ties go to
/// the earlier grid point.
pub fn auto_tune(
    base: &MarketConfig,
    space: &SearchSpace,
    scenarios: &[HistoricalScenario],
    options: &BenchmarkOptions,
    cancel: &CancelToken,
) -> Result<TuneResult, CalibrationError> {
    if scenarios.is_empty() {
        return Err(CalibrationError::EmptyScenario);
    }
    let grid = space.candidates()?;
    let total = grid.len();
    let candidates: Vec<ParamSet> = grid
        .into_iter()
        .filter(|set| {
            derived_price_weight(base, set).map_or(true, |wp| wp >= space.min_price_weight)
        })
        .collect();
    let filtered = total - candidates.len();
    info!(total, filtered, scenarios = scenarios.len(), "grid search started");

    let outcomes: Vec<Outcome> = candidates
        .par_iter()
        .map(|set| {
            if cancel.is_cancelled() {
                return Outcome::NotRun;
            }
            match evaluate(&apply_params(base, set), scenarios, options) {
                Ok(err) => Outcome::Scored(err),
                Err(e) => {
                    warn!(?set, error = %e, "candidate skipped");
                    Outcome::Failed
                }
            }
        })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    let (mut evaluated, mut skipped) = (0, 0);
    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Outcome::Scored(err) => {
                evaluated += 1;
                if best.map_or(true, |(_, b)| *err < b) {
                    best = Some((i, *err));
                }
            }
            Outcome::Failed => skipped += 1,
            Outcome::NotRun => {}
        }
    }
    let cancelled = cancel.is_cancelled();
    let Some((idx, best_error)) = best else {
        return Err(if cancelled {
            CalibrationError::Cancelled
        } else {
            CalibrationError::NoValidCandidate { filtered, skipped }
        });
    };
    let best_parameters = candidates[idx].clone();
    info!(
        best_error,
        evaluated, skipped, filtered, cancelled, "grid search finished"
    );
    Ok(TuneResult {
        best_config: apply_params(base, &best_parameters),
        best_parameters,
        best_error,
        evaluated,
        skipped,
        filtered,
        cancelled,
    })
}
