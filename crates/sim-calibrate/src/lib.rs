#![deny(warnings)]

//! Calibration against recorded market history.
//!
//! A [`Benchmark`] seeds a market from the first recorded turn, replays every
//! turn with decisions forced from the recorded prices and spend ratios, and
//! scores each turn by how far the simulated shares and margins land from the
//! actual ones. [`run_suite`] does the same across several scenarios, and
//! [`auto_tune`] searches a parameter grid for the configuration with the
//! lowest average error over such a suite.

mod benchmark;
mod scenario;
mod tune;

use sim_core::ValidationError;
use sim_runtime::TurnError;
use thiserror::Error;

pub use benchmark::{
    firm_error, forced_decisions, run_suite, score_turn, Benchmark, BenchmarkOptions,
    BenchmarkReport, SuiteReport, MARGIN_WEIGHT, SHARE_WEIGHT,
};
pub use scenario::{CompanyInputs, CompanyOutputs, CompanyRecord, HistoricalScenario, HistoricalTurn};
pub use tune::{
    apply_params, auto_tune, derived_price_weight, derived_weights, evaluate, CancelToken, Param,
    ParamSet, SearchSpace, TuneResult,
};

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("scenario has no recorded turns")]
    EmptyScenario,
    #[error("turn {turn}: no ground truth for {firm}")]
    MissingTruth { turn: u32, firm: String },
    #[error("turn {turn}: non-finite error score")]
    NonFinite { turn: u32 },
    #[error("invalid search space: {0}")]
    InvalidSpace(String),
    #[error(
        "no candidate produced a valid score ({skipped} failed, {filtered} below the price-weight floor)"
    )]
    NoValidCandidate { filtered: usize, skipped: usize },
    #[error("search cancelled before any candidate finished")]
    Cancelled,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Turn(#[from] TurnError),
}
