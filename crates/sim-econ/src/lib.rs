#![deny(warnings)]

//! Economic models for the market wargame.
//!
//! This crate provides validated, side-effect free helpers for:
//! - The logit choice model that turns decisions into market share
//! - Asset decay, diminishing-returns brand building and R&D milestones
//! - Hybrid budget ceilings and the bankruptcy rule
//! - Turn settlement (units, revenue, profit, margin) and seeded demand noise

pub mod assets;
pub mod budget;
pub mod utility;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use assets::{apply_brand_spend, apply_rd_spend, decay, Milestones};
pub use budget::{is_bankrupt, recompute_budgets};
pub use utility::{allocate_shares, effective_price, Contender};

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Prices must be finite and strictly positive.
    #[error("invalid price value")]
    InvalidPrice,
    /// A computation produced NaN or infinity.
    #[error("non-finite numeric result")]
    NonFinite,
    /// Milestone thresholds must be finite and > 0.
    #[error("invalid milestone threshold: {0}")]
    InvalidThreshold(f64),
}

/// Financial outcome of one firm's turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub units: f64,
    pub revenue: f64,
    pub profit: f64,
    pub margin: f64,
}

/// Profit over revenue, 0 when there is no revenue.
pub fn margin(profit: f64, revenue: f64) -> f64 {
    if revenue == 0.0 || !revenue.is_finite() {
        0.0
    } else {
        profit / revenue
    }
}

/// Settle a turn: `units = size * share`, `profit = revenue - units * cost - spend`.
///
/// Example:
/// let s = settle(1000.0, 0.5, 10.0, 8.0, 100.0).unwrap();
/// assert_eq!(s.profit, 900.0);
pub fn settle(
    market_size: f64,
    share: f64,
    price: f64,
    unit_cost: f64,
    spend: f64,
) -> Result<Settlement, EconError> {
    let units = market_size * share;
    let revenue = units * price;
    let profit = revenue - units * unit_cost - spend;
    if !(units.is_finite() && revenue.is_finite() && profit.is_finite()) {
        return Err(EconError::NonFinite);
    }
    Ok(Settlement {
        units,
        revenue,
        profit,
        margin: margin(profit, revenue),
    })
}

/// Add a turn's profit to capital.
pub fn apply_profit(capital: Decimal, profit: f64) -> Result<Decimal, EconError> {
    let p = Decimal::from_f64(profit).ok_or(EconError::NonFinite)?;
    capital.checked_add(p).ok_or(EconError::NonFinite)
}

/// Market size with multiplicative uniform noise in [1-noise_frac, 1+noise_frac].
///
/// Noise is seeded for reproducibility. `noise_frac` must be in [0, 1).
pub fn market_size_with_noise(size: f64, noise_frac: f64, seed: u64) -> Result<f64, EconError> {
    if !noise_frac.is_finite() || !(0.0..1.0).contains(&noise_frac) || !size.is_finite() {
        return Err(EconError::NonFinite);
    }
    if noise_frac == 0.0 {
        return Ok(size);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u: f64 = rng.gen_range(-noise_frac..=noise_frac);
    Ok((size * (1.0 + u)).max(0.0))
}
