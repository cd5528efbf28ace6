//! Intangible assets: decay, brand building and R&D milestones.

use serde::{Deserialize, Serialize};
use sim_core::{clamp_score, Firm, MarketConfig};
use tracing::debug;

use crate::EconError;

/// Milestones fired by one turn of R&D spend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
    pub innovation: u32,
    pub efficiency: u32,
}

/// Age quality and brand by the per-turn decay rates, floored at 0.
pub fn decay(firm: &mut Firm, config: &MarketConfig) {
    firm.product_quality = clamp_score(firm.product_quality - config.quality_decay);
    firm.brand_awareness = clamp_score(firm.brand_awareness - config.brand_decay);
}

/// Cost of one brand point at the given brand level: `base * multiplier^(brand/10)`.
pub fn brand_cost_per_point(brand: f64, config: &MarketConfig) -> f64 {
    config.marketing_cost_base * config.marketing_cost_multiplier.powf(brand / 10.0)
}

/// Brand points bought by `spend` at the current brand level.
pub fn brand_points(spend: f64, brand: f64, config: &MarketConfig) -> Result<f64, EconError> {
    if spend <= 0.0 {
        return Ok(0.0);
    }
    let cost = brand_cost_per_point(brand, config);
    if !(cost.is_finite() && cost > 0.0) {
        return Err(EconError::NonFinite);
    }
    let points = spend / cost * config.marketing_efficiency;
    if points.is_finite() {
        Ok(points)
    } else {
        Err(EconError::NonFinite)
    }
}

/// Convert brand spend into brand awareness. Returns the points gained after clamping.
pub fn apply_brand_spend(
    firm: &mut Firm,
    spend: f64,
    config: &MarketConfig,
) -> Result<f64, EconError> {
    let points = brand_points(spend, firm.brand_awareness, config)?;
    let before = firm.brand_awareness;
    firm.brand_awareness = clamp_score(before + points);
    Ok(firm.brand_awareness - before)
}

/// Add spend to an accumulator and fire every milestone it now covers.
///
/// The threshold is subtracted per milestone, so overshoot carries forward.
/// The milestone count saturates at `u32::MAX`.
pub fn accumulate(accumulator: &mut f64, spend: f64, threshold: f64) -> Result<u32, EconError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(EconError::InvalidThreshold(threshold));
    }
    let total = *accumulator + spend.max(0.0);
    if !total.is_finite() {
        return Err(EconError::NonFinite);
    }
    let rest = total % threshold;
    let fired = ((total - rest) / threshold).round().min(u32::MAX as f64) as u32;
    *accumulator = rest;
    Ok(fired)
}

/// Apply a turn's R&D spend to both accumulator tracks and their milestones.
pub fn apply_rd_spend(
    firm: &mut Firm,
    innovation_spend: f64,
    efficiency_spend: f64,
    config: &MarketConfig,
) -> Result<Milestones, EconError> {
    let innovation = accumulate(
        &mut firm.rd_innovation_accumulator,
        innovation_spend,
        config.rd_innovation_threshold,
    )?;
    if innovation > 0 {
        firm.product_quality = clamp_score(
            firm.product_quality + config.rd_innovation_impact * innovation as f64,
        );
        debug!(firm = %firm.name, count = innovation, quality = firm.product_quality, "innovation milestone");
    }
    let efficiency = accumulate(
        &mut firm.rd_efficiency_accumulator,
        efficiency_spend,
        config.rd_efficiency_threshold,
    )?;
    if efficiency > 0 {
        firm.unit_cost *= (1.0 - config.rd_efficiency_impact).powf(f64::from(efficiency));
        debug!(firm = %firm.name, count = efficiency, unit_cost = firm.unit_cost, "efficiency milestone");
    }
    Ok(Milestones {
        innovation,
        efficiency,
    })
}
