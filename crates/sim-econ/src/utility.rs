//! Logit choice model: decisions and firm state to market shares.

use sim_core::MarketConfig;
use std::collections::BTreeMap;

use crate::EconError;

/// What the choice model needs to know about one active firm this turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contender {
    /// Listed price for the turn (> 0).
    pub price: f64,
    /// Promotional spend; buys a capped discount on the perceived price.
    pub promo_spend: f64,
    /// Product quality in [0,100] after this turn's decay and milestones.
    pub quality: f64,
    /// Brand awareness in [0,100] after this turn's decay and brand spend.
    pub brand: f64,
    /// Background aggregate; its utility is scaled by `background_strength`.
    pub background: bool,
}

/// Arithmetic mean of prices; 1 when empty or not positive.
pub fn mean_price<I: IntoIterator<Item = f64>>(prices: I) -> f64 {
    let (sum, n) = prices
        .into_iter()
        .fold((0.0, 0usize), |(s, n), p| (s + p, n + 1));
    if n == 0 {
        return 1.0;
    }
    let mean = sum / n as f64;
    if mean.is_finite() && mean > 0.0 {
        mean
    } else {
        1.0
    }
}

/// Fractional discount bought by promotional spend, capped at `max_promo_discount`.
pub fn promo_discount(promo_spend: f64, config: &MarketConfig) -> f64 {
    let raw = (promo_spend * config.promo_discount_rate).max(0.0);
    if raw.is_finite() {
        raw.min(config.max_promo_discount)
    } else {
        config.max_promo_discount
    }
}

/// Price as perceived by customers after the promotional discount.
///
/// Example:
/// let cfg = MarketConfig::default();
/// assert_eq!(effective_price(100.0, 0.0, &cfg), 100.0);
pub fn effective_price(price: f64, promo_spend: f64, config: &MarketConfig) -> f64 {
    price * (1.0 - promo_discount(promo_spend, config))
}

/// Log price ratio `sensitivity * ln(mean / effective)`.
///
/// Positive when the firm is cheaper than the mean.
pub fn price_score(mean: f64, effective: f64, sensitivity: f64) -> Result<f64, EconError> {
    if !(effective.is_finite() && effective > 0.0) || !(mean.is_finite() && mean > 0.0) {
        return Err(EconError::InvalidPrice);
    }
    let score = sensitivity * (mean / effective).ln();
    if score.is_finite() {
        Ok(score)
    } else {
        Err(EconError::NonFinite)
    }
}

/// Linear utility of one contender against the turn's mean price.
pub fn utility(c: &Contender, mean: f64, config: &MarketConfig) -> Result<f64, EconError> {
    let eff = effective_price(c.price, c.promo_spend, config);
    let ps = price_score(mean, eff, config.price_sensitivity)?;
    let mut u = config.weight_quality * c.quality / 10.0
        + config.weight_brand * c.brand / 10.0
        + config.weight_price * ps;
    if c.background {
        u *= config.background_strength;
    }
    if u.is_finite() {
        Ok(u)
    } else {
        Err(EconError::NonFinite)
    }
}

/// Numerically stable softmax. Returns all zeros if the normaliser degenerates.
pub fn softmax(utilities: &[f64]) -> Vec<f64> {
    let max = utilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![0.0; utilities.len()];
    }
    let exps: Vec<f64> = utilities.iter().map(|u| (u - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return vec![0.0; utilities.len()];
    }
    exps.into_iter().map(|e| e / total).collect()
}

/// Allocate market share across the active contenders.
///
/// Firms absent from `contenders` receive no entry; the caller treats them as 0.
pub fn allocate_shares<K: Ord + Clone>(
    contenders: &BTreeMap<K, Contender>,
    config: &MarketConfig,
) -> Result<BTreeMap<K, f64>, EconError> {
    if contenders.is_empty() {
        return Ok(BTreeMap::new());
    }
    let mean = mean_price(contenders.values().map(|c| c.price));
    let utilities = contenders
        .values()
        .map(|c| utility(c, mean, config))
        .collect::<Result<Vec<f64>, EconError>>()?;
    let shares = softmax(&utilities);
    Ok(contenders.keys().cloned().zip(shares).collect())
}
