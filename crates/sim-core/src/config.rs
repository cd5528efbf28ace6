use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Market physics parameters. Immutable for the lifetime of a run.
///
/// Every field has a default so partial YAML/JSON files deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Total customers (units demanded) per turn.
    pub market_size: f64,
    /// Per-turn market growth (e.g., 0.01 = 1%).
    pub market_growth_rate: f64,
    /// Per-turn unit cost inflation.
    pub inflation_rate: f64,
    /// Uniform demand noise fraction in [0, 1); 0 disables noise.
    pub market_noise: f64,
    /// Seed for the demand noise RNG.
    pub rng_seed: u64,

    /// Starting capital of every firm unless overridden per firm.
    pub initial_capital: f64,
    /// Bankrupt below `-(initial_capital * bankruptcy_fraction)`.
    pub bankruptcy_fraction: f64,

    /// Quality points lost per turn.
    pub quality_decay: f64,
    /// Brand points lost per turn.
    pub brand_decay: f64,

    /// Innovation spend needed for one quality milestone.
    pub rd_innovation_threshold: f64,
    /// Quality points gained per innovation milestone.
    pub rd_innovation_impact: f64,
    /// Efficiency spend needed for one cost milestone.
    pub rd_efficiency_threshold: f64,
    /// Fractional unit cost reduction per efficiency milestone.
    pub rd_efficiency_impact: f64,

    /// Cost of one brand point at brand 0.
    pub marketing_cost_base: f64,
    /// Geometric escalation of brand point cost per 10 brand points.
    pub marketing_cost_multiplier: f64,
    /// Scales brand points bought per unit of cost.
    pub marketing_efficiency: f64,
    /// Price discount per unit of promotional spend.
    pub promo_discount_rate: f64,
    /// Upper bound on the promotional discount, in [0, 1).
    pub max_promo_discount: f64,

    /// R&D ceiling as a fraction of positive capital.
    pub rd_budget_rate: f64,
    /// Minimum R&D ceiling.
    pub rd_budget_floor: f64,
    /// Marketing ceiling as a fraction of trailing quarter profit.
    pub marketing_budget_rate: f64,
    /// Minimum marketing ceiling.
    pub marketing_budget_floor: f64,
    /// Turns per quarter; the marketing ceiling is recomputed on quarter boundaries.
    pub budget_quarter_turns: u32,

    /// Utility weight of product quality.
    pub weight_quality: f64,
    /// Utility weight of brand awareness.
    pub weight_brand: f64,
    /// Utility weight of the price score.
    pub weight_price: f64,
    /// Scale applied to the log price ratio.
    pub price_sensitivity: f64,
    /// Multiplier on the background competitor's utility.
    pub background_strength: f64,

    /// Registry key of the synthetic background competitor.
    pub background_name: String,
    /// Brand spend the background competitor makes every turn. 0 leaves it
    /// decaying at the same rate as a strategic firm that does not spend.
    pub background_brand_spend: f64,
    /// Innovation spend the background competitor makes every turn.
    pub background_rd_spend: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            market_size: 10_000.0,
            market_growth_rate: 0.0,
            inflation_rate: 0.0,
            market_noise: 0.0,
            rng_seed: 42,
            initial_capital: 25_000_000.0,
            bankruptcy_fraction: 0.5,
            quality_decay: 1.0,
            brand_decay: 1.0,
            rd_innovation_threshold: 5_000_000.0,
            rd_innovation_impact: 5.0,
            rd_efficiency_threshold: 5_000_000.0,
            rd_efficiency_impact: 0.05,
            marketing_cost_base: 50_000.0,
            marketing_cost_multiplier: 1.5,
            marketing_efficiency: 1.0,
            promo_discount_rate: 1e-8,
            max_promo_discount: 0.10,
            rd_budget_rate: 0.1,
            rd_budget_floor: 500_000.0,
            marketing_budget_rate: 0.2,
            marketing_budget_floor: 1_000_000.0,
            budget_quarter_turns: 4,
            weight_quality: 1.0,
            weight_brand: 1.0,
            weight_price: 1.0,
            price_sensitivity: 2.0,
            background_strength: 1.0,
            background_name: "Others".to_string(),
            background_brand_spend: 0.0,
            background_rd_spend: 0.0,
        }
    }
}

fn finite(field: &'static str, v: f64) -> Result<f64, ValidationError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ValidationError::NonFinite(field))
    }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ValidationError> {
    if finite(field, v)? < 0.0 {
        return Err(ValidationError::Negative(field));
    }
    Ok(())
}

fn positive(field: &'static str, v: f64) -> Result<(), ValidationError> {
    if finite(field, v)? <= 0.0 {
        return Err(ValidationError::NonPositive(field));
    }
    Ok(())
}

/// Validate a market configuration before a run.
pub fn validate_config(c: &MarketConfig) -> Result<(), ValidationError> {
    non_negative("market_size", c.market_size)?;
    finite("market_growth_rate", c.market_growth_rate)?;
    finite("inflation_rate", c.inflation_rate)?;
    if c.market_growth_rate <= -1.0 || c.inflation_rate <= -1.0 {
        return Err(ValidationError::OutOfRange("growth/inflation must be > -1"));
    }
    if !(0.0..1.0).contains(&finite("market_noise", c.market_noise)?) {
        return Err(ValidationError::OutOfRange("market_noise must be in [0,1)"));
    }
    non_negative("initial_capital", c.initial_capital)?;
    non_negative("bankruptcy_fraction", c.bankruptcy_fraction)?;
    non_negative("quality_decay", c.quality_decay)?;
    non_negative("brand_decay", c.brand_decay)?;
    positive("rd_innovation_threshold", c.rd_innovation_threshold)?;
    non_negative("rd_innovation_impact", c.rd_innovation_impact)?;
    positive("rd_efficiency_threshold", c.rd_efficiency_threshold)?;
    if !(0.0..1.0).contains(&finite("rd_efficiency_impact", c.rd_efficiency_impact)?) {
        return Err(ValidationError::OutOfRange(
            "rd_efficiency_impact must be in [0,1)",
        ));
    }
    positive("marketing_cost_base", c.marketing_cost_base)?;
    positive("marketing_cost_multiplier", c.marketing_cost_multiplier)?;
    non_negative("marketing_efficiency", c.marketing_efficiency)?;
    non_negative("promo_discount_rate", c.promo_discount_rate)?;
    if !(0.0..1.0).contains(&finite("max_promo_discount", c.max_promo_discount)?) {
        return Err(ValidationError::OutOfRange(
            "max_promo_discount must be in [0,1)",
        ));
    }
    non_negative("rd_budget_rate", c.rd_budget_rate)?;
    non_negative("rd_budget_floor", c.rd_budget_floor)?;
    non_negative("marketing_budget_rate", c.marketing_budget_rate)?;
    non_negative("marketing_budget_floor", c.marketing_budget_floor)?;
    if c.budget_quarter_turns == 0 {
        return Err(ValidationError::NonPositive("budget_quarter_turns"));
    }
    finite("weight_quality", c.weight_quality)?;
    finite("weight_brand", c.weight_brand)?;
    finite("weight_price", c.weight_price)?;
    finite("price_sensitivity", c.price_sensitivity)?;
    non_negative("background_strength", c.background_strength)?;
    if c.background_name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    non_negative("background_brand_spend", c.background_brand_spend)?;
    non_negative("background_rd_spend", c.background_rd_spend)?;
    Ok(())
}
