use serde::{Deserialize, Serialize};

/// Default price markup over unit cost when a decision carries no usable price.
pub const DEFAULT_PRICE_MARKUP: f64 = 1.1;

/// One firm's validated choices for a turn.
///
/// The caller guarantees non-negative spends and a strictly positive price.
/// `Market::advance_turn` takes records as given; budget ceilings are applied
/// when collaborator output is resolved (see [`DecisionRecord::within_budget`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Listed unit price. Revenue is charged at this price.
    pub price: f64,
    /// Spend converted into lasting brand awareness.
    #[serde(default)]
    pub marketing_brand_spend: f64,
    /// Spend that discounts this turn's perceived price only.
    #[serde(default)]
    pub marketing_promo_spend: f64,
    /// Spend added to the quality milestone accumulator.
    #[serde(default)]
    pub rd_innovation_spend: f64,
    /// Spend added to the unit cost milestone accumulator.
    #[serde(default)]
    pub rd_efficiency_spend: f64,
}

impl DecisionRecord {
    /// Price-only decision with no spend.
    pub fn priced(price: f64) -> Self {
        Self {
            price,
            ..Self::default()
        }
    }

    pub fn total_marketing(&self) -> f64 {
        self.marketing_brand_spend + self.marketing_promo_spend
    }

    pub fn total_rd(&self) -> f64 {
        self.rd_innovation_spend + self.rd_efficiency_spend
    }

    pub fn total_spend(&self) -> f64 {
        self.total_marketing() + self.total_rd()
    }

    /// Same price, every spend forced to zero.
    pub fn zeroed_spend(&self) -> Self {
        Self::priced(self.price)
    }

    /// Scale each spend group down to its ceiling, keeping the split inside
    /// the group. Marketing is brand + promo, R&D is innovation + efficiency.
    ///
    /// Returns the bounded record and whether anything was cut.
    pub fn within_budget(&self, marketing_ceiling: f64, rd_ceiling: f64) -> (Self, bool) {
        let mut out = *self;
        let mut clipped = false;
        let marketing = self.total_marketing();
        if marketing > marketing_ceiling {
            let k = scale(marketing_ceiling, marketing);
            out.marketing_brand_spend *= k;
            out.marketing_promo_spend *= k;
            clipped = true;
        }
        let rd = self.total_rd();
        if rd > rd_ceiling {
            let k = scale(rd_ceiling, rd);
            out.rd_innovation_spend *= k;
            out.rd_efficiency_spend *= k;
            clipped = true;
        }
        (out, clipped)
    }
}

fn scale(ceiling: f64, total: f64) -> f64 {
    if ceiling.is_finite() && ceiling > 0.0 && total.is_finite() {
        ceiling / total
    } else {
        0.0
    }
}

/// Decision as delivered by the decision collaborator; any field may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub marketing_brand_spend: Option<f64>,
    #[serde(default)]
    pub marketing_promo_spend: Option<f64>,
    #[serde(default)]
    pub rd_innovation_spend: Option<f64>,
    #[serde(default)]
    pub rd_efficiency_spend: Option<f64>,
}

fn spend_or_zero(v: Option<f64>) -> f64 {
    match v {
        Some(x) if x.is_finite() && x >= 0.0 => x,
        _ => 0.0,
    }
}

impl RawDecision {
    /// Substitute safe defaults for missing or malformed fields.
    ///
    /// A missing, non-finite or non-positive price becomes
    /// `unit_cost * DEFAULT_PRICE_MARKUP`; bad spends become 0.
    pub fn resolve(&self, unit_cost: f64) -> DecisionRecord {
        let price = match self.price {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => default_price(unit_cost),
        };
        DecisionRecord {
            price,
            marketing_brand_spend: spend_or_zero(self.marketing_brand_spend),
            marketing_promo_spend: spend_or_zero(self.marketing_promo_spend),
            rd_innovation_spend: spend_or_zero(self.rd_innovation_spend),
            rd_efficiency_spend: spend_or_zero(self.rd_efficiency_spend),
        }
    }
}

impl From<DecisionRecord> for RawDecision {
    fn from(d: DecisionRecord) -> Self {
        Self {
            price: Some(d.price),
            marketing_brand_spend: Some(d.marketing_brand_spend),
            marketing_promo_spend: Some(d.marketing_promo_spend),
            rd_innovation_spend: Some(d.rd_innovation_spend),
            rd_efficiency_spend: Some(d.rd_efficiency_spend),
        }
    }
}

/// Fallback price for a firm, never below a tiny positive value.
pub fn default_price(unit_cost: f64) -> f64 {
    let p = unit_cost * DEFAULT_PRICE_MARKUP;
    if p.is_finite() && p > 0.0 {
        p
    } else {
        1.0
    }
}
