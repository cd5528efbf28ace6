use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Firm, FirmName, MarketConfig};

/// One firm's line in a turn record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FirmTurnRecord {
    /// Listed price decided for the turn.
    pub price: f64,
    /// Price after the promotional discount, as seen by customers.
    pub effective_price: f64,
    /// Brand-building spend actually applied (0 once bankrupt).
    pub marketing_brand_spend: f64,
    /// Promotional spend actually applied.
    pub marketing_promo_spend: f64,
    /// Innovation R&D spend actually applied.
    pub rd_innovation_spend: f64,
    /// Efficiency R&D spend actually applied.
    pub rd_efficiency_spend: f64,
    /// Units sold: turn demand times share.
    pub units_sold: f64,
    /// Units sold times listed price.
    pub revenue: f64,
    /// Revenue less unit costs and all spend.
    pub profit: f64,
    /// Profit over revenue; 0 when revenue is 0.
    pub margin: f64,
    /// Share of the turn's demand in [0,1].
    pub market_share: f64,
    /// Unit cost after inflation, events and efficiency milestones.
    pub unit_cost: f64,
    /// Product quality in [0,100] at the end of the turn.
    pub product_quality: f64,
    /// Brand awareness in [0,100] at the end of the turn.
    pub brand_awareness: f64,
    /// Capital after this turn's profit.
    pub capital: Decimal,
    /// Whether the firm is out of the market at the end of the turn.
    pub bankrupt: bool,
    /// Quality milestones fired this turn.
    pub innovation_milestones: u32,
    /// Cost milestones fired this turn.
    pub efficiency_milestones: u32,
    /// Calibration only: divergence from ground truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
}

/// Immutable summary of one completed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number.
    pub turn: u32,
    /// Demand this turn, after growth and noise.
    pub market_size: f64,
    /// Every firm in the registry, background included.
    pub firms: BTreeMap<FirmName, FirmTurnRecord>,
    /// Calibration only: the turn's composite error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_error: Option<f64>,
}

impl TurnRecord {
    pub fn firm(&self, name: &str) -> Option<&FirmTurnRecord> {
        self.firms.get(name)
    }

    /// Sum of shares recorded this turn.
    pub fn total_share(&self) -> f64 {
        self.firms.values().map(|f| f.market_share).sum()
    }
}

/// Externally visible state of a market between turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub turn: u32,
    pub market_size: f64,
    pub config: MarketConfig,
    pub firms: BTreeMap<FirmName, Firm>,
    /// Descriptions of events currently in effect.
    pub active_events: Vec<String>,
    /// Descriptions of events that start next turn.
    pub pending_events: Vec<String>,
    #[serde(default)]
    pub last_turn: Option<TurnRecord>,
}

impl MarketSnapshot {
    pub fn firm(&self, name: &str) -> Option<&Firm> {
        self.firms.get(name)
    }
}
