use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::{EventTarget, MarketConfig, ValidationError};

/// Stable registry key of a firm, e.g. "Apple" or "Others".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmName(pub String);

impl FirmName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FirmName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FirmName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for FirmName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Whether a firm is a strategic competitor or the market background aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmKind {
    /// Makes its own decisions each turn.
    Strategic,
    /// Rule-derived aggregate of the rest of the market.
    Background,
}

/// Initial state of one firm when a market is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FirmSetup {
    pub name: FirmName,
    pub unit_cost: f64,
    pub market_share: f64,
    #[serde(default = "FirmSetup::default_score")]
    pub product_quality: f64,
    #[serde(default = "FirmSetup::default_score")]
    pub brand_awareness: f64,
    /// Overrides `MarketConfig::initial_capital` for this firm.
    #[serde(default)]
    pub initial_capital: Option<f64>,
}

impl FirmSetup {
    fn default_score() -> f64 {
        50.0
    }

    /// Setup with neutral quality/brand and the config's capital.
    pub fn new(name: impl Into<String>, unit_cost: f64, market_share: f64) -> Self {
        Self {
            name: FirmName::new(name),
            unit_cost,
            market_share,
            product_quality: Self::default_score(),
            brand_awareness: Self::default_score(),
            initial_capital: None,
        }
    }

    pub fn with_assets(mut self, product_quality: f64, brand_awareness: f64) -> Self {
        self.product_quality = product_quality;
        self.brand_awareness = brand_awareness;
        self
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = Some(capital);
        self
    }
}

/// Authoritative mutable state of one firm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Firm {
    pub name: FirmName,
    pub kind: FirmKind,
    /// Share of the market in [0,1] after the last turn.
    pub market_share: f64,
    /// Cost per unit sold (>= 0).
    pub unit_cost: f64,
    /// Running sum of initial capital and profits; negative signals distress.
    pub capital: Decimal,
    pub initial_capital: Decimal,
    /// Product quality in [0,100].
    pub product_quality: f64,
    /// Brand awareness in [0,100].
    pub brand_awareness: f64,
    /// Hard cap on brand + promo spend per turn.
    pub marketing_budget_ceiling: f64,
    /// Hard cap on innovation + efficiency spend per turn.
    pub rd_budget_ceiling: f64,
    /// Innovation points toward the next quality milestone.
    pub rd_innovation_accumulator: f64,
    /// Efficiency points toward the next cost milestone.
    pub rd_efficiency_accumulator: f64,
    /// Excluded from share allocation while set.
    pub bankrupt: bool,
    /// Per-turn profits, most recent last, trimmed to one quarter.
    pub profit_history: Vec<f64>,
}

impl Firm {
    /// Build a firm from its setup, validating ranges.
    pub fn from_setup(
        setup: &FirmSetup,
        kind: FirmKind,
        config: &MarketConfig,
    ) -> Result<Self, ValidationError> {
        if setup.name.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !setup.unit_cost.is_finite() || setup.unit_cost < 0.0 {
            return Err(ValidationError::Negative("unit_cost"));
        }
        if !(0.0..=1.0).contains(&setup.market_share) {
            return Err(ValidationError::OutOfRange("market_share must be in [0,1]"));
        }
        for (field, v) in [
            ("product_quality", setup.product_quality),
            ("brand_awareness", setup.brand_awareness),
        ] {
            if !v.is_finite() {
                return Err(ValidationError::NonFinite(field));
            }
            if !(0.0..=100.0).contains(&v) {
                return Err(ValidationError::OutOfRange("scores must be in [0,100]"));
            }
        }
        let capital_f = setup.initial_capital.unwrap_or(config.initial_capital);
        let capital =
            Decimal::from_f64(capital_f).ok_or(ValidationError::NonFinite("initial_capital"))?;
        Ok(Self {
            name: setup.name.clone(),
            kind,
            market_share: setup.market_share,
            unit_cost: setup.unit_cost,
            capital,
            initial_capital: capital,
            product_quality: setup.product_quality,
            brand_awareness: setup.brand_awareness,
            marketing_budget_ceiling: config.marketing_budget_floor,
            rd_budget_ceiling: config.rd_budget_floor,
            rd_innovation_accumulator: 0.0,
            rd_efficiency_accumulator: 0.0,
            bankrupt: false,
            profit_history: Vec::new(),
        })
    }

    pub fn is_background(&self) -> bool {
        self.kind == FirmKind::Background
    }

    /// Record a turn's profit, keeping at most `window` entries.
    pub fn push_profit(&mut self, profit: f64, window: usize) {
        self.profit_history.push(profit);
        if self.profit_history.len() > window {
            let excess = self.profit_history.len() - window;
            self.profit_history = self.profit_history.split_off(excess);
        }
    }

    /// Sum of the retained trailing profits.
    pub fn trailing_profit(&self) -> f64 {
        self.profit_history.iter().sum()
    }
}

/// Keyed store of every firm in a market. Iteration order is by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmRegistry {
    firms: BTreeMap<FirmName, Firm>,
}

impl FirmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a firm; names must be unique and must not be the all-firms target.
    pub fn insert(&mut self, firm: Firm) -> Result<(), ValidationError> {
        if EventTarget::is_reserved(firm.name.as_str()) {
            return Err(ValidationError::ReservedName(firm.name.0.clone()));
        }
        if self.firms.contains_key(&firm.name) {
            return Err(ValidationError::DuplicateFirm(firm.name.0.clone()));
        }
        if firm.is_background() && self.background().is_some() {
            return Err(ValidationError::DuplicateFirm(firm.name.0.clone()));
        }
        self.firms.insert(firm.name.clone(), firm);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Firm> {
        self.firms.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Firm> {
        self.firms.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.firms.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Firm> {
        self.firms.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Firm> {
        self.firms.values_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &FirmName> {
        self.firms.keys()
    }

    /// The synthetic background competitor, if present.
    pub fn background(&self) -> Option<&Firm> {
        self.firms.values().find(|f| f.is_background())
    }

    /// Strategic (non-background) firms.
    pub fn strategic(&self) -> impl Iterator<Item = &Firm> {
        self.firms.values().filter(|f| !f.is_background())
    }

    pub fn background_name(&self) -> Option<&FirmName> {
        self.background().map(|f| &f.name)
    }

    pub fn strategic_names(&self) -> Vec<FirmName> {
        self.strategic().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    /// Sum of market shares across all firms.
    pub fn total_share(&self) -> f64 {
        self.firms.values().map(|f| f.market_share).sum()
    }
}
