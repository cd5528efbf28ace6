use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{FirmName, ValidationError};

/// How an event changes the firms it targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Unit cost is multiplied by the impact value.
    UnitCostMultiplier,
    /// Impact value is added to unit cost, floored at 0.
    UnitCostShock,
    /// Impact value is added to product quality.
    QualityShock,
    /// Impact value is added to brand awareness.
    BrandShock,
}

impl FromStr for EffectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unit_cost_multiplier" => Ok(Self::UnitCostMultiplier),
            "unit_cost_shock" => Ok(Self::UnitCostShock),
            "quality_shock" => Ok(Self::QualityShock),
            "brand_shock" => Ok(Self::BrandShock),
            other => Err(ValidationError::UnknownEffect(other.to_string())),
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnitCostMultiplier => "unit_cost_multiplier",
            Self::UnitCostShock => "unit_cost_shock",
            Self::QualityShock => "quality_shock",
            Self::BrandShock => "brand_shock",
        })
    }
}

/// Target string that addresses every firm. Reserved: no firm may use it as a name.
pub const ALL_FIRMS: &str = "all";

/// Firms an event applies to. Serialized as "all" or a firm name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventTarget {
    All,
    Firm(FirmName),
}

impl EventTarget {
    /// Whether `name` would be read as the all-firms target.
    pub fn is_reserved(name: &str) -> bool {
        name.trim().eq_ignore_ascii_case(ALL_FIRMS)
    }

    pub fn matches(&self, name: &FirmName) -> bool {
        match self {
            Self::All => true,
            Self::Firm(target) => target == name,
        }
    }
}

impl From<String> for EventTarget {
    fn from(s: String) -> Self {
        if Self::is_reserved(&s) {
            Self::All
        } else {
            Self::Firm(FirmName(s))
        }
    }
}

impl From<&str> for EventTarget {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EventTarget> for String {
    fn from(t: EventTarget) -> Self {
        match t {
            EventTarget::All => ALL_FIRMS.to_string(),
            EventTarget::Firm(name) => name.0,
        }
    }
}

/// A temporary shock applied once per turn until its duration runs out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub description: String,
    pub target: EventTarget,
    pub effect_type: EffectType,
    pub impact_value: f64,
    /// Turns left; the event is discarded when this reaches 0.
    pub remaining_duration: u32,
}

impl Event {
    pub fn new(
        description: impl Into<String>,
        target: impl Into<EventTarget>,
        effect_type: EffectType,
        impact_value: f64,
        duration: u32,
    ) -> Self {
        Self {
            description: description.into(),
            target: target.into(),
            effect_type,
            impact_value,
            remaining_duration: duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!(EventTarget::from("All"), EventTarget::All);
        assert_eq!(EventTarget::from("all"), EventTarget::All);
        let t = EventTarget::from("Apple");
        assert!(t.matches(&FirmName::from("Apple")));
        assert!(!t.matches(&FirmName::from("Nokia")));
        assert!(EventTarget::All.matches(&FirmName::from("Nokia")));
        assert!(EventTarget::is_reserved(" ALL "));
        assert!(!EventTarget::is_reserved("Allegro"));
    }

    #[test]
    fn effect_type_round_trips_through_str() {
        for e in [
            EffectType::UnitCostMultiplier,
            EffectType::UnitCostShock,
            EffectType::QualityShock,
            EffectType::BrandShock,
        ] {
            assert_eq!(e.to_string().parse::<EffectType>().unwrap(), e);
        }
        assert!("price_cut".parse::<EffectType>().is_err());
    }

    #[test]
    fn event_serializes_with_string_target() {
        let ev = Event::new(
            "supply chain",
            "all",
            EffectType::UnitCostMultiplier,
            1.2,
            3,
        );
        let s = serde_json::to_string(&ev).unwrap();
        assert!(s.contains("\"target\":\"all\""));
        assert!(s.contains("unit_cost_multiplier"));
        let back: Event = serde_json::from_str(&s).unwrap();
        assert_eq!(back, ev);
    }
}
