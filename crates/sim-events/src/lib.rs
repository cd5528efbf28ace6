#![deny(warnings)]

//! Event ledger: timed shocks that move firm state each turn.
//!
//! Events go `pending -> active -> expired`. An event injected between turns
//! waits in the pending queue and is applied for the first time on the next
//! turn, then once per turn until its duration runs out.
//!
//! Events that hit the same firm are applied one after another in injection
//! order. A cost multiplier and an additive cost shock therefore do not
//! commute, and the ledger keeps that order.

use serde::{Deserialize, Serialize};
use sim_core::{clamp_score, EffectType, Event, EventTarget, Firm, FirmRegistry};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("event duration must be at least one turn")]
    ZeroDuration,
    #[error("invalid impact value {0} for {1}")]
    InvalidImpact(f64, EffectType),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid shock schedule: {0}")]
    InvalidSchedule(String),
}

impl From<std::io::Error> for EventError {
    fn from(e: std::io::Error) -> Self {
        EventError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for EventError {
    fn from(e: serde_yaml::Error) -> Self {
        EventError::InvalidSchedule(e.to_string())
    }
}

fn validate_event(event: &Event) -> Result<(), EventError> {
    if event.remaining_duration == 0 {
        return Err(EventError::ZeroDuration);
    }
    let v = event.impact_value;
    let ok = match event.effect_type {
        EffectType::UnitCostMultiplier => v.is_finite() && v >= 0.0,
        EffectType::UnitCostShock | EffectType::QualityShock | EffectType::BrandShock => {
            v.is_finite()
        }
    };
    if ok {
        Ok(())
    } else {
        Err(EventError::InvalidImpact(v, event.effect_type))
    }
}

/// Apply one event's effect to one firm.
pub fn apply_event(event: &Event, firm: &mut Firm) {
    match event.effect_type {
        EffectType::UnitCostMultiplier => firm.unit_cost *= event.impact_value,
        EffectType::UnitCostShock => {
            firm.unit_cost = (firm.unit_cost + event.impact_value).max(0.0)
        }
        EffectType::QualityShock => {
            firm.product_quality = clamp_score(firm.product_quality + event.impact_value)
        }
        EffectType::BrandShock => {
            firm.brand_awareness = clamp_score(firm.brand_awareness + event.impact_value)
        }
    }
}

/// Pending and active events of one market.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLedger {
    pending: Vec<Event>,
    active: Vec<Event>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; it takes effect from the next applied turn.
    pub fn inject(&mut self, event: Event) -> Result<(), EventError> {
        validate_event(&event)?;
        info!(
            description = %event.description,
            effect = %event.effect_type,
            impact = event.impact_value,
            duration = event.remaining_duration,
            "event queued"
        );
        self.pending.push(event);
        Ok(())
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn active(&self) -> &[Event] {
        &self.active
    }

    pub fn pending_descriptions(&self) -> Vec<String> {
        self.pending.iter().map(|e| e.description.clone()).collect()
    }

    pub fn active_descriptions(&self) -> Vec<String> {
        self.active.iter().map(|e| e.description.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Run the ledger for one turn.
    ///
    /// Promotes pending events, applies every active event to each matching
    /// firm in injection order, then counts durations down and drops expired
    /// events. Returns the number of (event, firm) applications.
    pub fn apply_turn(&mut self, registry: &mut FirmRegistry) -> usize {
        self.active.append(&mut self.pending);
        let mut applied = 0;
        for event in &self.active {
            for firm in registry.iter_mut() {
                if event.target.matches(&firm.name) {
                    apply_event(event, firm);
                    applied += 1;
                }
            }
            if let EventTarget::Firm(name) = &event.target {
                if !registry.contains(name.as_str()) {
                    debug!(target_firm = %name, "event target not in registry");
                }
            }
        }
        for event in &mut self.active {
            event.remaining_duration = event.remaining_duration.saturating_sub(1);
        }
        let before = self.active.len();
        self.active.retain(|e| e.remaining_duration > 0);
        if self.active.len() < before {
            info!(expired = before - self.active.len(), "events expired");
        }
        applied
    }
}

/// One entry of a shock schedule: an event injected before a given turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledShock {
    /// Turn in which the event is first applied.
    pub turn: u32,
    pub description: String,
    #[serde(default = "ScheduledShock::default_target")]
    pub target: EventTarget,
    pub effect_type: EffectType,
    pub impact_value: f64,
    pub duration: u32,
}

impl ScheduledShock {
    fn default_target() -> EventTarget {
        EventTarget::All
    }

    pub fn to_event(&self) -> Event {
        Event {
            description: self.description.clone(),
            target: self.target.clone(),
            effect_type: self.effect_type,
            impact_value: self.impact_value,
            remaining_duration: self.duration,
        }
    }
}

/// Scripted shocks loaded from YAML, keyed by turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShockSchedule {
    #[serde(default)]
    pub shocks: Vec<ScheduledShock>,
}

impl ShockSchedule {
    pub fn from_yaml_str(text: &str) -> Result<Self, EventError> {
        let schedule: ShockSchedule = serde_yaml::from_str(text)?;
        for shock in &schedule.shocks {
            validate_event(&shock.to_event())?;
        }
        Ok(schedule)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EventError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Events to inject right before `turn` runs, in file order.
    pub fn due(&self, turn: u32) -> impl Iterator<Item = Event> + '_ {
        self.shocks
            .iter()
            .filter(move |s| s.turn == turn)
            .map(ScheduledShock::to_event)
    }

    pub fn is_empty(&self) -> bool {
        self.shocks.is_empty()
    }
}
