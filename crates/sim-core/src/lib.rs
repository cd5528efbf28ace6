#![deny(warnings)]

//! Core domain models and invariants for the market wargame.
//!
//! This crate defines the serializable types shared across the simulation:
//! firms and their registry, per-turn decisions, shock events, market
//! configuration and the records a turn leaves behind. Validation helpers
//! guard the basic invariants.

mod config;
mod decision;
mod event;
mod firm;
mod record;

use thiserror::Error;

pub use config::{validate_config, MarketConfig};
pub use decision::{default_price, DecisionRecord, RawDecision, DEFAULT_PRICE_MARKUP};
pub use event::{EffectType, Event, EventTarget, ALL_FIRMS};
pub use firm::{Firm, FirmKind, FirmName, FirmRegistry, FirmSetup};
pub use record::{FirmTurnRecord, MarketSnapshot, TurnRecord};

/// Upper bound of the quality and brand scales.
pub const MAX_SCORE: f64 = 100.0;

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    /// Field must be >= 0.
    #[error("{0} must be non-negative")]
    Negative(&'static str),
    /// Field must be > 0.
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
    /// Field outside its allowed range.
    #[error("out of range: {0}")]
    OutOfRange(&'static str),
    /// Names must not be blank.
    #[error("firm name must not be empty")]
    EmptyName,
    /// Two firms share a name, or a second background firm was added.
    #[error("duplicate firm: {0}")]
    DuplicateFirm(String),
    /// Name collides with the all-firms event target.
    #[error("firm name {0:?} is reserved for events targeting every firm")]
    ReservedName(String),
    /// Effect type string not recognised.
    #[error("unknown effect type: {0}")]
    UnknownEffect(String),
    /// Initial shares must not exceed 1 in total.
    #[error("initial market shares sum to {0}, expected <= 1")]
    ShareSum(f64),
}

/// Clamp a quality/brand score into [0, MAX_SCORE].
pub fn clamp_score(v: f64) -> f64 {
    v.clamp(0.0, MAX_SCORE)
}
