#![deny(warnings)]

//! Turn orchestrator for the market wargame.
//!
//! [`Market`] owns the firm registry, the event ledger and the append-only
//! turn history, and sequences one turn as
//! `MacroAdjust -> EventApply -> Decay -> SolvencyCheck -> AssetUpdate ->
//! ShareAllocation -> FinancialSettlement -> BudgetRecompute -> Logged`.
//! [`gather_decisions`] collects decisions from an external source with a
//! per-firm timeout before a turn starts.

mod gather;
mod market;

use sim_core::ValidationError;
use sim_econ::EconError;
use sim_events::EventError;
use thiserror::Error;

pub use gather::gather_decisions;
pub use market::{Market, TurnScore};

/// Errors that abort a turn. The market is left unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum TurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Market(#[from] EconError),
    #[error(transparent)]
    Event(#[from] EventError),
    /// Economic failure attributable to one firm.
    #[error("firm {firm}: {source}")]
    Econ {
        firm: String,
        #[source]
        source: EconError,
    },
}

/// Phases of one turn, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    MacroAdjust,
    EventApply,
    Decay,
    SolvencyCheck,
    AssetUpdate,
    ShareAllocation,
    FinancialSettlement,
    BudgetRecompute,
    Logged,
}

impl TurnPhase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::MacroAdjust,
            Self::MacroAdjust => Self::EventApply,
            Self::EventApply => Self::Decay,
            Self::Decay => Self::SolvencyCheck,
            Self::SolvencyCheck => Self::AssetUpdate,
            Self::AssetUpdate => Self::ShareAllocation,
            Self::ShareAllocation => Self::FinancialSettlement,
            Self::FinancialSettlement => Self::BudgetRecompute,
            Self::BudgetRecompute => Self::Logged,
            Self::Logged => Self::Idle,
        }
    }
}
