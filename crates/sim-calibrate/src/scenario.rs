use serde::{Deserialize, Serialize};
use sim_core::FirmName;
use std::collections::BTreeMap;

use crate::CalibrationError;

/// A recorded market history used as ground truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalScenario {
    /// Display name, used in reports and logs.
    pub scenario_name: String,
    /// Free-text context; optional in files.
    #[serde(default)]
    pub description: String,
    /// Recorded turns in order. The first one seeds the market.
    pub turns_data: Vec<HistoricalTurn>,
}

/// One recorded turn: what every firm did and what the market made of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTurn {
    /// 1-based turn number, used in error messages.
    pub turn: u32,
    /// Period label, e.g. "Quarter 3".
    #[serde(default)]
    pub note: String,
    /// Recorded firms keyed by name. Only these are scored.
    pub companies: BTreeMap<FirmName, CompanyRecord>,
}

/// One firm's recorded turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// What the firm did; replayed as a forced decision.
    pub inputs: CompanyInputs,
    /// What the market made of it; the ground truth.
    pub outputs: CompanyOutputs,
}

/// Decision inputs, with spends given as fractions of expected revenue.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyInputs {
    /// Listed price in the scenario's own currency unit.
    pub price: f64,
    /// Brand spend as a fraction of expected revenue.
    #[serde(default)]
    pub marketing_spend_ratio: f64,
    /// Innovation spend as a fraction of expected revenue.
    #[serde(default)]
    pub rd_spend_ratio: f64,
}

/// Observed market result of one firm's turn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyOutputs {
    /// Actual share of the whole market in [0,1].
    pub actual_market_share: f64,
    /// Not every source reports margins; a missing one scores 0 on that term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_margin: Option<f64>,
}

impl HistoricalScenario {
    pub fn first_turn(&self) -> Result<&HistoricalTurn, CalibrationError> {
        self.turns_data.first().ok_or(CalibrationError::EmptyScenario)
    }

    /// Firms present in the first recorded turn.
    pub fn firms(&self) -> Vec<FirmName> {
        self.turns_data
            .first()
            .map(|t| t.companies.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.turns_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns_data.is_empty()
    }
}

impl HistoricalTurn {
    pub fn actual_share(&self, firm: &str) -> Option<f64> {
        self.companies.get(firm).map(|c| c.outputs.actual_market_share)
    }

    /// Firm with the largest recorded share; ties go to the first name.
    pub fn actual_leader(&self) -> Option<&FirmName> {
        leader(
            self.companies
                .iter()
                .map(|(n, c)| (n, c.outputs.actual_market_share)),
        )
    }
}

pub(crate) fn leader<'a, I>(shares: I) -> Option<&'a FirmName>
where
    I: IntoIterator<Item = (&'a FirmName, f64)>,
{
    let mut best: Option<(&FirmName, f64)> = None;
    for (name, share) in shares {
        match best {
            Some((_, s)) if share <= s => {}
            _ => best = Some((name, share)),
        }
    }
    best.map(|(n, _)| n)
}
