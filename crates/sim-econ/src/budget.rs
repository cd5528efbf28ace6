//! Hybrid spending ceilings and the solvency rule.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sim_core::{Firm, MarketConfig};

use crate::EconError;

/// Strategic R&D ceiling backed by current capital.
pub fn rd_ceiling(capital: f64, config: &MarketConfig) -> f64 {
    if capital > 0.0 {
        (capital * config.rd_budget_rate).max(config.rd_budget_floor)
    } else {
        config.rd_budget_floor
    }
}

/// Operational marketing ceiling backed by the trailing quarter's profit.
pub fn marketing_ceiling(trailing_profit: f64, config: &MarketConfig) -> f64 {
    if trailing_profit > 0.0 {
        (trailing_profit * config.marketing_budget_rate).max(config.marketing_budget_floor)
    } else {
        config.marketing_budget_floor
    }
}

/// True when `turn` closes a quarter and the marketing ceiling is due.
pub fn is_quarter_boundary(turn: u32, config: &MarketConfig) -> bool {
    config.budget_quarter_turns > 0 && turn > 0 && turn % config.budget_quarter_turns == 0
}

/// Capital level below which a firm is bankrupt.
pub fn bankruptcy_threshold(initial_capital: Decimal, fraction: f64) -> Result<Decimal, EconError> {
    let f = Decimal::from_f64(fraction).ok_or(EconError::NonFinite)?;
    Ok(-(initial_capital * f))
}

pub fn is_bankrupt(firm: &Firm, config: &MarketConfig) -> Result<bool, EconError> {
    Ok(firm.capital < bankruptcy_threshold(firm.initial_capital, config.bankruptcy_fraction)?)
}

/// Recompute both ceilings after `turn` has settled.
///
/// The R&D ceiling follows capital every turn; the marketing ceiling only
/// moves on quarter boundaries.
pub fn recompute_budgets(firm: &mut Firm, turn: u32, config: &MarketConfig) -> Result<(), EconError> {
    let capital = firm.capital.to_f64().ok_or(EconError::NonFinite)?;
    firm.rd_budget_ceiling = rd_ceiling(capital, config);
    if is_quarter_boundary(turn, config) {
        firm.marketing_budget_ceiling = marketing_ceiling(firm.trailing_profit(), config);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{FirmKind, FirmSetup};

    fn firm() -> Firm {
        Firm::from_setup(
            &FirmSetup::new("A", 100.0, 0.5).with_capital(100_000.0),
            FirmKind::Strategic,
            &MarketConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn rd_ceiling_tracks_capital() {
        let cfg = MarketConfig {
            rd_budget_floor: 10.0,
            rd_budget_rate: 0.1,
            ..MarketConfig::default()
        };
        assert_eq!(rd_ceiling(-5.0, &cfg), 10.0);
        assert_eq!(rd_ceiling(50.0, &cfg), 10.0);
        assert!(rd_ceiling(2_000.0, &cfg) < rd_ceiling(3_000.0, &cfg));
    }

    #[test]
    fn marketing_ceiling_uses_floor_on_losses() {
        let cfg = MarketConfig::default();
        assert_eq!(marketing_ceiling(-1.0, &cfg), cfg.marketing_budget_floor);
        assert_eq!(marketing_ceiling(1e9, &cfg), 2e8);
    }

    #[test]
    fn quarter_boundaries() {
        let cfg = MarketConfig::default();
        let due: Vec<u32> = (0..=12).filter(|t| is_quarter_boundary(*t, &cfg)).collect();
        assert_eq!(due, vec![4, 8, 12]);
    }

    #[test]
    fn bankruptcy_line_is_half_initial_capital() {
        let cfg = MarketConfig::default();
        let mut f = firm();
        f.capital = Decimal::new(-50_000, 0);
        assert!(!is_bankrupt(&f, &cfg).unwrap());
        f.capital = Decimal::new(-50_001, 0);
        assert!(is_bankrupt(&f, &cfg).unwrap());
    }

    #[test]
    fn marketing_ceiling_moves_only_on_quarter() {
        let cfg = MarketConfig::default();
        let mut f = firm();
        f.push_profit(1e9, cfg.budget_quarter_turns as usize);
        let before = f.marketing_budget_ceiling;
        recompute_budgets(&mut f, 3, &cfg).unwrap();
        assert_eq!(f.marketing_budget_ceiling, before);
        recompute_budgets(&mut f, 4, &cfg).unwrap();
        assert_eq!(f.marketing_budget_ceiling, 2e8);
    }
}
