use sim_core::{
    default_price, validate_config, DecisionRecord, EffectType, Event, EventTarget, Firm,
    FirmKind, FirmName, FirmRegistry, FirmSetup, FirmTurnRecord, MarketConfig, MarketSnapshot,
    RawDecision, TurnRecord, ValidationError,
};
use sim_econ::{
    allocate_shares, apply_brand_spend, apply_profit, apply_rd_spend, budget, decay,
    effective_price, market_size_with_noise, recompute_budgets, settle, utility::mean_price,
    Contender, EconError, Milestones, Settlement,
};
use sim_events::{EventLedger, ShockSchedule};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::{TurnError, TurnPhase};

/// Divergence of one turn from ground truth, attached to its record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnScore {
    /// Error of each scored firm; unscored firms keep `error: None`.
    pub per_firm: BTreeMap<FirmName, f64>,
    /// Turn-level error written to `TurnRecord::aggregate_error`.
    pub aggregate: f64,
}

/// A market of competing firms advanced one turn at a time.
///
/// Turns run against a working copy of the registry and ledger and are
/// committed only when every phase succeeds.
#[derive(Clone, Debug)]
pub struct Market {
    config: MarketConfig,
    registry: FirmRegistry,
    ledger: EventLedger,
    schedule: ShockSchedule,
    market_size: f64,
    turn: u32,
    history: Vec<TurnRecord>,
}

/// State carried through the phases of one turn before it is committed.
struct TurnWork {
    turn: u32,
    phase: TurnPhase,
    registry: FirmRegistry,
    ledger: EventLedger,
    base_size: f64,
    demand: f64,
    decisions: BTreeMap<FirmName, DecisionRecord>,
    milestones: BTreeMap<FirmName, Milestones>,
    shares: BTreeMap<FirmName, f64>,
    settlements: BTreeMap<FirmName, Settlement>,
}

impl TurnWork {
    fn enter(&mut self, next: TurnPhase) {
        debug_assert_eq!(self.phase.next(), next);
        self.phase = next;
        debug!(turn = self.turn, phase = ?next, "phase");
    }
}

fn econ(firm: &FirmName) -> impl FnOnce(EconError) -> TurnError + '_ {
    move |source| TurnError::Econ {
        firm: firm.to_string(),
        source,
    }
}

impl Market {
    /// Create a market with the given strategic firms plus a default background competitor.
    ///
    /// The background takes the residual share, the mean unit cost of the
    /// strategic firms and neutral quality/brand.
    pub fn new(config: MarketConfig, setups: Vec<FirmSetup>) -> Result<Self, TurnError> {
        let assigned: f64 = setups.iter().map(|s| s.market_share).sum();
        let mean_cost = if setups.is_empty() {
            1.0
        } else {
            setups.iter().map(|s| s.unit_cost).sum::<f64>() / setups.len() as f64
        };
        let background = FirmSetup::new(
            config.background_name.clone(),
            mean_cost,
            (1.0 - assigned).clamp(0.0, 1.0),
        );
        Self::with_background(config, setups, background)
    }

    /// Create a market with an explicit background setup.
    pub fn with_background(
        config: MarketConfig,
        setups: Vec<FirmSetup>,
        background: FirmSetup,
    ) -> Result<Self, TurnError> {
        validate_config(&config)?;
        let total: f64 = setups.iter().map(|s| s.market_share).sum::<f64>() + background.market_share;
        if total > 1.0 + 1e-6 {
            return Err(ValidationError::ShareSum(total).into());
        }
        let mut registry = FirmRegistry::new();
        for setup in &setups {
            registry.insert(Firm::from_setup(setup, FirmKind::Strategic, &config)?)?;
        }
        registry.insert(Firm::from_setup(&background, FirmKind::Background, &config)?)?;
        for firm in registry.iter_mut() {
            recompute_budgets(firm, 0, &config).map_err(econ(&firm.name))?;
        }
        info!(
            firms = registry.len(),
            market_size = config.market_size,
            "market created"
        );
        Ok(Self {
            market_size: config.market_size,
            config,
            registry,
            ledger: EventLedger::new(),
            schedule: ShockSchedule::default(),
            turn: 0,
            history: Vec::new(),
        })
    }

    /// Attach a shock schedule whose events are injected as their turns arrive.
    pub fn with_schedule(mut self, schedule: ShockSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn registry(&self) -> &FirmRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Number of completed turns.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Baseline market size after the last completed turn's growth.
    pub fn market_size(&self) -> f64 {
        self.market_size
    }

    /// Always `Idle` from the outside: turns are atomic.
    pub fn phase(&self) -> TurnPhase {
        TurnPhase::Idle
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.history.last()
    }

    /// Queue a shock; it is applied from the next turn on.
    pub fn inject_event(
        &mut self,
        description: impl Into<String>,
        target: impl Into<EventTarget>,
        effect_type: EffectType,
        impact_value: f64,
        duration: u32,
    ) -> Result<(), TurnError> {
        let event = Event::new(description, target, effect_type, impact_value, duration);
        if let EventTarget::Firm(name) = &event.target {
            if !self.registry.contains(name.as_str()) {
                warn!(firm = %name, "event targets unknown firm");
            }
        }
        self.ledger.inject(event)?;
        Ok(())
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            turn: self.turn,
            market_size: self.market_size,
            config: self.config.clone(),
            firms: self
                .registry
                .iter()
                .map(|f| (f.name.clone(), f.clone()))
                .collect(),
            active_events: self.ledger.active_descriptions(),
            pending_events: self.ledger.pending_descriptions(),
            last_turn: self.history.last().cloned(),
        }
    }

    /// Turn collaborator output into decisions for every strategic firm.
    ///
    /// Firms with no entry get an all-default decision; entries for unknown
    /// firms are dropped. Spend above a firm's current marketing or R&D
    /// ceiling is scaled down to it.
    pub fn resolve_decisions(
        &self,
        raw: &BTreeMap<FirmName, RawDecision>,
    ) -> BTreeMap<FirmName, DecisionRecord> {
        let mut out = self.complete_decisions(raw);
        for (name, d) in out.iter_mut() {
            let Some(firm) = self.registry.get(name.as_str()) else {
                continue;
            };
            let (bounded, clipped) =
                d.within_budget(firm.marketing_budget_ceiling, firm.rd_budget_ceiling);
            if clipped {
                warn!(
                    firm = %name,
                    marketing = d.total_marketing(),
                    marketing_ceiling = firm.marketing_budget_ceiling,
                    rd = d.total_rd(),
                    rd_ceiling = firm.rd_budget_ceiling,
                    "spend over budget; clipped"
                );
                *d = bounded;
            }
        }
        out
    }

    /// Like [`Market::resolve_decisions`] but leaves spend as declared.
    ///
    /// Used to replay recorded decisions.
    pub fn complete_decisions(
        &self,
        raw: &BTreeMap<FirmName, RawDecision>,
    ) -> BTreeMap<FirmName, DecisionRecord> {
        for name in raw.keys() {
            if !self.registry.contains(name.as_str()) {
                warn!(firm = %name, "decision for unknown firm ignored");
            }
        }
        self.registry
            .strategic()
            .map(|f| {
                let d = raw.get(&f.name).copied().unwrap_or_default();
                (f.name.clone(), d.resolve(f.unit_cost))
            })
            .collect()
    }

    /// Advance one turn with the given decisions.
    pub fn advance_turn(
        &mut self,
        decisions: &BTreeMap<FirmName, DecisionRecord>,
    ) -> Result<MarketSnapshot, TurnError> {
        self.advance_turn_scored(decisions, |_| Ok::<_, TurnError>(None))
    }

    /// Advance one turn and let `scorer` attach an error score before the record is logged.
    ///
    /// If the scorer fails the turn is discarded and the market is unchanged.
    pub fn advance_turn_scored<F, E>(
        &mut self,
        decisions: &BTreeMap<FirmName, DecisionRecord>,
        scorer: F,
    ) -> Result<MarketSnapshot, E>
    where
        F: FnOnce(&TurnRecord) -> Result<Option<TurnScore>, E>,
        E: From<TurnError>,
    {
        let (work, mut record) = self.run_turn(decisions)?;
        if let Some(score) = scorer(&record)? {
            for (name, line) in record.firms.iter_mut() {
                line.error = score.per_firm.get(name).copied();
            }
            record.aggregate_error = Some(score.aggregate);
        }
        self.commit(work, record);
        Ok(self.snapshot())
    }

    fn commit(&mut self, work: TurnWork, record: TurnRecord) {
        info!(
            turn = record.turn,
            market_size = record.market_size,
            total_share = record.total_share(),
            aggregate_error = ?record.aggregate_error,
            "turn complete"
        );
        self.turn = work.turn;
        self.registry = work.registry;
        self.ledger = work.ledger;
        self.market_size = work.base_size;
        self.history.push(record);
    }

    fn run_turn(
        &self,
        decisions: &BTreeMap<FirmName, DecisionRecord>,
    ) -> Result<(TurnWork, TurnRecord), TurnError> {
        let mut work = TurnWork {
            turn: self.turn + 1,
            phase: TurnPhase::Idle,
            registry: self.registry.clone(),
            ledger: self.ledger.clone(),
            base_size: self.market_size,
            demand: self.market_size,
            decisions: BTreeMap::new(),
            milestones: BTreeMap::new(),
            shares: BTreeMap::new(),
            settlements: BTreeMap::new(),
        };
        for name in decisions.keys() {
            if !work.registry.contains(name.as_str()) {
                warn!(turn = work.turn, firm = %name, "decision for unknown firm ignored");
            }
        }

        self.macro_adjust(&mut work)?;
        self.apply_events(&mut work)?;
        self.decay_assets(&mut work);
        self.check_solvency(&mut work, decisions)?;
        self.update_assets(&mut work)?;
        self.allocate(&mut work)?;
        self.settle_finances(&mut work)?;
        self.recompute_budgets(&mut work)?;
        work.enter(TurnPhase::Logged);
        let record = self.build_record(&work);
        work.enter(TurnPhase::Idle);
        Ok((work, record))
    }

    fn macro_adjust(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::MacroAdjust);
        work.base_size = self.market_size * (1.0 + self.config.market_growth_rate);
        let seed = self.config.rng_seed.wrapping_add(u64::from(work.turn));
        work.demand = market_size_with_noise(work.base_size, self.config.market_noise, seed)?;
        for firm in work.registry.iter_mut() {
            firm.unit_cost *= 1.0 + self.config.inflation_rate;
        }
        Ok(())
    }

    fn apply_events(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::EventApply);
        for event in self.schedule.due(work.turn) {
            work.ledger.inject(event)?;
        }
        let applied = work.ledger.apply_turn(&mut work.registry);
        if applied > 0 {
            debug!(turn = work.turn, applied, "events applied");
        }
        Ok(())
    }

    fn decay_assets(&self, work: &mut TurnWork) {
        work.enter(TurnPhase::Decay);
        for firm in work.registry.iter_mut() {
            decay(firm, &self.config);
        }
    }

    /// Mark bankrupt firms and fix this turn's effective decisions.
    fn check_solvency(
        &self,
        work: &mut TurnWork,
        decisions: &BTreeMap<FirmName, DecisionRecord>,
    ) -> Result<(), TurnError> {
        work.enter(TurnPhase::SolvencyCheck);
        let strategic_prices: Vec<f64> = work
            .registry
            .strategic()
            .filter(|f| !f.bankrupt)
            .filter_map(|f| decisions.get(&f.name).map(|d| d.price))
            .collect();
        for firm in work.registry.iter_mut() {
            if firm.is_background() {
                let d = decisions
                    .get(&firm.name)
                    .copied()
                    .unwrap_or_else(|| self.background_decision(firm, &strategic_prices));
                work.decisions.insert(firm.name.clone(), d);
                continue;
            }
            let was_bankrupt = firm.bankrupt;
            firm.bankrupt = budget::is_bankrupt(firm, &self.config).map_err(econ(&firm.name))?;
            if firm.bankrupt && !was_bankrupt {
                warn!(turn = work.turn, firm = %firm.name, capital = %firm.capital, "firm bankrupt");
            }
            if let Some(d) = decisions.get(&firm.name) {
                let d = if firm.bankrupt { d.zeroed_spend() } else { *d };
                work.decisions.insert(firm.name.clone(), d);
            }
        }
        Ok(())
    }

    /// Rule-derived decision for the background aggregate.
    fn background_decision(&self, firm: &Firm, strategic_prices: &[f64]) -> DecisionRecord {
        let price = if strategic_prices.is_empty() {
            default_price(firm.unit_cost)
        } else {
            mean_price(strategic_prices.iter().copied())
        };
        DecisionRecord {
            price,
            marketing_brand_spend: self.config.background_brand_spend,
            rd_innovation_spend: self.config.background_rd_spend,
            ..DecisionRecord::default()
        }
    }

    fn update_assets(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::AssetUpdate);
        for (name, d) in &work.decisions {
            let Some(firm) = work.registry.get_mut(name.as_str()) else {
                continue;
            };
            apply_brand_spend(firm, d.marketing_brand_spend, &self.config).map_err(econ(name))?;
            let m = apply_rd_spend(
                firm,
                d.rd_innovation_spend,
                d.rd_efficiency_spend,
                &self.config,
            )
            .map_err(econ(name))?;
            work.milestones.insert(name.clone(), m);
        }
        Ok(())
    }

    fn allocate(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::ShareAllocation);
        let contenders: BTreeMap<FirmName, Contender> = work
            .decisions
            .iter()
            .filter_map(|(name, d)| {
                let firm = work.registry.get(name.as_str())?;
                if firm.bankrupt {
                    return None;
                }
                Some((
                    name.clone(),
                    Contender {
                        price: d.price,
                        promo_spend: d.marketing_promo_spend,
                        quality: firm.product_quality,
                        brand: firm.brand_awareness,
                        background: firm.is_background(),
                    },
                ))
            })
            .collect();
        work.shares = allocate_shares(&contenders, &self.config)?;
        for firm in work.registry.iter_mut() {
            firm.market_share = work.shares.get(&firm.name).copied().unwrap_or(0.0);
        }
        Ok(())
    }

    fn settle_finances(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::FinancialSettlement);
        let window = self.config.budget_quarter_turns as usize;
        for firm in work.registry.iter_mut() {
            let s = match work.decisions.get(&firm.name) {
                Some(d) => settle(
                    work.demand,
                    firm.market_share,
                    d.price,
                    firm.unit_cost,
                    d.total_spend(),
                )
                .map_err(econ(&firm.name))?,
                None => Settlement::default(),
            };
            firm.capital = apply_profit(firm.capital, s.profit).map_err(econ(&firm.name))?;
            firm.push_profit(s.profit, window);
            if !firm.is_background() {
                let was_bankrupt = firm.bankrupt;
                firm.bankrupt =
                    budget::is_bankrupt(firm, &self.config).map_err(econ(&firm.name))?;
                if firm.bankrupt && !was_bankrupt {
                    warn!(turn = work.turn, firm = %firm.name, capital = %firm.capital, "firm bankrupt");
                }
            }
            work.settlements.insert(firm.name.clone(), s);
        }
        Ok(())
    }

    fn recompute_budgets(&self, work: &mut TurnWork) -> Result<(), TurnError> {
        work.enter(TurnPhase::BudgetRecompute);
        for firm in work.registry.iter_mut() {
            recompute_budgets(firm, work.turn, &self.config).map_err(econ(&firm.name))?;
        }
        Ok(())
    }

    fn build_record(&self, work: &TurnWork) -> TurnRecord {
        let firms = work
            .registry
            .iter()
            .map(|f| {
                let d = work.decisions.get(&f.name).copied().unwrap_or_default();
                let s = work.settlements.get(&f.name).copied().unwrap_or_default();
                let m = work.milestones.get(&f.name).copied().unwrap_or_default();
                let line = FirmTurnRecord {
                    price: d.price,
                    effective_price: effective_price(d.price, d.marketing_promo_spend, &self.config),
                    marketing_brand_spend: d.marketing_brand_spend,
                    marketing_promo_spend: d.marketing_promo_spend,
                    rd_innovation_spend: d.rd_innovation_spend,
                    rd_efficiency_spend: d.rd_efficiency_spend,
                    units_sold: s.units,
                    revenue: s.revenue,
                    profit: s.profit,
                    margin: s.margin,
                    market_share: f.market_share,
                    unit_cost: f.unit_cost,
                    product_quality: f.product_quality,
                    brand_awareness: f.brand_awareness,
                    capital: f.capital,
                    bankrupt: f.bankrupt,
                    innovation_milestones: m.innovation,
                    efficiency_milestones: m.efficiency,
                    error: None,
                };
                (f.name.clone(), line)
            })
            .collect();
        TurnRecord {
            turn: work.turn,
            market_size: work.demand,
            firms,
            aggregate_error: None,
        }
    }
}
