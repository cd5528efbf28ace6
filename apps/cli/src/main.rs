#![deny(warnings)]

//! Headless CLI: scripted stress scenarios, benchmark replay and auto-tuning.

use anyhow::{anyhow, bail, Context, Result};
use sim_calibrate::{auto_tune, run_suite, BenchmarkOptions, CancelToken, SearchSpace};
use sim_core::{FirmSetup, MarketConfig, RawDecision};
use sim_events::ShockSchedule;
use sim_runtime::{gather_decisions, Market};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  market-cli run --scenario price-war|marketing-war [--turns N] [--config F] [--shocks F] [--out F]
  market-cli benchmark --scenario F|DIR [--config F] [--out F]
  market-cli tune --scenario F|DIR [--space F] [--config F] [--max-seconds N] [--out F]

A DIR scenario loads every .json/.yaml file in it as one suite.";

const DECISION_TIMEOUT: Duration = Duration::from_millis(500);

struct Args {
    command: String,
    flags: HashMap<String, String>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut it = std::env::args().skip(1);
        let command = it.next().ok_or_else(|| anyhow!(USAGE))?;
        let mut flags = HashMap::new();
        while let Some(arg) = it.next() {
            let Some(key) = arg.strip_prefix("--") else {
                bail!("unexpected argument {arg}\n{USAGE}");
            };
            let value = it
                .next()
                .ok_or_else(|| anyhow!("--{key} needs a value"))?;
            flags.insert(key.to_string(), value);
        }
        Ok(Self { command, flags })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(String::as_str)
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| anyhow!("--{key} is required\n{USAGE}"))
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|v| v.parse().map_err(|_| anyhow!("--{key}: not a number: {v}")))
            .transpose()
    }
}

fn load_config(args: &Args) -> Result<MarketConfig> {
    match args.path("config") {
        Some(p) => persistence::load_config(&p).with_context(|| format!("loading {}", p.display())),
        None => Ok(MarketConfig::default()),
    }
}

/// Scripted two-firm stress scenarios.
#[derive(Clone, Copy, Debug)]
enum Stress {
    /// Both firms cut price 4% every turn with minimal marketing.
    PriceWar,
    /// A ramps brand spend every turn while B holds steady. Spend past a
    /// firm's ceiling is clipped when decisions are resolved.
    MarketingWar,
}

impl Stress {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "price-war" => Ok(Stress::PriceWar),
            "marketing-war" => Ok(Stress::MarketingWar),
            other => bail!("unknown stress scenario {other}"),
        }
    }

    fn decision(self, firm: &str, turn: u32) -> RawDecision {
        let t = f64::from(turn);
        let (price, brand) = match (self, firm) {
            (Stress::PriceWar, _) => (10_000.0 * 0.96f64.powf(t), 10_000.0),
            (Stress::MarketingWar, "A") => (10_000.0, 1_000.0 + 700_000.0 * t),
            (Stress::MarketingWar, _) => (10_000.0, 100_000.0),
        };
        RawDecision {
            price: Some(price),
            marketing_brand_spend: Some(brand),
            ..RawDecision::default()
        }
    }
}

fn run_stress(args: &Args) -> Result<()> {
    let stress = Stress::parse(args.require("scenario")?)?;
    let turns: u32 = args.number("turns")?.unwrap_or(30);
    let config = load_config(args)?;
    let mut market = Market::new(
        config,
        vec![
            FirmSetup::new("A", 8_500.0, 0.4),
            FirmSetup::new("B", 9_000.0, 0.4),
        ],
    )?;
    if let Some(p) = args.path("shocks") {
        market = market.with_schedule(ShockSchedule::load(&p)?);
    }
    info!(?stress, turns, "stress run starting");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let mut negative_from: Option<u32> = None;
    for _ in 0..turns {
        let turn = market.turn() + 1;
        let firms = market.registry().strategic_names();
        let raw = rt.block_on(gather_decisions(firms, DECISION_TIMEOUT, move |name| async move {
            Ok::<_, anyhow::Error>(stress.decision(name.as_str(), turn))
        }));
        let decisions = market.resolve_decisions(&raw);
        let snap = market.advance_turn(&decisions)?;
        let Some(rec) = snap.last_turn.as_ref() else {
            continue;
        };
        let line: Vec<String> = rec
            .firms
            .iter()
            .map(|(name, f)| format!("{name}: share {:.1}% profit {:.0}", f.market_share * 100.0, f.profit))
            .collect();
        println!("turn {:>3} | {}", rec.turn, line.join(" | "));
        if let Some(a) = rec.firm("A") {
            if a.profit < 0.0 && negative_from.is_none() {
                negative_from = Some(rec.turn);
            }
        }
    }
    match negative_from {
        Some(t) => println!("A's profit first turned negative on turn {t}"),
        None => println!("A stayed profitable for all {turns} turns"),
    }
    if let Some(p) = args.path("out") {
        persistence::write_history_json(&p, market.history())?;
    }
    Ok(())
}

fn run_benchmark(args: &Args) -> Result<()> {
    let scenarios = persistence::load_scenarios(Path::new(args.require("scenario")?))?;
    let config = load_config(args)?;
    let suite = run_suite(&config, &scenarios, &BenchmarkOptions::default())?;
    for report in &suite.reports {
        for (i, err) in report.per_turn.iter().enumerate() {
            println!("{} | turn {:>3} | error {:.4}", report.scenario_name, i + 1, err);
        }
        println!("{} | mean error {:.4}", report.scenario_name, report.mean_error);
    }
    if suite.reports.len() > 1 {
        println!(
            "suite of {} scenarios | mean error {:.4}",
            suite.reports.len(),
            suite.mean_error
        );
    }
    if let Some(p) = args.path("out") {
        persistence::write_json(&p, &suite)?;
    }
    Ok(())
}

fn run_tune(args: &Args) -> Result<()> {
    let scenarios = persistence::load_scenarios(Path::new(args.require("scenario")?))?;
    let config = load_config(args)?;
    let space = match args.path("space") {
        Some(p) => persistence::load_search_space(&p)?,
        None => SearchSpace::default(),
    };
    let cancel = CancelToken::new();
    if let Some(secs) = args.number::<u64>("max-seconds")? {
        let token = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            token.cancel();
        });
    }
    info!(grid = space.size(), scenarios = scenarios.len(), "tuning");
    let result = auto_tune(&config, &space, &scenarios, &BenchmarkOptions::default(), &cancel)?;
    if result.cancelled {
        warn!(evaluated = result.evaluated, "search stopped early; best so far");
    }
    println!("{}", serde_json::to_string_pretty(&result.best_parameters)?);
    println!(
        "best error {:.4} | evaluated {} | skipped {} | filtered {}",
        result.best_error, result.evaluated, result.skipped, result.filtered
    );
    if let Some(p) = args.path("out") {
        persistence::write_json(&p, &result)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse()?;
    match args.command.as_str() {
        "run" => run_stress(&args),
        "benchmark" => run_benchmark(&args),
        "tune" => run_tune(&args),
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}
