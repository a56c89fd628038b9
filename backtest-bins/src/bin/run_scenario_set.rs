//! Demo driver for a scenario set: reads a scenario-set config and a
//! broker-config map off disk, runs every scenario through
//! `ScenarioOrchestrator`, and prints a one-line summary per scenario.
//!
//! Grounded on the teacher's `bog-bins` binaries (init logging first,
//! build the pipeline, run it, print stats) but generalized from a
//! single hardcoded strategy run to a config-driven scenario batch —
//! real tick/bar loading and concrete strategies are out of scope for
//! this core (spec §1), so this binary supplies a synthetic tick feed
//! and a no-op strategy purely to exercise the pipeline end to end.

use anyhow::{Context, Result};
use backtest_core::broker::BrokerConfig;
use backtest_core::core::enums::OrderType;
use backtest_core::decision::DecisionLogic;
use backtest_core::market::{Bar, Tick, Timeframe};
use backtest_core::scenario::orchestrator::{ScenarioDataSource, ScenarioFactory, ScenarioOrchestrator};
use backtest_core::scenario::{ResolvedScenario, ScenarioSetConfig};
use backtest_core::testing::{FlatWorker, NoopDecisionLogic};
use backtest_core::utils::logger::init_logger;
use backtest_core::workers::Worker;
use std::collections::HashMap;
use std::path::PathBuf;

struct Args {
    scenario_set_path: PathBuf,
    brokers_path: PathBuf,
    parallel: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut parallel = false;
    for arg in std::env::args().skip(1) {
        if arg == "--parallel" {
            parallel = true;
        } else {
            positional.push(arg);
        }
    }
    if positional.len() != 2 {
        anyhow::bail!("usage: run-scenario-set <scenario-set.json> <brokers.json> [--parallel]");
    }
    Ok(Args {
        scenario_set_path: positional[0].clone().into(),
        brokers_path: positional[1].clone().into(),
        parallel,
    })
}

/// Deterministic synthetic tick feed: a slow sine-wave walk around a
/// fixed mid price, one tick per second, standing in for vendor data
/// this core never loads itself.
struct SyntheticDataSource {
    ticks_per_scenario: usize,
}

impl ScenarioDataSource for SyntheticDataSource {
    fn bar_index(&self, _symbol: &str) -> Vec<backtest_core::scenario::coverage::BarIndexEntry> {
        Vec::new()
    }

    fn load_ticks(&self, scenario: &ResolvedScenario) -> Result<Vec<Tick>, backtest_core::core::BacktestError> {
        (0..self.ticks_per_scenario)
            .map(|i| {
                let offset = (i as f64 * 0.05).sin() * 0.0010;
                let mid = 1.1000 + offset;
                Tick::new(scenario.start_time + chrono::Duration::seconds(i as i64), mid - 0.0001, mid + 0.0001)
            })
            .collect()
    }

    fn load_warmup_bars(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _before: chrono::DateTime<chrono::Utc>,
        _count: usize,
    ) -> Result<Vec<Bar>, backtest_core::core::BacktestError> {
        Ok(Vec::new())
    }
}

/// Builds the no-op worker/decision-logic pair every scenario shares,
/// standing in for the external strategy crate this core never owns.
struct NoopFactory;

impl ScenarioFactory for NoopFactory {
    fn build_workers(&self, scenario: &ResolvedScenario) -> Result<Vec<Box<dyn Worker>>, backtest_core::core::BacktestError> {
        Ok(scenario
            .strategy_config
            .worker_instances
            .keys()
            .map(|name| Box::new(FlatWorker::new(name.clone(), 0.0)) as Box<dyn Worker>)
            .collect())
    }

    fn build_decision_logic(&self, scenario: &ResolvedScenario) -> Result<Box<dyn DecisionLogic>, backtest_core::core::BacktestError> {
        Ok(Box::new(NoopDecisionLogic::new(
            scenario.strategy_config.worker_instances.clone(),
            vec![OrderType::Market],
        )))
    }
}

fn main() -> Result<()> {
    init_logger("info", false);

    let args = parse_args()?;

    let scenario_set_raw = std::fs::read_to_string(&args.scenario_set_path)
        .with_context(|| format!("reading {}", args.scenario_set_path.display()))?;
    let scenario_set: ScenarioSetConfig =
        serde_json::from_str(&scenario_set_raw).context("parsing scenario set config")?;

    let brokers_raw = std::fs::read_to_string(&args.brokers_path)
        .with_context(|| format!("reading {}", args.brokers_path.display()))?;
    let brokers: HashMap<String, BrokerConfig> =
        serde_json::from_str(&brokers_raw).context("parsing broker config map")?;

    tracing::info!(scenarios = scenario_set.scenarios.len(), "loaded scenario set");

    let orchestrator = ScenarioOrchestrator::new(brokers);
    let data_source = SyntheticDataSource { ticks_per_scenario: 500 };
    let batch = orchestrator.run_batch(&scenario_set, &data_source, &NoopFactory, args.parallel)?;

    if batch.aborted {
        tracing::error!(reason = ?batch.abort_reason, "batch aborted");
        anyhow::bail!("batch aborted: {}", batch.abort_reason.unwrap_or_default());
    }

    for result in &batch.results {
        if result.success {
            let tick_loop = result.tick_loop_result.as_ref().expect("successful result carries a tick loop result");
            println!(
                "[{}] {} -> balance={:.2} equity={:.2} sent={} executed={} rejected={} ({} ms)",
                result.scenario_index,
                result.name,
                tick_loop.final_balance,
                tick_loop.final_equity,
                tick_loop.orders_sent,
                tick_loop.orders_executed,
                tick_loop.orders_rejected,
                result.execution_time_ms,
            );
        } else {
            println!(
                "[{}] {} -> FAILED: {}",
                result.scenario_index,
                result.name,
                result.error.as_deref().unwrap_or("unknown error"),
            );
        }
    }

    Ok(())
}
