//! Phases 0 through 2 of the scenario batch (spec §4.9 `Scenario
//! Orchestrator`).
//!
//! Grounded on `bog-core::execution::journal`'s background-thread
//! ownership pattern (one independent worker per unit of work, no shared
//! mutable state) generalized from a single execution journal thread to
//! a pool of per-scenario worker threads, and on
//! `bog-core::engine::gap_recovery` for the coverage-report shape
//! consumed here. Real OS-process isolation (spec §5 "preferred") needs
//! a host binary that can fork and an IPC transport; this core owns the
//! phase contract and the thread-parallel backend a host binary can call
//! directly, leaving process-level dispatch to that binary (documented
//! in DESIGN.md).

use super::coverage::{BarIndexEntry, CoverageCache};
use super::{ResolvedScenario, ScenarioSetConfig};
use crate::broker::BrokerConfig;
use crate::core::enums::GapCategory;
use crate::core::BacktestError;
use crate::decision::DecisionLogic;
use crate::execution::{ExecutionCore, SimulationExecutor, StressConfig};
use crate::market::{Bar, BarRenderer, Tick, Timeframe};
use crate::pending::LatencySimulator;
use crate::portfolio::PortfolioManager;
use crate::tickloop::{progress_channel, LiveProgress, TickLoop, TickLoopResult};
use crate::workers::{Worker, WorkerCoordinator};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// External data layer the orchestrator reads through; the core treats
/// tick/bar loading as an out-of-scope collaborator (spec §1 OUT OF
/// SCOPE "tick import from vendor JSON") and only specifies this
/// contract.
pub trait ScenarioDataSource: Send + Sync {
    fn bar_index(&self, symbol: &str) -> Vec<BarIndexEntry>;
    fn load_ticks(&self, scenario: &ResolvedScenario) -> Result<Vec<Tick>, BacktestError>;
    fn load_warmup_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        before: chrono::DateTime<chrono::Utc>,
        count: usize,
    ) -> Result<Vec<Bar>, BacktestError>;
}

/// Builds the per-scenario worker/decision-logic instances; each
/// scenario worker constructs its own, never shared across workers
/// (spec §4.9 Phase 2 step 2).
pub trait ScenarioFactory: Send + Sync {
    fn build_workers(&self, scenario: &ResolvedScenario) -> Result<Vec<Box<dyn Worker>>, BacktestError>;
    fn build_decision_logic(&self, scenario: &ResolvedScenario) -> Result<Box<dyn DecisionLogic>, BacktestError>;
}

/// Phase 1.5 outcome for one scenario: invalid scenarios are *not*
/// removed, only skipped at Phase 2 (spec §4.9 Phase 1.5).
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub scenario_index: usize,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Per-scenario result (spec §6 "Output: batch result" `ProcessResult`).
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub success: bool,
    pub name: String,
    pub symbol: String,
    pub scenario_index: usize,
    pub execution_time_ms: u64,
    pub tick_loop_result: Option<TickLoopResult>,
    pub error: Option<String>,
    pub log_buffer: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub results: Vec<ProcessResult>,
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

/// Which gap categories a tick stretch may legally contain; standard
/// mode allows only the two tightest categories (spec §4.9 Phase 1.5b).
const DEFAULT_ALLOWED_GAPS: [GapCategory; 2] = [GapCategory::Seamless, GapCategory::Short];

pub struct ScenarioOrchestrator {
    brokers: HashMap<String, BrokerConfig>,
    coverage: CoverageCache,
}

impl ScenarioOrchestrator {
    pub fn new(brokers: HashMap<String, BrokerConfig>) -> Self {
        Self { brokers, coverage: CoverageCache::new() }
    }

    /// Phase 0: resolves the config cascade and reports the per-symbol
    /// (timeframes, warmup_bars) requirement, deduplicated.
    pub fn collect_requirements(&self, resolved: &[ResolvedScenario]) -> HashMap<String, (Vec<Timeframe>, usize)> {
        let mut requirements: HashMap<String, (Vec<Timeframe>, usize)> = HashMap::new();
        for scenario in resolved {
            let entry = requirements.entry(scenario.symbol.clone()).or_insert_with(|| (Vec::new(), 0));
            for tf in scenario.strategy_config.timeframes() {
                if !entry.0.contains(&tf) {
                    entry.0.push(tf);
                }
            }
            entry.1 = entry.1.max(scenario.execution_config.warmup_bars);
        }
        requirements
    }

    /// Phase 0.5: one coverage report per unique symbol.
    pub fn coverage_reports(
        &self,
        data_source: &dyn ScenarioDataSource,
        symbols: impl IntoIterator<Item = String>,
    ) -> HashMap<String, super::coverage::CoverageReport> {
        symbols
            .into_iter()
            .map(|symbol| {
                let index = data_source.bar_index(&symbol);
                let report = self.coverage.get_or_compute(&symbol, &index);
                (symbol, report)
            })
            .collect()
    }

    /// Phase 1.5: validates one scenario's prepared data against its
    /// coverage report (spec §4.9 Phase 1.5 (a)-(c)).
    pub fn validate_scenario(
        scenario: &ResolvedScenario,
        coverage: &super::coverage::CoverageReport,
        warmup_bars: &[Bar],
    ) -> ValidationOutcome {
        let mut errors = Vec::new();

        if let Some(gap) = coverage.gap_containing(scenario.start_time) {
            errors.push(format!("start_time falls inside a {:?} gap", gap.category));
        }

        if let Some(gap) = coverage.forbidden_gap(scenario.start_time, scenario.end_time, &DEFAULT_ALLOWED_GAPS) {
            errors.push(format!("tick stretch contains a forbidden {:?} gap", gap.category));
        }

        if scenario.data_mode == crate::core::enums::DataMode::Clean
            && warmup_bars.iter().any(|b| b.bar_type.is_synthetic())
        {
            errors.push("warmup bars contain synthetic bars in clean (standard) mode".into());
        }

        ValidationOutcome { scenario_index: scenario.index, valid: errors.is_empty(), errors }
    }

    /// Phase 2: dispatches every valid scenario to its own worker
    /// (thread-per-scenario; see module docs on process-parallel scope).
    /// `parallel` selects the thread-pool fan-out vs strictly sequential
    /// execution — the debugger-attached/process-vs-thread policy named
    /// in spec §4.9 belongs to the host binary that owns process
    /// spawning, so it is surfaced here as a plain boolean the caller
    /// decides. Aborts the whole batch only if every scenario failed
    /// Phase 1.5 validation (spec §4.9 "Abort policy").
    pub fn run_batch(
        &self,
        config: &ScenarioSetConfig,
        data_source: &dyn ScenarioDataSource,
        factory: &dyn ScenarioFactory,
        parallel: bool,
    ) -> Result<BatchResult, BacktestError> {
        let resolved = config.resolve()?;
        let requirements = self.collect_requirements(&resolved);
        let symbols: Vec<String> = requirements.keys().cloned().collect();
        let coverage_by_symbol = self.coverage_reports(data_source, symbols);

        let mut jobs = Vec::new();
        for scenario in resolved {
            let coverage = coverage_by_symbol.get(&scenario.symbol).cloned().unwrap_or_else(|| {
                super::coverage::CoverageReport::compute(scenario.symbol.clone(), &[])
            });
            let (timeframes, _) = requirements.get(&scenario.symbol).cloned().unwrap_or_default();
            let warmup = timeframes
                .first()
                .copied()
                .map(|tf| {
                    data_source
                        .load_warmup_bars(&scenario.symbol, tf, scenario.start_time, scenario.execution_config.warmup_bars)
                })
                .transpose()?
                .unwrap_or_default();

            let outcome = Self::validate_scenario(&scenario, &coverage, &warmup);
            jobs.push((scenario, outcome, warmup));
        }

        if jobs.iter().all(|(_, outcome, _)| !outcome.valid) {
            return Ok(BatchResult {
                results: Vec::new(),
                aborted: true,
                abort_reason: Some("every scenario failed Phase 1.5 validation".into()),
            });
        }

        let results = if parallel {
            self.run_parallel(jobs, data_source, factory)
        } else {
            self.run_sequential(jobs, data_source, factory)
        };

        Ok(BatchResult { results, aborted: false, abort_reason: None })
    }

    fn run_sequential(
        &self,
        jobs: Vec<(ResolvedScenario, ValidationOutcome, Vec<Bar>)>,
        data_source: &dyn ScenarioDataSource,
        factory: &dyn ScenarioFactory,
    ) -> Vec<ProcessResult> {
        jobs.into_iter().map(|job| self.run_one(job, data_source, factory)).collect()
    }

    fn run_parallel(
        &self,
        jobs: Vec<(ResolvedScenario, ValidationOutcome, Vec<Bar>)>,
        data_source: &dyn ScenarioDataSource,
        factory: &dyn ScenarioFactory,
    ) -> Vec<ProcessResult> {
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| scope.spawn(move |_| self.run_one(job, data_source, factory)))
                .collect();
            handles.into_iter().map(|h| h.join().expect("scenario worker panicked")).collect()
        })
        .expect("scenario worker scope panicked")
    }

    fn run_one(
        &self,
        (scenario, outcome, warmup_bars): (ResolvedScenario, ValidationOutcome, Vec<Bar>),
        data_source: &dyn ScenarioDataSource,
        factory: &dyn ScenarioFactory,
    ) -> ProcessResult {
        let started = Instant::now();
        if !outcome.valid {
            return ProcessResult {
                success: false,
                name: scenario.name.clone(),
                symbol: scenario.symbol.clone(),
                scenario_index: scenario.index,
                execution_time_ms: 0,
                tick_loop_result: None,
                error: Some(outcome.errors.join("; ")),
                log_buffer: Vec::new(),
            };
        }

        let (outcome, log_buffer) =
            crate::utils::log_capture::capture(|| self.run_scenario(&scenario, &warmup_bars, data_source, factory));

        match outcome {
            Ok(tick_loop_result) => {
                info!(scenario = %scenario.name, "scenario completed");
                ProcessResult {
                    success: true,
                    name: scenario.name.clone(),
                    symbol: scenario.symbol.clone(),
                    scenario_index: scenario.index,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    tick_loop_result: Some(tick_loop_result),
                    error: None,
                    log_buffer,
                }
            }
            Err(err) => {
                error!(scenario = %scenario.name, error = %err, "scenario failed");
                ProcessResult {
                    success: false,
                    name: scenario.name.clone(),
                    symbol: scenario.symbol.clone(),
                    scenario_index: scenario.index,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    tick_loop_result: None,
                    error: Some(err.to_string()),
                    log_buffer,
                }
            }
        }
    }

    fn run_scenario(
        &self,
        scenario: &ResolvedScenario,
        warmup_bars: &[Bar],
        data_source: &dyn ScenarioDataSource,
        factory: &dyn ScenarioFactory,
    ) -> Result<TickLoopResult, BacktestError> {
        let broker = self
            .brokers
            .get(&scenario.trade_simulator_config.broker_config_ref)
            .ok_or_else(|| {
                BacktestError::InvalidConfig(format!(
                    "unknown broker_config_ref: {}",
                    scenario.trade_simulator_config.broker_config_ref
                ))
            })?
            .clone();
        broker.validate()?;

        let portfolio = PortfolioManager::new(
            scenario.trade_simulator_config.initial_balance,
            scenario.trade_simulator_config.currency.clone(),
        );
        let latency = LatencySimulator::new(
            scenario.trade_simulator_config.seeds.api_latency_seed,
            scenario.trade_simulator_config.seeds.market_execution_seed,
            scenario.trade_simulator_config.api_latency_range,
            scenario.trade_simulator_config.market_execution_range,
        );
        let stress = scenario.stress_test_config.as_ref().map(|cfg| {
            StressConfig::new(cfg.reject_open_order.enabled, cfg.reject_open_order.seed, cfg.reject_open_order.probability)
        });

        let mut executor = SimulationExecutor::new(scenario.symbol.clone(), broker, portfolio, latency, stress);

        let mut bar_renderer = BarRenderer::default();
        let timeframes = scenario.strategy_config.timeframes();
        for tf in &timeframes {
            bar_renderer.seed_history(&scenario.symbol, *tf, warmup_bars.iter().copied());
        }

        let workers = factory.build_workers(scenario)?;
        let mut coordinator = WorkerCoordinator::with_threshold(
            workers,
            Duration::from_secs_f64(scenario.execution_config.worker_parallel_threshold_ms / 1000.0),
        );

        let mut decision_logic = factory.build_decision_logic(scenario)?;
        crate::decision::validate_contract(
            decision_logic.as_ref(),
            &scenario.strategy_config.worker_instances,
            &declared_order_types(),
        )?;

        let ticks = data_source.load_ticks(scenario)?;
        let total_ticks = scenario.max_ticks.unwrap_or(ticks.len() as u64).min(ticks.len() as u64);
        let ticks_iter = ticks.into_iter().take(total_ticks as usize);

        let (tx, _rx) = progress_channel(16);
        let tick_loop = TickLoop::new(
            scenario.index,
            scenario.name.clone(),
            scenario.symbol.clone(),
            timeframes,
            &mut executor as &mut dyn ExecutionCore,
            &mut bar_renderer,
            &mut coordinator,
            decision_logic.as_mut(),
            Some(tx),
        );

        let result = tick_loop.run(ticks_iter, Some(total_ticks))?;
        debug_assert_eq!(result.orders_sent, result.orders_executed + result.orders_rejected, "orders_sent invariant");
        Ok(result)
    }
}

/// All order types the executor's `open_order` can currently dispatch;
/// every `DecisionLogic` using an order type outside this list fails
/// contract validation (spec §4.7).
fn declared_order_types() -> Vec<crate::core::enums::OrderType> {
    use crate::core::enums::OrderType::*;
    vec![Market, Limit, Stop, StopLimit]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerInfo, FeeModel, FeeStructure, SymbolSpec};
    use crate::decision::{Decision, DecisionAction, TradingApi};
    use crate::market::Tick;
    use crate::workers::WorkerResult;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn broker() -> BrokerConfig {
        BrokerConfig {
            broker_info: BrokerInfo {
                company: "Test".into(),
                server: "test".into(),
                trade_mode: "demo".into(),
                leverage: 100.0,
                hedging_allowed: true,
                margin_mode: Some("hedged".into()),
                margin_call_level: None,
                stopout_level: None,
            },
            fee_structure: FeeStructure { model: FeeModel::Spread, maker_fee: None, taker_fee: None },
            symbols: HashMap::from([(
                "EURUSD".to_string(),
                SymbolSpec {
                    volume_min: 0.01,
                    volume_max: 100.0,
                    volume_step: 0.01,
                    contract_size: 100_000.0,
                    tick_size: 0.0001,
                    digits: 4,
                    base_currency: Some("EUR".into()),
                    quote_currency: Some("USD".into()),
                    swap_long: None,
                    swap_short: None,
                    conversion_rate: None,
                },
            )]),
        }
    }

    fn sample_config() -> ScenarioSetConfig {
        use super::super::*;
        ScenarioSetConfig {
            version: "1".into(),
            scenario_set_name: "orchestrator-test".into(),
            global: GlobalConfig {
                strategy_config: StrategyConfig {
                    decision_logic_type: "stub".into(),
                    worker_instances: HashMap::from([("fast_ma".to_string(), "moving_average".to_string())]),
                    workers: HashMap::new(),
                    decision_logic_config: HashMap::new(),
                    timeframes: vec![60],
                },
                execution_config: ExecutionConfig {
                    parallel_workers: 1,
                    worker_parallel_threshold_ms: 1.0,
                    strict_parameter_validation: false,
                    warmup_bars: 0,
                },
                trade_simulator_config: TradeSimulatorConfig {
                    broker_config_ref: "demo".into(),
                    initial_balance: 100_000.0,
                    currency: "USD".into(),
                    seeds: Seeds { api_latency_seed: 1, market_execution_seed: 2 },
                    api_latency_range: (1, 1),
                    market_execution_range: (1, 1),
                },
                stress_test_config: None,
            },
            scenarios: vec![ScenarioDef {
                name: "s1".into(),
                symbol: "EURUSD".into(),
                start_time: Utc.timestamp_opt(0, 0).single().unwrap(),
                end_time: Utc.timestamp_opt(600, 0).single().unwrap(),
                max_ticks: None,
                data_mode: crate::core::enums::DataMode::Clean,
                overrides: ScenarioOverrides::default(),
            }],
        }
    }

    struct FixedDataSource;

    impl ScenarioDataSource for FixedDataSource {
        fn bar_index(&self, _symbol: &str) -> Vec<BarIndexEntry> {
            vec![BarIndexEntry { start: Utc.timestamp_opt(0, 0).single().unwrap(), end: Utc.timestamp_opt(600, 0).single().unwrap() }]
        }

        fn load_ticks(&self, scenario: &ResolvedScenario) -> Result<Vec<Tick>, BacktestError> {
            Ok((0..10)
                .map(|i| Tick::new(scenario.start_time + chrono::Duration::seconds(i * 10), 1.10, 1.1002).unwrap())
                .collect())
        }

        fn load_warmup_bars(&self, _symbol: &str, _timeframe: Timeframe, _before: chrono::DateTime<chrono::Utc>, _count: usize) -> Result<Vec<Bar>, BacktestError> {
            Ok(Vec::new())
        }
    }

    struct GappyDataSource;

    impl ScenarioDataSource for GappyDataSource {
        fn bar_index(&self, _symbol: &str) -> Vec<BarIndexEntry> {
            vec![
                BarIndexEntry { start: Utc.timestamp_opt(0, 0).single().unwrap(), end: Utc.timestamp_opt(600, 0).single().unwrap() },
                BarIndexEntry {
                    start: Utc.timestamp_opt(600, 0).single().unwrap() + chrono::Duration::hours(5),
                    end: Utc.timestamp_opt(1200, 0).single().unwrap() + chrono::Duration::hours(5),
                },
            ]
        }

        fn load_ticks(&self, scenario: &ResolvedScenario) -> Result<Vec<Tick>, BacktestError> {
            Ok((0..10)
                .map(|i| Tick::new(scenario.start_time + chrono::Duration::seconds(i * 10), 1.10, 1.1002).unwrap())
                .collect())
        }

        fn load_warmup_bars(&self, _symbol: &str, _timeframe: Timeframe, _before: chrono::DateTime<chrono::Utc>, _count: usize) -> Result<Vec<Bar>, BacktestError> {
            Ok(Vec::new())
        }
    }

    struct StubWorker;
    impl Worker for StubWorker {
        fn name(&self) -> &str {
            "fast_ma"
        }
        fn process(&mut self, _tick: &Tick, _history: &[Bar]) -> WorkerResult {
            WorkerResult { worker_name: "fast_ma".into(), value: crate::workers::WorkerValue::Scalar(0.0), confidence: 1.0, metadata: HashMap::new() }
        }
    }

    struct StubLogic {
        computed: Mutex<u32>,
    }
    impl DecisionLogic for StubLogic {
        fn required_worker_instances(&self) -> HashMap<String, String> {
            HashMap::from([("fast_ma".to_string(), "moving_average".to_string())])
        }
        fn required_order_types(&self) -> Vec<crate::core::enums::OrderType> {
            vec![crate::core::enums::OrderType::Market]
        }
        fn compute(&mut self, tick: &Tick, _worker_results: &[WorkerResult]) -> Decision {
            *self.computed.lock().unwrap() += 1;
            Decision { action: DecisionAction::Flat, confidence: 0.0, reason: "noop".into(), price: tick.mid(), timestamp: tick.timestamp }
        }
        fn execute(&mut self, _decision: &Decision, _tick: &Tick, _api: &mut TradingApi<'_>) -> Result<(), BacktestError> {
            Ok(())
        }
    }

    struct StubFactory;
    impl ScenarioFactory for StubFactory {
        fn build_workers(&self, _scenario: &ResolvedScenario) -> Result<Vec<Box<dyn Worker>>, BacktestError> {
            Ok(vec![Box::new(StubWorker)])
        }
        fn build_decision_logic(&self, _scenario: &ResolvedScenario) -> Result<Box<dyn DecisionLogic>, BacktestError> {
            Ok(Box::new(StubLogic { computed: Mutex::new(0) }))
        }
    }

    #[test]
    fn batch_runs_a_single_valid_scenario_sequentially() {
        let orchestrator = ScenarioOrchestrator::new(HashMap::from([("demo".to_string(), broker())]));
        let config = sample_config();
        let batch = orchestrator.run_batch(&config, &FixedDataSource, &StubFactory, false).unwrap();
        assert!(!batch.aborted);
        assert_eq!(batch.results.len(), 1);
        assert!(batch.results[0].success);
        let tick_loop = batch.results[0].tick_loop_result.as_ref().unwrap();
        assert_eq!(tick_loop.orders_sent, tick_loop.orders_executed + tick_loop.orders_rejected);
    }

    #[test]
    fn batch_aborts_only_when_every_scenario_invalid() {
        let orchestrator = ScenarioOrchestrator::new(HashMap::from([("demo".to_string(), broker())]));
        let mut config = sample_config();
        // Spans the 5-hour LARGE gap GappyDataSource reports between its
        // two index entries, which falls outside the default allow-list.
        config.scenarios[0].start_time = Utc.timestamp_opt(0, 0).single().unwrap();
        config.scenarios[0].end_time = Utc.timestamp_opt(1200, 0).single().unwrap() + chrono::Duration::hours(5);
        let batch = orchestrator.run_batch(&config, &GappyDataSource, &StubFactory, false).unwrap();
        assert!(batch.aborted);
    }

    #[test]
    fn unknown_broker_ref_surfaces_as_scenario_error_not_panic() {
        let orchestrator = ScenarioOrchestrator::new(HashMap::new());
        let config = sample_config();
        let batch = orchestrator.run_batch(&config, &FixedDataSource, &StubFactory, false).unwrap();
        assert!(!batch.results[0].success);
        assert!(batch.results[0].error.is_some());
    }
}
