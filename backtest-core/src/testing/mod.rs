//! No-op `Worker`/`DecisionLogic`/`ScenarioDataSource` fixtures, gated
//! behind the `testing` feature so integration tests and demo binaries
//! can drive the pipeline without hand-rolling the same stubs every
//! repo's strategy crate would otherwise supply (spec §1 OUT OF SCOPE
//! "concrete indicator algorithms" / "concrete trading strategies" —
//! these exist only to exercise the contract, not to trade).

use crate::core::enums::OrderType;
use crate::core::BacktestError;
use crate::decision::{Decision, DecisionAction, DecisionLogic, TradingApi};
use crate::market::{Bar, Tick, Timeframe};
use crate::scenario::coverage::BarIndexEntry;
use crate::scenario::orchestrator::ScenarioDataSource;
use crate::scenario::ResolvedScenario;
use crate::workers::{Worker, WorkerResult, WorkerValue};
use std::collections::HashMap;

/// A worker that always reports a fixed scalar, for wiring tests that
/// don't care about indicator math.
pub struct FlatWorker {
    name: String,
    value: f64,
}

impl FlatWorker {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

impl Worker for FlatWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, _tick: &Tick, _history: &[Bar]) -> WorkerResult {
        WorkerResult {
            worker_name: self.name.clone(),
            value: WorkerValue::Scalar(self.value),
            confidence: 1.0,
            metadata: HashMap::new(),
        }
    }
}

/// A `DecisionLogic` that never trades: satisfies the contract
/// (`required_worker_instances`/`required_order_types`) but always
/// emits `DecisionAction::Flat`. Useful as the "do nothing" baseline
/// when exercising the rest of the pipeline (data prep, coverage
/// validation, tick loop profiling) in isolation from strategy logic.
pub struct NoopDecisionLogic {
    worker_instances: HashMap<String, String>,
    order_types: Vec<OrderType>,
}

impl NoopDecisionLogic {
    pub fn new(worker_instances: HashMap<String, String>, order_types: Vec<OrderType>) -> Self {
        Self { worker_instances, order_types }
    }
}

impl DecisionLogic for NoopDecisionLogic {
    fn required_worker_instances(&self) -> HashMap<String, String> {
        self.worker_instances.clone()
    }

    fn required_order_types(&self) -> Vec<OrderType> {
        self.order_types.clone()
    }

    fn compute(&mut self, tick: &Tick, _worker_results: &[WorkerResult]) -> Decision {
        Decision {
            action: DecisionAction::Flat,
            confidence: 0.0,
            reason: "noop decision logic never trades".into(),
            price: tick.mid(),
            timestamp: tick.timestamp,
        }
    }

    fn execute(&mut self, _decision: &Decision, _tick: &Tick, _api: &mut TradingApi<'_>) -> Result<(), BacktestError> {
        Ok(())
    }
}

/// An in-memory `ScenarioDataSource` over ticks and bar-index entries
/// supplied up front, for tests and demos that don't want to read real
/// vendor files off disk.
pub struct InMemoryDataSource {
    pub bar_index: HashMap<String, Vec<BarIndexEntry>>,
    pub ticks: HashMap<String, Vec<Tick>>,
    pub warmup_bars: HashMap<(String, Timeframe), Vec<Bar>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self {
            bar_index: HashMap::new(),
            ticks: HashMap::new(),
            warmup_bars: HashMap::new(),
        }
    }

    pub fn with_ticks(mut self, symbol: impl Into<String>, ticks: Vec<Tick>) -> Self {
        let symbol = symbol.into();
        self.bar_index.entry(symbol.clone()).or_insert_with(|| {
            match (ticks.first(), ticks.last()) {
                (Some(first), Some(last)) => vec![BarIndexEntry { start: first.timestamp, end: last.timestamp }],
                _ => Vec::new(),
            }
        });
        self.ticks.insert(symbol, ticks);
        self
    }

    pub fn with_warmup_bars(mut self, symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.warmup_bars.insert((symbol.into(), timeframe), bars);
        self
    }
}

impl Default for InMemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioDataSource for InMemoryDataSource {
    fn bar_index(&self, symbol: &str) -> Vec<BarIndexEntry> {
        self.bar_index.get(symbol).cloned().unwrap_or_default()
    }

    fn load_ticks(&self, scenario: &ResolvedScenario) -> Result<Vec<Tick>, BacktestError> {
        Ok(self
            .ticks
            .get(&scenario.symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.timestamp >= scenario.start_time && t.timestamp <= scenario.end_time)
            .collect())
    }

    fn load_warmup_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        _before: chrono::DateTime<chrono::Utc>,
        count: usize,
    ) -> Result<Vec<Bar>, BacktestError> {
        let mut bars = self.warmup_bars.get(&(symbol.to_string(), timeframe)).cloned().unwrap_or_default();
        if bars.len() > count {
            let drop = bars.len() - count;
            bars.drain(0..drop);
        }
        Ok(bars)
    }
}
