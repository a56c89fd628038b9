//! Indicator workers and their coordinator (spec §4.6 `WorkerCoordinator`).
//!
//! Grounded on `bog-core::strategy::mod`'s indicator-trait shape, and
//! `crossbeam::thread::scope` fan-out borrowed from
//! `bog-core::engine::simulated`'s scoped-thread usage for bounded
//! parallel work, generalized from a fixed two-indicator pair to an
//! arbitrary named set of workers gated by a measured time threshold.

use crate::market::Bar;
use crate::market::Tick;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A scalar or small map of named scalars (spec §3 `WorkerResult.value`).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerValue {
    Scalar(f64),
    Map(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub worker_name: String,
    pub value: WorkerValue,
    pub confidence: f64,
    pub metadata: HashMap<String, String>,
}

/// An indicator unit: consumes a tick plus bar history, produces one
/// `WorkerResult`. Implementations are an external concern (spec §1 OUT
/// OF SCOPE "concrete indicator algorithms"); the core only hosts the
/// trait and the coordinator that drives it.
pub trait Worker: Send {
    fn name(&self) -> &str;

    /// `history` is the closed-bar ring for this worker's configured
    /// (symbol, timeframe); immutable and shared read-only across any
    /// parallel fan-out within the same tick.
    fn process(&mut self, tick: &Tick, history: &[Bar]) -> WorkerResult;
}

/// Instance name -> worker, as declared by `ScenarioConfig.strategy_config
/// .worker_instances` and validated against
/// `DecisionLogic::required_worker_instances()` at scenario init.
pub struct WorkerCoordinator {
    workers: Vec<Box<dyn Worker>>,
    parallel_threshold: Duration,
    last_tick_work: Duration,
}

impl WorkerCoordinator {
    pub fn new(workers: Vec<Box<dyn Worker>>) -> Self {
        Self::with_threshold(workers, Duration::from_micros(1_000))
    }

    pub fn with_threshold(workers: Vec<Box<dyn Worker>>, parallel_threshold: Duration) -> Self {
        Self {
            workers,
            parallel_threshold,
            last_tick_work: Duration::ZERO,
        }
    }

    pub fn last_tick_work(&self) -> Duration {
        self.last_tick_work
    }

    /// Runs every worker against this tick's bar history and returns
    /// `(results, mode_was_parallel)`. Mode is chosen from the *previous*
    /// tick's measured work (a rolling estimate), since this tick's cost
    /// isn't known until after it runs.
    pub fn process_tick(&mut self, tick: &Tick, history: &[Bar]) -> (Vec<WorkerResult>, bool) {
        let use_parallel = self.last_tick_work > self.parallel_threshold && self.workers.len() > 1;
        let started = Instant::now();

        let results = if use_parallel {
            self.process_parallel(tick, history)
        } else {
            self.process_sequential(tick, history)
        };

        self.last_tick_work = started.elapsed();
        (results, use_parallel)
    }

    fn process_sequential(&mut self, tick: &Tick, history: &[Bar]) -> Vec<WorkerResult> {
        self.workers.iter_mut().map(|w| w.process(tick, history)).collect()
    }

    fn process_parallel(&mut self, tick: &Tick, history: &[Bar]) -> Vec<WorkerResult> {
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = self
                .workers
                .iter_mut()
                .map(|worker| scope.spawn(move |_| worker.process(tick, history)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker thread panicked"))
                .collect()
        })
        .expect("worker scope panicked")
    }
}
