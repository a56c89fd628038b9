//! The per-scenario tick-driven pipeline (spec §4.8 `TickLoop`).
//!
//! Grounded on `bog-core::engine::mod`'s tick-driven run loop shape and
//! `bog-core::utils::logger`'s structured-progress idiom, adapted to a
//! lossy `crossbeam::channel` push rather than the teacher's blocking
//! metrics server (spec §1 OUT OF SCOPE "reporting/dashboards" — the
//! core only emits the channel, never renders it).

mod profile;

pub use profile::{ProfileTable, Stage};

use crate::core::enums::OrderStatus;
use crate::execution::{ExecutionCore, OrderResult};
use crate::decision::{DecisionLogic, TradingApi};
use crate::market::{Bar, BarRenderer, Timeframe};
use crate::pending::PendingOrderStats;
use crate::portfolio::TradeRecord;
use crate::workers::WorkerCoordinator;
use crossbeam::channel::{Receiver, Sender, TrySendError};
use std::time::{Duration, Instant};

/// Status pushed onto the live-progress channel (spec §6 "Output: live
/// progress channel"). Throttled and lossy: a full channel drops the
/// update rather than blocking the tick loop.
#[derive(Debug, Clone)]
pub struct LiveProgress {
    pub scenario_index: usize,
    pub scenario_name: String,
    pub status: ScenarioStatus,
    pub ticks_processed: u64,
    pub total_ticks: Option<u64>,
    pub progress_percent: f64,
    pub current_balance: f64,
    pub total_trades: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioStatus {
    Init,
    Running,
    Completed,
    FinishedWithError,
}

/// Final summary a `TickLoop::run` assembles (spec §6 `TickLoopResult`).
#[derive(Debug, Clone)]
pub struct TickLoopResult {
    pub final_balance: f64,
    pub final_equity: f64,
    pub trade_history: Vec<TradeRecord>,
    pub order_history: Vec<OrderResult>,
    pub pending_stats: PendingOrderStats,
    pub profile: ProfileTable,
    pub orders_sent: u64,
    pub orders_executed: u64,
    pub orders_rejected: u64,
}

/// Drives exactly one scenario's ticks through
/// executor -> bar renderer -> worker coordinator -> decision logic,
/// emitting throttled progress onto a lossy channel.
pub struct TickLoop<'a> {
    scenario_index: usize,
    scenario_name: String,
    symbol: String,
    timeframes: Vec<Timeframe>,
    executor: &'a mut dyn ExecutionCore,
    bar_renderer: &'a mut BarRenderer,
    coordinator: &'a mut WorkerCoordinator,
    decision_logic: &'a mut dyn DecisionLogic,
    progress_tx: Option<Sender<LiveProgress>>,
    progress_interval: Duration,
    last_progress_emit: Option<Instant>,
    profile: ProfileTable,
}

impl<'a> TickLoop<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scenario_index: usize,
        scenario_name: impl Into<String>,
        symbol: impl Into<String>,
        timeframes: Vec<Timeframe>,
        executor: &'a mut dyn ExecutionCore,
        bar_renderer: &'a mut BarRenderer,
        coordinator: &'a mut WorkerCoordinator,
        decision_logic: &'a mut dyn DecisionLogic,
        progress_tx: Option<Sender<LiveProgress>>,
    ) -> Self {
        Self {
            scenario_index,
            scenario_name: scenario_name.into(),
            symbol: symbol.into(),
            timeframes,
            executor,
            bar_renderer,
            coordinator,
            decision_logic,
            progress_tx,
            progress_interval: Duration::from_millis(250),
            last_progress_emit: None,
            profile: ProfileTable::new(),
        }
    }

    /// Runs the scenario to completion over `ticks`, one call to
    /// `on_tick` per element, in order.
    pub fn run(
        mut self,
        ticks: impl IntoIterator<Item = crate::market::Tick>,
        total_ticks: Option<u64>,
    ) -> Result<TickLoopResult, crate::core::BacktestError> {
        self.emit_progress(0, total_ticks, ScenarioStatus::Init);

        let mut tick_index = 0u64;
        let mut last_tick = None;
        for tick in ticks {
            self.step(tick, tick_index)?;
            last_tick = Some(tick);
            tick_index += 1;
            self.emit_progress(tick_index, total_ticks, ScenarioStatus::Running);
        }

        if let Some(tick) = last_tick {
            self.executor.close_all_remaining_orders(&tick, tick_index);
        }

        self.emit_progress(tick_index, total_ticks, ScenarioStatus::Completed);
        Ok(self.assemble_result())
    }

    fn step(&mut self, tick: crate::market::Tick, tick_index: u64) -> Result<(), crate::core::BacktestError> {
        let t0 = Instant::now();
        self.executor.on_tick(tick, tick_index)?;
        self.profile.record(Stage::Executor, t0.elapsed());

        let t1 = Instant::now();
        let mut closed_bars = Vec::new();
        for timeframe in &self.timeframes {
            closed_bars.extend(self.bar_renderer.process_tick(&self.symbol, *timeframe, &tick));
        }
        self.profile.record(Stage::Bars, t1.elapsed());

        let t2 = Instant::now();
        let history: Vec<Bar> = self
            .timeframes
            .first()
            .map(|tf| self.bar_renderer.history(&self.symbol, *tf))
            .unwrap_or_default();
        let (worker_results, _was_parallel) = self.coordinator.process_tick(&tick, &history);
        self.profile.record(Stage::Workers, t2.elapsed());

        let t3 = Instant::now();
        let decision = self.decision_logic.compute(&tick, &worker_results);
        self.profile.record(Stage::DecisionCompute, t3.elapsed());

        let t4 = Instant::now();
        let mut api = TradingApi::new(self.executor);
        self.decision_logic.execute(&decision, &tick, &mut api)?;
        self.profile.record(Stage::DecisionExecute, t4.elapsed());

        Ok(())
    }

    fn emit_progress(&mut self, ticks_processed: u64, total_ticks: Option<u64>, status: ScenarioStatus) {
        let now = Instant::now();
        let should_emit = status != ScenarioStatus::Running
            || self.last_progress_emit.map_or(true, |last| now.duration_since(last) >= self.progress_interval);
        if !should_emit {
            return;
        }
        self.last_progress_emit = Some(now);

        let Some(tx) = &self.progress_tx else { return };
        let progress_percent = total_ticks
            .filter(|t| *t > 0)
            .map(|t| ticks_processed as f64 / t as f64 * 100.0)
            .unwrap_or(0.0);
        let progress = LiveProgress {
            scenario_index: self.scenario_index,
            scenario_name: self.scenario_name.clone(),
            status,
            ticks_processed,
            total_ticks,
            progress_percent,
            current_balance: self.executor.balance(),
            total_trades: self.executor.trade_history().len() as u64,
        };
        // Lossy, non-blocking: a full channel means the orchestrator is
        // behind and this update is simply dropped (spec §5 "Suspension
        // points").
        match tx.try_send(progress) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn assemble_result(&self) -> TickLoopResult {
        let order_history = self.executor.order_history().to_vec();
        let orders_sent = order_history.len() as u64;
        let orders_executed = order_history.iter().filter(|r| r.status == OrderStatus::Executed).count() as u64;
        let orders_rejected = order_history.iter().filter(|r| r.status == OrderStatus::Rejected).count() as u64;
        TickLoopResult {
            final_balance: self.executor.balance(),
            final_equity: self.executor.equity(),
            trade_history: self.executor.trade_history().iter().cloned().collect(),
            order_history,
            pending_stats: self.executor.pending_stats().clone(),
            profile: self.profile.clone(),
            orders_sent,
            orders_executed,
            orders_rejected,
        }
    }
}

/// Bounded, lossy progress channel (spec §6 "live progress channel").
pub fn progress_channel(capacity: usize) -> (Sender<LiveProgress>, Receiver<LiveProgress>) {
    crossbeam::channel::bounded(capacity)
}
