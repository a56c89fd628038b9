//! The shared fill/close/margin/fee engine (spec §4.4): the pipeline
//! that turns a resolved pending order into a portfolio mutation.
//!
//! Grounded on `bog-core::engine::simulated::SimulatedExecutor`'s
//! tick-entry-point shape and `bog-core::execution::production`'s
//! `ExecutionMetrics`/journal-entry idiom for outcome accounting,
//! generalized from a single-symbol order-book matcher to the
//! three-phase latency/limit/stop pipeline this spec describes. One
//! code path (`ExecutionCore`) is meant to serve both simulation and a
//! future live executor; only `SimulationExecutor` is built here (spec
//! §1 OUT OF SCOPE "broker adapters for live trading").

mod stress;

pub use stress::StressConfig;

use crate::broker::{BrokerConfig, FeeModel, SymbolSpec};
use crate::core::enums::{Direction, FillType, OrderAction, OrderStatus, OrderType, PendingOutcome, RejectionReason};
use crate::core::ids::{OrderId, OrderIdAllocator, PositionId};
use crate::core::BacktestError;
use crate::market::Tick;
use crate::pending::{LatencySimulator, PendingOrder, PendingOrderManager};
use crate::portfolio::{OpenRequest, Position, PortfolioManager, TradeRecord};
use tracing::warn;

/// Fill metadata attached to an executed order (spec §3 `OrderResult`).
#[derive(Debug, Clone, Default)]
pub struct FillMetadata {
    pub fill_type: Option<FillType>,
    pub from_stop_limit: bool,
    pub comment: Option<String>,
}

/// Outcome of a single order, appended to `order_history` on every
/// fill, rejection and timeout; never mutated afterward.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub rejection_reason: Option<RejectionReason>,
    pub executed_price: Option<f64>,
    pub metadata: FillMetadata,
}

/// Tri-state sentinel for modification APIs: `Keep` leaves the field
/// untouched, `Clear` sets it to `None`, `Set(v)` assigns a new value
/// (spec §4.4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentinel<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Sentinel<T> {
    fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Sentinel::Keep => current,
            Sentinel::Clear => None,
            Sentinel::Set(v) => Some(v),
        }
    }
}

/// Behavior shared by every executor implementation (spec §2
/// `ExecutionCore (abstract)`). Only `SimulationExecutor` is provided;
/// the trait exists so `TickLoop` and `DecisionLogic::execute` depend
/// on a narrow contract rather than the simulation concretely.
pub trait ExecutionCore {
    fn on_tick(&mut self, tick: Tick, tick_index: u64) -> Result<(), BacktestError>;
    fn open_order(
        &mut self,
        order_type: OrderType,
        direction: Direction,
        lots: f64,
        limit_or_stop_price: Option<f64>,
        stop_price: Option<f64>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        comment: Option<String>,
    ) -> Result<OrderId, BacktestError>;
    fn close_position(&mut self, position_id: PositionId) -> Result<OrderId, BacktestError>;
    fn order_history(&self) -> &[OrderResult];
    fn open_positions(&self) -> Vec<Position>;
    fn trade_history(&self) -> &std::collections::VecDeque<TradeRecord>;
    fn pending_stats(&self) -> &crate::pending::PendingOrderStats;
    fn balance(&self) -> f64;
    fn equity(&self) -> f64;
    /// §4.4.6 end-of-scenario cleanup, hosted on the trait so `TickLoop`
    /// can call it without downcasting to a concrete executor.
    fn close_all_remaining_orders(&mut self, tick: &Tick, tick_index: u64);
}

/// World 2 + world 3 entries carry the same shape as a pending order;
/// they are kept as plain `Vec<PendingOrder>` rather than another
/// `PendingOrderManager`, since spec §4.4.2 processes them by linear
/// scan every tick rather than by id lookup.
pub struct SimulationExecutor {
    symbol: String,
    broker: BrokerConfig,
    portfolio: PortfolioManager,
    latency: LatencySimulator,
    active_limit_orders: Vec<PendingOrder>,
    active_stop_orders: Vec<PendingOrder>,
    order_ids: OrderIdAllocator,
    order_history: Vec<OrderResult>,
    orders_executed: u64,
    orders_rejected: u64,
    stress_reject_open: Option<StressConfig>,
    current_tick_index: u64,
}

impl SimulationExecutor {
    pub fn new(
        symbol: impl Into<String>,
        broker: BrokerConfig,
        portfolio: PortfolioManager,
        latency: LatencySimulator,
        stress_reject_open: Option<StressConfig>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            broker,
            portfolio,
            latency,
            active_limit_orders: Vec::new(),
            active_stop_orders: Vec::new(),
            order_ids: OrderIdAllocator::new(),
            order_history: Vec::new(),
            orders_executed: 0,
            orders_rejected: 0,
            stress_reject_open,
            current_tick_index: 0,
        }
    }

    pub fn portfolio(&self) -> &PortfolioManager {
        &self.portfolio
    }

    pub fn orders_executed(&self) -> u64 {
        self.orders_executed
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected
    }

    pub fn pending_stats(&self) -> &crate::pending::PendingOrderStats {
        self.latency.stats()
    }

    pub fn active_limit_orders(&self) -> &[PendingOrder] {
        &self.active_limit_orders
    }

    pub fn active_stop_orders(&self) -> &[PendingOrder] {
        &self.active_stop_orders
    }

    fn symbol_spec(&self) -> Result<&SymbolSpec, BacktestError> {
        self.broker.symbol(&self.symbol)
    }

    /// Tick value in account currency. Resolves SPEC_FULL.md Open
    /// Question 1: if the symbol's quote currency differs from the
    /// account currency, a static `conversion_rate` must be configured
    /// or the scenario fails fast rather than silently mispricing.
    fn tick_value(&self, spec: &SymbolSpec) -> Result<f64, BacktestError> {
        let raw = spec.raw_tick_value();
        let needs_conversion = match &spec.quote_currency {
            Some(q) => q != self.portfolio.account_currency(),
            None => false,
        };
        if !needs_conversion {
            return Ok(raw);
        }
        match spec.conversion_rate {
            Some(rate) => Ok(raw * rate),
            None => Err(BacktestError::InvalidConfig(format!(
                "symbol quote currency differs from account currency {} but no conversion_rate is configured",
                self.portfolio.account_currency()
            ))),
        }
    }

    fn entry_fee(&self, spec: &SymbolSpec, fill_type: FillType, tick: &Tick, lots: f64, tick_value: f64) -> f64 {
        match self.broker.fee_structure.model {
            FeeModel::Spread => tick.spread_points * tick_value * lots,
            FeeModel::MakerTaker => {
                let order_value = lots * spec.contract_size * tick.mid();
                let rate = if fill_type.is_maker() {
                    self.broker.fee_structure.maker_fee.unwrap_or(0.0)
                } else {
                    self.broker.fee_structure.taker_fee.unwrap_or(0.0)
                };
                order_value * rate / 100.0
            }
        }
    }

    fn stress_fires(&mut self) -> Result<bool, BacktestError> {
        match &mut self.stress_reject_open {
            Some(cfg) if cfg.enabled => cfg.fires(),
            _ => Ok(false),
        }
    }

    fn push_history(&mut self, result: OrderResult) {
        self.order_history.push(result);
    }

    fn reject_open(&mut self, order_id: OrderId, reason: RejectionReason, comment: Option<String>) {
        self.orders_rejected += 1;
        self.push_history(OrderResult {
            order_id,
            status: OrderStatus::Rejected,
            rejection_reason: Some(reason),
            executed_price: None,
            metadata: FillMetadata {
                fill_type: None,
                from_stop_limit: false,
                comment,
            },
        });
    }

    /// §4.4.3 `_fill_open_order`. Side-effect only: all outcomes land in
    /// `order_history`, nothing is returned to the caller.
    fn fill_open_order(&mut self, order: PendingOrder, tick: &Tick, fill_price: Option<f64>, fill_type: FillType) {
        let spec = match self.symbol_spec() {
            Ok(s) => s.clone(),
            Err(_) => {
                self.reject_open(order.order_id, RejectionReason::BrokerError, Some("unknown symbol".into()));
                return;
            }
        };
        let price = fill_price.unwrap_or(match order.direction {
            Direction::Long => tick.ask,
            Direction::Short => tick.bid,
        });
        let tick_value = match self.tick_value(&spec) {
            Ok(v) => v,
            Err(e) => {
                self.reject_open(order.order_id, RejectionReason::BrokerError, Some(e.to_string()));
                return;
            }
        };
        let entry_fee = self.entry_fee(&spec, fill_type, tick, order.lots, tick_value);
        let leverage = self.broker.broker_info.leverage.max(1.0);
        let required_margin = (order.lots * spec.contract_size * price) / leverage;

        let open_result = self.portfolio.open_position(OpenRequest {
            order_id: order.order_id,
            symbol: &self.symbol,
            direction: order.direction,
            lots: order.lots,
            entry_price: price,
            entry_time: tick.timestamp,
            entry_tick_index: self.current_tick_index,
            entry_type: order.order_type,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            contract_size: spec.contract_size,
            digits: spec.digits,
            tick_value,
            entry_fee,
            required_margin,
        });

        match open_result {
            Ok(_) => {
                self.orders_executed += 1;
                self.push_history(OrderResult {
                    order_id: order.order_id,
                    status: OrderStatus::Executed,
                    rejection_reason: None,
                    executed_price: Some(price),
                    metadata: FillMetadata {
                        fill_type: Some(fill_type),
                        from_stop_limit: order.from_stop_limit,
                        comment: order.comment,
                    },
                });
            }
            Err(BacktestError::InsufficientMargin { .. }) => {
                self.reject_open(order.order_id, RejectionReason::InsufficientMargin, order.comment);
            }
            Err(_) => {
                self.reject_open(order.order_id, RejectionReason::BrokerError, order.comment);
            }
        }
    }

    fn fill_close_order(&mut self, order: PendingOrder, tick: &Tick, tick_index: u64, fill_price: Option<f64>) {
        let Some(position_id) = order.position_id else {
            return;
        };
        let Some(position) = self.portfolio.get_position(position_id) else {
            return;
        };
        let price = fill_price.unwrap_or(match position.direction {
            Direction::Long => tick.bid,
            Direction::Short => tick.ask,
        });
        let spec = self.symbol_spec().ok().cloned();
        let exit_spread_cost = spec
            .map(|spec| self.tick_value(&spec).map(|tv| tick.spread_points * tv * position.lots).unwrap_or(0.0))
            .unwrap_or(0.0);

        // §4.4.3 step 5: only _fill_open_order touches execution_stats.
        // A close fill emits a TradeRecord (via close_position, above) and
        // is otherwise invisible to orders_sent/orders_executed/orders_rejected.
        match self
            .portfolio
            .close_position(position_id, price, tick_index, tick.timestamp, 0.0, exit_spread_cost, 0.0)
        {
            Ok(_) => {}
            Err(err) => {
                warn!(position_id = %position_id, %err, "close fill dropped: position already gone");
            }
        }
    }

    /// §4.4.2 Phase 1 — latency drain: dispatch every order released by
    /// the latency simulator this tick.
    fn process_phase1(&mut self, tick: &Tick, tick_index: u64) -> Result<(), BacktestError> {
        let released = self.latency.process_tick(tick_index);
        for order in released {
            let latency_ticks = tick_index.saturating_sub(order.placed_at_tick);

            if order.action == OrderAction::Open && self.stress_fires()? {
                self.latency.record_outcome(&order, PendingOutcome::Rejected, latency_ticks, Some("stress".into()));
                self.reject_open(
                    order.order_id,
                    RejectionReason::BrokerError,
                    Some(format!("[STRESS TEST] rejected order {}", order.order_id)),
                );
                continue;
            }

            if order.action == OrderAction::Close {
                self.latency.record_outcome(&order, PendingOutcome::Filled, latency_ticks, None);
                self.fill_close_order(order, tick, tick_index, None);
                continue;
            }

            match order.order_type {
                OrderType::Market => {
                    self.latency.record_outcome(&order, PendingOutcome::Filled, latency_ticks, None);
                    self.fill_open_order(order, tick, None, FillType::Market);
                }
                OrderType::Limit => {
                    self.latency.record_outcome(&order, PendingOutcome::Filled, latency_ticks, None);
                    if limit_triggered(&order, tick) {
                        let entry_price = order.entry_price;
                        self.fill_open_order(order, tick, Some(entry_price), FillType::LimitImmediate);
                    } else {
                        self.active_limit_orders.push(order);
                    }
                }
                OrderType::Stop => {
                    self.latency.record_outcome(&order, PendingOutcome::Filled, latency_ticks, None);
                    if stop_triggered(&order, tick) {
                        self.fill_open_order(order, tick, None, FillType::Stop);
                    } else {
                        self.active_stop_orders.push(order);
                    }
                }
                OrderType::StopLimit => {
                    self.latency.record_outcome(&order, PendingOutcome::Filled, latency_ticks, None);
                    if stop_triggered(&order, tick) {
                        let converted = convert_stop_limit(order);
                        if limit_triggered(&converted, tick) {
                            let price = converted.entry_price;
                            self.fill_open_order(converted, tick, Some(price), FillType::StopLimitImmediate);
                        } else {
                            self.active_limit_orders.push(converted);
                        }
                    } else {
                        self.active_stop_orders.push(order);
                    }
                }
            }
        }
        Ok(())
    }

    /// §4.4.2 Phase 2 — limit monitoring.
    fn process_phase2(&mut self, tick: &Tick) {
        let mut remaining = Vec::with_capacity(self.active_limit_orders.len());
        let orders = std::mem::take(&mut self.active_limit_orders);
        for order in orders {
            if limit_triggered(&order, tick) {
                let price = order.entry_price;
                self.fill_open_order(order, tick, Some(price), FillType::Limit);
            } else {
                remaining.push(order);
            }
        }
        self.active_limit_orders = remaining;
    }

    /// §4.4.2 Phase 3 — stop monitoring.
    fn process_phase3(&mut self, tick: &Tick) {
        let mut remaining = Vec::with_capacity(self.active_stop_orders.len());
        let orders = std::mem::take(&mut self.active_stop_orders);
        for order in orders {
            if !stop_triggered(&order, tick) {
                remaining.push(order);
                continue;
            }
            match order.order_type {
                OrderType::Stop => {
                    self.fill_open_order(order, tick, None, FillType::Stop);
                }
                OrderType::StopLimit => {
                    // Converts and moves to the limit book; may fill next
                    // tick's Phase 2 at the earliest — this tick's Phase 2
                    // has already run.
                    let converted = convert_stop_limit(order);
                    self.active_limit_orders.push(converted);
                }
                OrderType::Market | OrderType::Limit => unreachable!("stop book only holds STOP/STOP_LIMIT orders"),
            }
        }
        self.active_stop_orders = remaining;
    }

    /// §4.4.1 step 3 — SL/TP monitoring on open positions. Fills inline
    /// (no latency) rather than literally round-tripping through the
    /// pending pipeline, matching the spec's "implementation may fill
    /// inline" allowance.
    fn check_sl_tp_triggers(&mut self, tick: &Tick, tick_index: u64) {
        let triggered: Vec<(PositionId, f64)> = self
            .portfolio
            .get_open_positions()
            .iter()
            .filter_map(|p| {
                p.sl_tp_trigger(tick.bid, tick.ask).map(|_| {
                    let price = match p.direction {
                        Direction::Long => tick.bid,
                        Direction::Short => tick.ask,
                    };
                    (p.position_id, price)
                })
            })
            .collect();

        for (position_id, price) in triggered {
            let order_id = self.order_ids.allocate();
            let synthetic = PendingOrder {
                order_id,
                action: OrderAction::Close,
                order_type: OrderType::Market,
                symbol: self.symbol.clone(),
                direction: Direction::Long,
                lots: 0.0,
                entry_price: 0.0,
                stop_price: None,
                stop_loss: None,
                take_profit: None,
                comment: Some("sl_tp_trigger".into()),
                position_id: Some(position_id),
                placed_at_tick: tick_index,
                fill_at_tick: tick_index,
                from_stop_limit: false,
            };
            self.fill_close_order(synthetic, tick, tick_index, Some(price));
        }
    }

    /// §4.4.6 end-of-scenario cleanup.
    pub fn close_all_remaining_orders(&mut self, tick: &Tick, tick_index: u64) {
        let open: Vec<PositionId> = self.portfolio.get_open_positions().iter().map(|p| p.position_id).collect();
        for position_id in open {
            let order_id = self.order_ids.allocate();
            let synthetic = PendingOrder {
                order_id,
                action: OrderAction::Close,
                order_type: OrderType::Market,
                symbol: self.symbol.clone(),
                direction: Direction::Long,
                lots: 0.0,
                entry_price: 0.0,
                stop_price: None,
                stop_loss: None,
                take_profit: None,
                comment: Some("scenario_end".into()),
                position_id: Some(position_id),
                placed_at_tick: tick_index,
                fill_at_tick: tick_index,
                from_stop_limit: false,
            };
            self.fill_close_order(synthetic, tick, tick_index, None);
        }
        self.latency.clear(tick_index, "scenario_end");
    }

    pub fn modify_position(
        &mut self,
        position_id: PositionId,
        stop_loss: Sentinel<f64>,
        take_profit: Sentinel<f64>,
    ) -> Result<(), BacktestError> {
        let current = self
            .portfolio
            .get_position(position_id)
            .ok_or_else(|| BacktestError::PositionNotFound(position_id.to_string()))?;
        let sl = stop_loss.apply(current.stop_loss);
        let tp = take_profit.apply(current.take_profit);
        self.portfolio.modify_position(position_id, Some(sl), Some(tp))
    }

    pub fn modify_limit_order(
        &mut self,
        order_id: OrderId,
        price: Sentinel<f64>,
        stop_loss: Sentinel<f64>,
        take_profit: Sentinel<f64>,
    ) -> Result<(), BacktestError> {
        let order = self
            .active_limit_orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| BacktestError::ContractViolation(format!("no active limit order {order_id}")))?;
        // `price` is a mandatory field; Clear is meaningless here and
        // simply leaves the current price in place.
        if let Sentinel::Set(v) = price {
            order.entry_price = v;
        }
        order.stop_loss = stop_loss.apply(order.stop_loss);
        order.take_profit = take_profit.apply(order.take_profit);
        Ok(())
    }

    pub fn modify_stop_order(
        &mut self,
        order_id: OrderId,
        stop_price: Sentinel<f64>,
        limit_price: Sentinel<f64>,
        stop_loss: Sentinel<f64>,
        take_profit: Sentinel<f64>,
    ) -> Result<(), BacktestError> {
        let order = self
            .active_stop_orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| BacktestError::ContractViolation(format!("no active stop order {order_id}")))?;
        order.stop_price = stop_price.apply(order.stop_price);
        if order.order_type == OrderType::StopLimit {
            if let Sentinel::Set(v) = limit_price {
                order.entry_price = v;
            }
        }
        order.stop_loss = stop_loss.apply(order.stop_loss);
        order.take_profit = take_profit.apply(order.take_profit);
        Ok(())
    }
}

fn limit_triggered(order: &PendingOrder, tick: &Tick) -> bool {
    match order.direction {
        Direction::Long => tick.ask <= order.entry_price,
        Direction::Short => tick.bid >= order.entry_price,
    }
}

fn stop_triggered(order: &PendingOrder, tick: &Tick) -> bool {
    let Some(stop_price) = order.stop_price else {
        return false;
    };
    match order.direction {
        Direction::Long => tick.ask >= stop_price,
        Direction::Short => tick.bid <= stop_price,
    }
}

/// STOP_LIMIT -> LIMIT conversion (spec §4.4.2 Phase 1/3): the limit
/// price becomes the order's effective entry price, and
/// `from_stop_limit` marks it for fill-type attribution later (resolves
/// SPEC_FULL.md Open Question 2).
fn convert_stop_limit(mut order: PendingOrder) -> PendingOrder {
    order.order_type = OrderType::Limit;
    order.from_stop_limit = true;
    order
}

impl ExecutionCore for SimulationExecutor {
    fn on_tick(&mut self, tick: Tick, tick_index: u64) -> Result<(), BacktestError> {
        self.current_tick_index = tick_index;
        self.portfolio.update_prices(tick, &self.symbol);
        self.process_phase1(&tick, tick_index)?;
        self.process_phase2(&tick);
        self.process_phase3(&tick);
        self.check_sl_tp_triggers(&tick, tick_index);
        Ok(())
    }

    fn open_order(
        &mut self,
        order_type: OrderType,
        direction: Direction,
        lots: f64,
        limit_or_stop_price: Option<f64>,
        stop_price: Option<f64>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        comment: Option<String>,
    ) -> Result<OrderId, BacktestError> {
        let spec = self.symbol_spec()?;
        if let Some(reason) = spec.lot_validation_error(lots) {
            return Err(BacktestError::LotValidation(reason));
        }
        let order_id = self.order_ids.allocate();
        let order = PendingOrder {
            order_id,
            action: OrderAction::Open,
            order_type,
            symbol: self.symbol.clone(),
            direction,
            lots,
            entry_price: limit_or_stop_price.unwrap_or(0.0),
            stop_price,
            stop_loss,
            take_profit,
            comment,
            position_id: None,
            placed_at_tick: 0,
            fill_at_tick: 0,
            from_stop_limit: false,
        };
        // tick_index supplied by the latency simulator at submit time via
        // the caller's current tick index; TickLoop always calls
        // open_order between on_tick invocations, never concurrently.
        self.latency.submit_open(order, self.current_tick_index())?;
        Ok(order_id)
    }

    fn close_position(&mut self, position_id: PositionId) -> Result<OrderId, BacktestError> {
        self.portfolio
            .get_position(position_id)
            .ok_or_else(|| BacktestError::PositionNotFound(position_id.to_string()))?;
        let order_id = self.order_ids.allocate();
        let order = PendingOrder {
            order_id,
            action: OrderAction::Close,
            order_type: OrderType::Market,
            symbol: self.symbol.clone(),
            direction: Direction::Long,
            lots: 0.0,
            entry_price: 0.0,
            stop_price: None,
            stop_loss: None,
            take_profit: None,
            comment: None,
            position_id: Some(position_id),
            placed_at_tick: 0,
            fill_at_tick: 0,
            from_stop_limit: false,
        };
        self.latency.submit_close(position_id, order, self.current_tick_index())?;
        Ok(order_id)
    }

    fn order_history(&self) -> &[OrderResult] {
        &self.order_history
    }

    fn open_positions(&self) -> Vec<Position> {
        self.portfolio.get_open_positions()
    }

    fn trade_history(&self) -> &std::collections::VecDeque<TradeRecord> {
        self.portfolio.trade_history()
    }

    fn pending_stats(&self) -> &crate::pending::PendingOrderStats {
        self.latency.stats()
    }

    fn balance(&self) -> f64 {
        self.portfolio.balance()
    }

    fn equity(&self) -> f64 {
        self.portfolio.equity()
    }

    fn close_all_remaining_orders(&mut self, tick: &Tick, tick_index: u64) {
        SimulationExecutor::close_all_remaining_orders(self, tick, tick_index)
    }
}

impl SimulationExecutor {
    fn current_tick_index(&self) -> u64 {
        self.current_tick_index
    }
}
