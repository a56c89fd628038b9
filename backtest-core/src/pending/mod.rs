//! The pending-order pipeline's shared storage and bookkeeping (spec
//! §4.3 `PendingOrderManager`).
//!
//! Grounded on `bog-core::execution::journal`'s outcome-recording idiom
//! (running aggregate stats kept beside a small anomaly log) and
//! `bog-core::risk::rate_limiter`'s time-windowed bookkeeping style,
//! generalized from a single exchange rate-limit window to an
//! order-latency pipeline with three outcome classes.

mod latency;

pub use latency::LatencySimulator;

use crate::core::enums::{Direction, OrderAction, OrderType, PendingOutcome};
use crate::core::ids::{OrderId, PositionId};
use crate::core::BacktestError;
use std::collections::HashMap;

/// An order in flight somewhere in the pipeline: either still waiting
/// out simulated network/exchange latency (`placed_at_tick`/
/// `fill_at_tick` populated), or parked in the active limit/stop books
/// awaiting a price trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub action: OrderAction,
    pub order_type: OrderType,
    pub symbol: String,
    pub direction: Direction,
    pub lots: f64,
    /// Limit price for LIMIT and STOP_LIMIT orders; ignored for MARKET
    /// and plain STOP orders (which fill at market on trigger).
    pub entry_price: f64,
    /// Trigger price for STOP and STOP_LIMIT orders.
    pub stop_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub comment: Option<String>,
    pub position_id: Option<PositionId>,
    pub placed_at_tick: u64,
    pub fill_at_tick: u64,
    pub from_stop_limit: bool,
}

impl PendingOrder {
    pub fn is_close(&self) -> bool {
        self.action == OrderAction::Close
    }
}

/// Running aggregates over every order that has passed through
/// `record_outcome` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct PendingOrderStats {
    pub filled: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub force_closed: u64,
    min_latency_ticks: Option<u64>,
    max_latency_ticks: Option<u64>,
    latency_sum: u64,
    latency_count: u64,
}

impl PendingOrderStats {
    fn observe(&mut self, outcome: PendingOutcome, latency_ticks: u64) {
        match outcome {
            PendingOutcome::Filled => self.filled += 1,
            PendingOutcome::Rejected => self.rejected += 1,
            PendingOutcome::TimedOut => self.timed_out += 1,
            PendingOutcome::ForceClosed => self.force_closed += 1,
        }
        self.min_latency_ticks = Some(self.min_latency_ticks.map_or(latency_ticks, |m| m.min(latency_ticks)));
        self.max_latency_ticks = Some(self.max_latency_ticks.map_or(latency_ticks, |m| m.max(latency_ticks)));
        self.latency_sum += latency_ticks;
        self.latency_count += 1;
    }

    pub fn min_latency(&self) -> Option<u64> {
        self.min_latency_ticks
    }

    pub fn max_latency(&self) -> Option<u64> {
        self.max_latency_ticks
    }

    pub fn avg_latency(&self) -> Option<f64> {
        if self.latency_count == 0 {
            None
        } else {
            Some(self.latency_sum as f64 / self.latency_count as f64)
        }
    }
}

/// Anomaly log entry: only TIMED_OUT and FORCE_CLOSED outcomes are
/// individually recorded, since FILLED/REJECTED are already fully
/// represented by `order_history`.
#[derive(Debug, Clone)]
pub struct PendingOrderRecord {
    pub order_id: OrderId,
    pub outcome: PendingOutcome,
    pub latency_ticks: u64,
    pub reason: Option<String>,
}

/// Keyed storage shared by every stage of the pipeline. `LatencySimulator`
/// (world 1) is the only subclass the spec names; the active limit/stop
/// books (world 2/3, owned directly by the executor) reuse this same
/// contract through the trait below.
pub trait PendingOrderManager {
    fn store(&mut self, order: PendingOrder) -> Result<(), BacktestError>;
    fn remove(&mut self, order_id: OrderId) -> Option<PendingOrder>;
    fn has_pending(&self) -> bool;
    fn is_pending_close(&self, position_id: PositionId) -> bool;
    fn get_pending(&self) -> Vec<&PendingOrder>;
    fn record_outcome(
        &mut self,
        order: &PendingOrder,
        outcome: PendingOutcome,
        latency_ticks: u64,
        reason: Option<String>,
    );
    fn clear(&mut self, current_tick: u64, reason: &str);
    fn stats(&self) -> &PendingOrderStats;
    fn anomaly_orders(&self) -> &[PendingOrderRecord];
}

/// Shared base every concrete manager embeds: the keyed map plus
/// aggregated stats/anomaly log, factored out so `LatencySimulator` and
/// the executor's active-book wrappers don't duplicate bookkeeping.
#[derive(Debug, Default)]
pub struct PendingOrderStore {
    orders: HashMap<OrderId, PendingOrder>,
    insertion_order: Vec<OrderId>,
    stats: PendingOrderStats,
    anomaly_orders: Vec<PendingOrderRecord>,
}

impl PendingOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: PendingOrder) -> Result<(), BacktestError> {
        if self.orders.contains_key(&order.order_id) {
            return Err(BacktestError::InternalInvariant(format!(
                "duplicate pending order id {}",
                order.order_id
            )));
        }
        self.insertion_order.push(order.order_id);
        self.orders.insert(order.order_id, order);
        Ok(())
    }

    pub fn take(&mut self, order_id: OrderId) -> Option<PendingOrder> {
        let order = self.orders.remove(&order_id)?;
        self.insertion_order.retain(|id| *id != order_id);
        Some(order)
    }

    pub fn has_pending(&self) -> bool {
        !self.orders.is_empty()
    }

    pub fn is_pending_close(&self, position_id: PositionId) -> bool {
        self.orders
            .values()
            .any(|o| o.is_close() && o.position_id == Some(position_id))
    }

    pub fn get_pending(&self) -> Vec<&PendingOrder> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.orders.get(id))
            .collect()
    }

    pub fn record_outcome(
        &mut self,
        order: &PendingOrder,
        outcome: PendingOutcome,
        latency_ticks: u64,
        reason: Option<String>,
    ) {
        self.stats.observe(outcome, latency_ticks);
        if matches!(outcome, PendingOutcome::TimedOut | PendingOutcome::ForceClosed) {
            self.anomaly_orders.push(PendingOrderRecord {
                order_id: order.order_id,
                outcome,
                latency_ticks,
                reason,
            });
        }
    }

    /// Drains everything still stored, in insertion order, recording
    /// each as FORCE_CLOSED.
    pub fn clear(&mut self, current_tick: u64, reason: &str) {
        let ids: Vec<OrderId> = self.insertion_order.clone();
        for id in ids {
            if let Some(order) = self.take(id) {
                let latency = current_tick.saturating_sub(order.placed_at_tick);
                self.record_outcome(
                    &order,
                    PendingOutcome::ForceClosed,
                    latency,
                    Some(reason.to_string()),
                );
            }
        }
    }

    pub fn stats(&self) -> &PendingOrderStats {
        &self.stats
    }

    pub fn anomaly_orders(&self) -> &[PendingOrderRecord] {
        &self.anomaly_orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: u64, tick: u64) -> PendingOrder {
        PendingOrder {
            order_id: OrderId::new(id),
            action: OrderAction::Open,
            order_type: OrderType::Market,
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            lots: 1.0,
            entry_price: 1.1,
            stop_price: None,
            stop_loss: None,
            take_profit: None,
            comment: None,
            position_id: None,
            placed_at_tick: tick,
            fill_at_tick: tick,
            from_stop_limit: false,
        }
    }

    #[test]
    fn rejects_duplicate_order_ids() {
        let mut store = PendingOrderStore::new();
        store.insert(order(1, 0)).unwrap();
        assert!(store.insert(order(1, 0)).is_err());
    }

    #[test]
    fn clear_force_closes_everything_in_insertion_order() {
        let mut store = PendingOrderStore::new();
        store.insert(order(1, 0)).unwrap();
        store.insert(order(2, 0)).unwrap();
        store.clear(5, "scenario_end");
        assert!(!store.has_pending());
        assert_eq!(store.stats().force_closed, 2);
        assert_eq!(store.anomaly_orders().len(), 2);
    }

    #[test]
    fn stats_track_min_max_avg_latency() {
        let mut store = PendingOrderStore::new();
        let o1 = order(1, 0);
        let o2 = order(2, 0);
        store.record_outcome(&o1, PendingOutcome::Filled, 3, None);
        store.record_outcome(&o2, PendingOutcome::Filled, 7, None);
        assert_eq!(store.stats().min_latency(), Some(3));
        assert_eq!(store.stats().max_latency(), Some(7));
        assert_eq!(store.stats().avg_latency(), Some(5.0));
    }
}
