//! World 1 of the pending-order pipeline: tick-count-based latency
//! simulation (spec §4.2.1 `LatencySimulator`).

use super::{PendingOrder, PendingOrderManager, PendingOrderRecord, PendingOrderStats, PendingOrderStore};
use crate::core::enums::PendingOutcome;
use crate::core::ids::{OrderId, PositionId};
use crate::core::BacktestError;
use crate::rng::SeededGenerator;

/// Draws `delay = api_latency.next() + market_execution.next()` per
/// order and releases it once `current_tick >= fill_at_tick`.
pub struct LatencySimulator {
    store: PendingOrderStore,
    api_latency: SeededGenerator,
    market_execution: SeededGenerator,
    api_latency_range: (u32, u32),
    market_execution_range: (u32, u32),
}

impl LatencySimulator {
    pub fn new(
        api_latency_seed: u64,
        market_execution_seed: u64,
        api_latency_range: (u32, u32),
        market_execution_range: (u32, u32),
    ) -> Self {
        Self {
            store: PendingOrderStore::new(),
            api_latency: SeededGenerator::new(api_latency_seed),
            market_execution: SeededGenerator::new(market_execution_seed),
            api_latency_range,
            market_execution_range,
        }
    }

    fn next_delay(&mut self) -> Result<u32, BacktestError> {
        let (a_min, a_max) = self.api_latency_range;
        let (m_min, m_max) = self.market_execution_range;
        let api = self.api_latency.next_delay(a_min, a_max)?;
        let market = self.market_execution.next_delay(m_min, m_max)?;
        Ok(api + market)
    }

    pub fn submit_open(&mut self, mut order: PendingOrder, current_tick: u64) -> Result<(), BacktestError> {
        let delay = self.next_delay()?;
        order.placed_at_tick = current_tick;
        order.fill_at_tick = current_tick + delay as u64;
        self.store.insert(order)
    }

    pub fn submit_close(
        &mut self,
        position_id: PositionId,
        mut order: PendingOrder,
        current_tick: u64,
    ) -> Result<(), BacktestError> {
        let delay = self.next_delay()?;
        order.position_id = Some(position_id);
        order.placed_at_tick = current_tick;
        order.fill_at_tick = current_tick + delay as u64;
        self.store.insert(order)
    }

    /// Returns and removes all orders whose `fill_at_tick <= current_tick`,
    /// in insertion order (spec §4.2.1).
    pub fn process_tick(&mut self, current_tick: u64) -> Vec<PendingOrder> {
        let due: Vec<OrderId> = self
            .store
            .get_pending()
            .into_iter()
            .filter(|o| o.fill_at_tick <= current_tick)
            .map(|o| o.order_id)
            .collect();
        due.into_iter().filter_map(|id| self.store.take(id)).collect()
    }
}

impl PendingOrderManager for LatencySimulator {
    fn store(&mut self, order: PendingOrder) -> Result<(), BacktestError> {
        self.store.insert(order)
    }

    fn remove(&mut self, order_id: OrderId) -> Option<PendingOrder> {
        self.store.take(order_id)
    }

    fn has_pending(&self) -> bool {
        self.store.has_pending()
    }

    fn is_pending_close(&self, position_id: PositionId) -> bool {
        self.store.is_pending_close(position_id)
    }

    fn get_pending(&self) -> Vec<&PendingOrder> {
        self.store.get_pending()
    }

    fn record_outcome(
        &mut self,
        order: &PendingOrder,
        outcome: PendingOutcome,
        latency_ticks: u64,
        reason: Option<String>,
    ) {
        self.store.record_outcome(order, outcome, latency_ticks, reason);
    }

    fn clear(&mut self, current_tick: u64, reason: &str) {
        self.store.clear(current_tick, reason);
    }

    fn stats(&self) -> &PendingOrderStats {
        self.store.stats()
    }

    fn anomaly_orders(&self) -> &[PendingOrderRecord] {
        self.store.anomaly_orders()
    }
}
