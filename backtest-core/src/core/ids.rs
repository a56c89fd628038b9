//! Order and position identifiers.
//!
//! `OrderId` is a thin `u64` newtype rather than the teacher's
//! timestamp/random/counter-packed `u128` ([`bog_core::core::OrderId`]):
//! reproducibility of `order_history` across two runs with identical
//! seeds (spec §8 "Determinism properties") requires ids that do not
//! depend on wall-clock time or thread-local RNG state. A scenario-owned
//! sequential counter gives the same guarantee the teacher wanted
//! (cheap, unique, `Copy`) without breaking bitwise reproducibility.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order-{}", self.0)
    }
}

/// Monotonic, scenario-local allocator. One instance is owned exclusively
/// by a `SimulationExecutor`; never shared across scenarios (spec §3
/// Ownership).
#[derive(Debug, Default)]
pub struct OrderIdAllocator {
    next: u64,
}

impl OrderIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> OrderId {
        let id = OrderId(self.next);
        self.next += 1;
        id
    }
}

/// A position's id equals the id of the order that opened it (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PositionId(OrderId);

impl PositionId {
    pub const fn from_opening_order(order_id: OrderId) -> Self {
        Self(order_id)
    }

    pub const fn order_id(self) -> OrderId {
        self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_sequential_and_deterministic() {
        let mut a = OrderIdAllocator::new();
        let mut b = OrderIdAllocator::new();
        for _ in 0..10 {
            assert_eq!(a.allocate(), b.allocate());
        }
    }

    #[test]
    fn position_id_tracks_opening_order() {
        let mut alloc = OrderIdAllocator::new();
        let order = alloc.allocate();
        let pos = PositionId::from_opening_order(order);
        assert_eq!(pos.order_id(), order);
    }
}
