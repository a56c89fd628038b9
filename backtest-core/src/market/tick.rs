//! A single market quote (spec §3 Data Model, `Tick`).
//!
//! Modeled after the `MarketSnapshotExt` convenience-method idiom in
//! `bog-core::data::types` (best_bid/best_ask/mid/spread helpers), but
//! natively defined rather than re-exported from an external feed crate
//! — this core treats tick import as an external collaborator (spec §1
//! OUT OF SCOPE) and only specifies the shape it consumes.

use crate::core::BacktestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub real_volume: Option<f64>,
    pub tick_volume: Option<u64>,
    pub spread_points: f64,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Result<Self, BacktestError> {
        let tick = Self {
            timestamp,
            bid,
            ask,
            real_volume: None,
            tick_volume: None,
            spread_points: 0.0,
        };
        tick.validate()?;
        Ok(tick)
    }

    /// Invariants from spec §3: `bid > 0`, `ask > 0`, `ask >= bid`.
    /// Monotone-timestamp-within-a-scenario is a stream-level property
    /// checked by `ScenarioOrchestrator`, not per-tick here.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.bid <= 0.0 || self.ask <= 0.0 {
            return Err(BacktestError::InternalInvariant(format!(
                "tick prices must be positive: bid={}, ask={}",
                self.bid, self.ask
            )));
        }
        if self.ask < self.bid {
            return Err(BacktestError::InternalInvariant(format!(
                "ask {} < bid {}",
                self.ask, self.bid
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    #[inline]
    pub fn spread_bps(&self) -> f64 {
        if self.mid() == 0.0 {
            0.0
        } else {
            self.spread() / self.mid() * 10_000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(bid: f64, ask: f64) -> Tick {
        Tick::new(Utc::now(), bid, ask).unwrap()
    }

    #[test]
    fn mid_and_spread() {
        let tick = t(144.00, 144.01);
        assert!((tick.mid() - 144.005).abs() < 1e-9);
        assert!((tick.spread() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn rejects_crossed_or_nonpositive_prices() {
        assert!(Tick::new(Utc::now(), 0.0, 1.0).is_err());
        assert!(Tick::new(Utc::now(), 1.0, 0.9).is_err());
        assert!(Tick::new(Utc::now(), 1.0, 1.0).is_ok());
    }
}
