//! OHLC bar aggregate (spec §3 Data Model, `Bar`).

use crate::core::BacktestError;
use crate::core::enums::BarType;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-width aggregation interval, expressed in seconds so that any
/// warmup/worker-declared timeframe (1s, 1m, 5m, 1h, ...) is representable
/// without an enum explosion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Timeframe(pub u32);

impl Timeframe {
    pub const M1: Timeframe = Timeframe(60);
    pub const M5: Timeframe = Timeframe(300);
    pub const H1: Timeframe = Timeframe(3600);

    pub const fn seconds(self) -> i64 {
        self.0 as i64
    }

    /// Align a timestamp down to the start of its interval.
    pub fn align(self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let secs = timestamp.timestamp();
        let aligned = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(aligned, 0).single().unwrap_or(timestamp)
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timeframe: Timeframe,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub tick_count: u64,
    pub bar_type: BarType,
}

impl Bar {
    pub fn new_real(timeframe: Timeframe, open_time: DateTime<Utc>, price: f64) -> Self {
        Self {
            timeframe,
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            tick_count: 0,
            bar_type: BarType::Real,
        }
    }

    pub fn synthetic(timeframe: Timeframe, open_time: DateTime<Utc>, last_close: f64) -> Self {
        Self {
            timeframe,
            open_time,
            open: last_close,
            high: last_close,
            low: last_close,
            close: last_close,
            volume: 0.0,
            tick_count: 0,
            bar_type: BarType::Synthetic,
        }
    }

    pub fn update(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
        self.tick_count += 1;
    }

    /// Invariants from spec §3: `high >= max(open, close)`,
    /// `low <= min(open, close)`, `tick_count >= 0` (trivially true for
    /// an unsigned counter).
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.high < self.open.max(self.close) {
            return Err(BacktestError::InternalInvariant(format!(
                "bar high {} below max(open {}, close {})",
                self.high, self.open, self.close
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(BacktestError::InternalInvariant(format!(
                "bar low {} above min(open {}, close {})",
                self.low, self.open, self.close
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_down_to_interval_start() {
        let ts = Utc.timestamp_opt(125, 0).single().unwrap();
        assert_eq!(Timeframe::M1.align(ts).timestamp(), 120);
    }

    #[test]
    fn update_tracks_ohlc_correctly() {
        let open_time = Utc.timestamp_opt(0, 0).single().unwrap();
        let mut bar = Bar::new_real(Timeframe::M1, open_time, 100.0);
        bar.update(105.0, 1.0);
        bar.update(98.0, 1.0);
        bar.update(101.0, 1.0);
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 105.0);
        assert_eq!(bar.low, 98.0);
        assert_eq!(bar.close, 101.0);
        assert_eq!(bar.tick_count, 3);
        assert!(bar.validate().is_ok());
    }
}
