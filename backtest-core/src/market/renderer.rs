//! Aggregates ticks into bars per (symbol, timeframe), filling gaps with
//! synthetic bars to preserve temporal continuity (spec §4.5).

use super::{Bar, Tick, Timeframe};
use crate::core::enums::BarType;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

const DEFAULT_MAX_HISTORY: usize = 1000;

#[derive(Debug)]
struct Series {
    current: Option<Bar>,
    history: VecDeque<Bar>,
    max_history: usize,
    warned_overflow: bool,
}

impl Series {
    fn new(max_history: usize) -> Self {
        Self {
            current: None,
            history: VecDeque::new(),
            max_history,
            warned_overflow: false,
        }
    }

    fn push_closed(&mut self, bar: Bar) {
        if self.max_history != 0 && self.history.len() >= self.max_history {
            self.history.pop_front();
            if !self.warned_overflow {
                warn!(max_history = self.max_history, "bar history ring overflow, dropping oldest");
                self.warned_overflow = true;
            }
        }
        self.history.push_back(bar);
    }
}

/// Key identifying one (symbol, timeframe) aggregation series.
type SeriesKey = (String, Timeframe);

pub struct BarRenderer {
    max_history: usize,
    series: HashMap<SeriesKey, Series>,
}

impl Default for BarRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl BarRenderer {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            series: HashMap::new(),
        }
    }

    /// Process one tick for `symbol` across every subscribed timeframe.
    /// Returns the bars that *closed* as a result of this tick (may be
    /// more than one if a gap spans multiple intervals and synthetic
    /// bars are emitted to fill it).
    pub fn process_tick(&mut self, symbol: &str, timeframe: Timeframe, tick: &Tick) -> Vec<Bar> {
        let key: SeriesKey = (symbol.to_string(), timeframe);
        let series = self
            .series
            .entry(key)
            .or_insert_with(|| Series::new(self.max_history));

        let aligned_open = timeframe.align(tick.timestamp);
        let price = tick.mid();
        let volume = tick.real_volume.unwrap_or(0.0);
        let mut closed = Vec::new();

        match series.current.take() {
            None => {
                series.current = Some(Bar::new_real(timeframe, aligned_open, price));
            }
            Some(mut bar) if bar.open_time == aligned_open => {
                bar.update(price, volume);
                series.current = Some(bar);
            }
            Some(bar) => {
                // Interval rolled over: close the in-progress bar, fill
                // any fully-skipped intervals with synthetic bars, then
                // open the new real bar.
                let last_close = bar.close;
                series.push_closed(bar);
                closed.push(series.history.back().copied().unwrap());

                let mut next_open = last_open_plus_one(series.history.back().unwrap(), timeframe);
                while next_open < aligned_open {
                    let synthetic = Bar::synthetic(timeframe, next_open, last_close);
                    series.push_closed(synthetic);
                    closed.push(series.history.back().copied().unwrap());
                    next_open = next_open + timeframe.duration();
                }

                series.current = Some(Bar::new_real(timeframe, aligned_open, price));
            }
        }

        closed
    }

    pub fn current_bar(&self, symbol: &str, timeframe: Timeframe) -> Option<Bar> {
        self.series.get(&(symbol.to_string(), timeframe)).and_then(|s| s.current)
    }

    pub fn history(&self, symbol: &str, timeframe: Timeframe) -> Vec<Bar> {
        self.series
            .get(&(symbol.to_string(), timeframe))
            .map(|s| s.history.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Preloads closed warmup bars for a (symbol, timeframe) series ahead
    /// of the first tick, as done by each worker at Phase 2 startup
    /// ("injects warmup bars into BarRenderer"). Bars are pushed through
    /// the same ring-capped path `process_tick` uses so overflow warnings
    /// still fire once.
    pub fn seed_history(&mut self, symbol: &str, timeframe: Timeframe, bars: impl IntoIterator<Item = Bar>) {
        let key: SeriesKey = (symbol.to_string(), timeframe);
        let series = self.series.entry(key).or_insert_with(|| Series::new(self.max_history));
        for bar in bars {
            series.push_closed(bar);
        }
    }
}

fn last_open_plus_one(closed_bar: &Bar, timeframe: Timeframe) -> chrono::DateTime<chrono::Utc> {
    closed_bar.open_time + timeframe.duration()
}

impl BarType {
    pub fn is_synthetic(self) -> bool {
        matches!(self, BarType::Synthetic)
    }
}
