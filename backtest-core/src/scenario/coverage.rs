//! Per-symbol gap coverage reports (spec §4.9 Phase 0.5).
//!
//! Grounded on `bog-core::engine::gap_recovery::GapRecoveryManager`'s
//! stateful stats-over-gaps shape, generalized from live sequence-gap
//! detection to an offline classification pass over bar-index metadata,
//! cached per symbol in a `dashmap::DashMap` the way the teacher favors
//! concurrent maps for read-heavy, rarely-written state (spec §2
//! "dashmap where a concurrently-read, rarely-written map is natural").

use crate::core::enums::GapCategory;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// One contiguous stretch of available bar data, as reported by the
/// external data layer's index metadata (spec §1 OUT OF SCOPE "bar-index
/// storage on disk" — the core only consumes the already-read index).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarIndexEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: GapCategory,
}

impl Gap {
    fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// One symbol's classified gaps over its available index, computed once
/// and cached (spec §4.9 "One report per symbol, cached").
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub symbol: String,
    pub gaps: Vec<Gap>,
}

impl CoverageReport {
    pub fn compute(symbol: impl Into<String>, index: &[BarIndexEntry]) -> Self {
        let mut sorted = index.to_vec();
        sorted.sort_by_key(|e| e.start);

        let mut gaps = Vec::new();
        for pair in sorted.windows(2) {
            let gap_seconds = (pair[1].start - pair[0].end).num_milliseconds() as f64 / 1000.0;
            if gap_seconds > 0.0 {
                gaps.push(Gap {
                    start: pair[0].end,
                    end: pair[1].start,
                    category: GapCategory::classify(gap_seconds),
                });
            }
        }

        Self { symbol: symbol.into(), gaps }
    }

    pub fn gap_containing(&self, timestamp: DateTime<Utc>) -> Option<&Gap> {
        self.gaps.iter().find(|g| g.contains(timestamp))
    }

    /// First gap overlapping `[start, end)` whose category is not in
    /// `allowed` (spec §4.9 Phase 1.5 "(b) tick stretch contains only
    /// allowed gap categories").
    pub fn forbidden_gap(&self, start: DateTime<Utc>, end: DateTime<Utc>, allowed: &[GapCategory]) -> Option<&Gap> {
        self.gaps.iter().find(|g| g.overlaps(start, end) && !allowed.contains(&g.category))
    }
}

/// Process-wide cache of per-symbol coverage reports (spec §4.9 "cached").
#[derive(Default)]
pub struct CoverageCache {
    reports: DashMap<String, CoverageReport>,
}

impl CoverageCache {
    pub fn new() -> Self {
        Self { reports: DashMap::new() }
    }

    /// Returns the cached report, computing and inserting it on first
    /// request for this symbol.
    pub fn get_or_compute(&self, symbol: &str, index: &[BarIndexEntry]) -> CoverageReport {
        if let Some(existing) = self.reports.get(symbol) {
            return existing.clone();
        }
        let report = CoverageReport::compute(symbol, index);
        self.reports.insert(symbol.to_string(), report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn classifies_gaps_between_contiguous_stretches() {
        let index = vec![
            BarIndexEntry { start: at(0), end: at(100) },
            BarIndexEntry { start: at(200), end: at(300) },
        ];
        let report = CoverageReport::compute("EURUSD", &index);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].category, GapCategory::Short);
    }

    #[test]
    fn forbidden_gap_flags_categories_outside_allow_list() {
        let index = vec![
            BarIndexEntry { start: at(0), end: at(100) },
            BarIndexEntry { start: at(100) + chrono::Duration::hours(5), end: at(200) + chrono::Duration::hours(5) },
        ];
        let report = CoverageReport::compute("EURUSD", &index);
        let allowed = [GapCategory::Seamless, GapCategory::Short];
        assert!(report.forbidden_gap(at(0), at(200) + chrono::Duration::hours(5), &allowed).is_some());
    }

    #[test]
    fn cache_computes_once_per_symbol() {
        let cache = CoverageCache::new();
        let index = vec![BarIndexEntry { start: at(0), end: at(100) }];
        let first = cache.get_or_compute("EURUSD", &index);
        let second = cache.get_or_compute("EURUSD", &[]);
        assert_eq!(first.symbol, second.symbol);
        assert_eq!(first.gaps.len(), second.gaps.len());
    }
}
