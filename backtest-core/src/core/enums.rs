//! Closed, tagged-variant enums for the domain model (spec §9 "Order
//! types as tagged variants").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub const fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderAction {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Executed,
    Pending,
    Rejected,
}

/// Resolved in SPEC_FULL.md Open Question 2: how a STOP_LIMIT that
/// converts and fills immediately (Phase 1) is distinguished from one
/// later caught by Phase 2 monitoring, and from a plain LIMIT that was
/// already past its trigger on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillType {
    Market,
    LimitImmediate,
    Limit,
    Stop,
    StopLimitImmediate,
}

impl FillType {
    /// LIMIT/STOP_LIMIT fills use maker fees; MARKET/STOP fills use
    /// taker fees (spec §4.4.2 "Fee mapping").
    pub const fn is_maker(self) -> bool {
        matches!(
            self,
            FillType::LimitImmediate | FillType::Limit | FillType::StopLimitImmediate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientMargin,
    LotValidation,
    BrokerError,
}

/// Outcome recorded by `PendingOrderManager::record_outcome` (spec
/// §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingOutcome {
    Filled,
    Rejected,
    TimedOut,
    ForceClosed,
}

/// Tick-stream filtering discipline (spec GLOSSARY "Data mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Clean,
    Realistic,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarType {
    Real,
    Synthetic,
}

/// Gap classification for tick-timeline coverage reports (spec §4.9
/// Phase 0.5), grounded on `bog-core::engine::gap_recovery`'s
/// gap-severity bucketing idiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapCategory {
    Seamless,
    Short,
    Moderate,
    Weekend,
    Large,
}

impl GapCategory {
    /// Classify a gap given its duration in seconds, per spec §4.9
    /// thresholds: SEAMLESS (<5s), SHORT (5s-30m), MODERATE (30m-4h),
    /// WEEKEND (40-80h), LARGE (>4h and not weekend-shaped).
    pub fn classify(gap_seconds: f64) -> Self {
        const MINUTE: f64 = 60.0;
        const HOUR: f64 = 3600.0;
        if gap_seconds < 5.0 {
            GapCategory::Seamless
        } else if gap_seconds < 30.0 * MINUTE {
            GapCategory::Short
        } else if gap_seconds < 4.0 * HOUR {
            GapCategory::Moderate
        } else if (40.0 * HOUR..=80.0 * HOUR).contains(&gap_seconds) {
            GapCategory::Weekend
        } else {
            GapCategory::Large
        }
    }
}
