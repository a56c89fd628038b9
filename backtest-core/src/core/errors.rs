//! Error taxonomy (spec §7). Kinds, not exception types: each variant
//! says how fatal it is in its doc comment so callers know whether to
//! abort the scenario or just record the outcome and continue.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BacktestError {
    /// Validation failure at scenario startup. Fatal for that scenario;
    /// the batch continues if other scenarios are valid.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Gap inside `start_time`, a forbidden gap category in the tick
    /// stretch, or synthetic bars in strict warmup. Fatal for that
    /// scenario.
    #[error("data quality: {0}")]
    DataQuality(String),

    /// Non-fatal: recorded as REJECTED in order_history.
    #[error("insufficient margin: required {required:.2}, free {free:.2}")]
    InsufficientMargin { required: f64, free: f64 },

    /// Non-fatal: lots outside [volume_min, volume_max] or not aligned
    /// to volume_step.
    #[error("lot validation failed: {0}")]
    LotValidation(String),

    /// Non-fatal: stress-injected or (live) real broker rejection.
    #[error("broker error: {0}")]
    BrokerError(String),

    /// Non-fatal: close referenced an unknown position_id; the close is
    /// a no-op.
    #[error("position not found: {0}")]
    PositionNotFound(String),

    /// DecisionLogic required an undeclared order type, referenced a
    /// missing worker instance, or supplied an out-of-range parameter in
    /// strict mode. Fatal for that scenario.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Math/shape invariant violated. Fatal for that scenario.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl BacktestError {
    /// Whether this error kind aborts the owning scenario (vs. being
    /// recorded and the loop continuing), per spec §7 "Propagation
    /// policy".
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BacktestError::InvalidConfig(_)
                | BacktestError::DataQuality(_)
                | BacktestError::ContractViolation(_)
                | BacktestError::InternalInvariant(_)
        )
    }
}
