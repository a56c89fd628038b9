//! The pluggable strategy boundary (spec §4.7 `DecisionLogic`).
//!
//! Grounded on `bog-core::strategy::mod`'s two-phase
//! compute/generate-signal split and `bog-core::engine::traits`'s narrow
//! executor-facing trait, generalized from the teacher's single
//! hardcoded market-maker strategy to an arbitrary external
//! `DecisionLogic` the core only hosts the contract for (spec §1 OUT OF
//! SCOPE "the concrete indicator algorithms" — and, by extension, any
//! concrete trading strategy; spec Non-goals "does not ... implement
//! specific indicators or strategies").

use crate::core::enums::{Direction, OrderType};
use crate::core::ids::{OrderId, PositionId};
use crate::core::BacktestError;
use crate::execution::{ExecutionCore, Sentinel};
use crate::market::Tick;
use crate::workers::WorkerResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Buy,
    Sell,
    Flat,
}

/// Produced by `compute()`, pure, no side effects; consumed the same
/// tick by `execute()`.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: DecisionAction,
    pub confidence: f64,
    pub reason: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// A worker parameter's validation schema, checked against
/// `ScenarioConfig.strategy_config.workers` at scenario init (spec
/// §4.7 "all declared worker parameters satisfy each worker's parameter
/// schema").
#[derive(Debug, Clone)]
pub struct ParamSchema {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: Option<Vec<f64>>,
}

impl ParamSchema {
    pub fn validate(&self, value: Option<f64>) -> Result<(), BacktestError> {
        let Some(v) = value else {
            return if self.required {
                Err(BacktestError::ContractViolation("required parameter missing".into()))
            } else {
                Ok(())
            };
        };
        if let Some(min) = self.min {
            if v < min {
                return Err(BacktestError::ContractViolation(format!("{v} below minimum {min}")));
            }
        }
        if let Some(max) = self.max {
            if v > max {
                return Err(BacktestError::ContractViolation(format!("{v} above maximum {max}")));
            }
        }
        if let Some(choices) = &self.choices {
            if !choices.iter().any(|c| (*c - v).abs() < 1e-9) {
                return Err(BacktestError::ContractViolation(format!("{v} not among allowed choices")));
            }
        }
        Ok(())
    }
}

/// Thin facade over `ExecutionCore` handed to `DecisionLogic::execute`,
/// narrowing its surface to the order-issuing operations a strategy
/// actually needs (spec §4.6 "a thin facade over ExecutionCore").
pub struct TradingApi<'a> {
    executor: &'a mut dyn ExecutionCore,
}

impl<'a> TradingApi<'a> {
    pub fn new(executor: &'a mut dyn ExecutionCore) -> Self {
        Self { executor }
    }

    pub fn open_market_order(
        &mut self,
        direction: Direction,
        lots: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        comment: Option<String>,
    ) -> Result<OrderId, BacktestError> {
        self.executor
            .open_order(OrderType::Market, direction, lots, None, None, stop_loss, take_profit, comment)
    }

    pub fn open_limit_order(
        &mut self,
        direction: Direction,
        lots: f64,
        limit_price: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        comment: Option<String>,
    ) -> Result<OrderId, BacktestError> {
        self.executor.open_order(
            OrderType::Limit,
            direction,
            lots,
            Some(limit_price),
            None,
            stop_loss,
            take_profit,
            comment,
        )
    }

    pub fn close_position(&mut self, position_id: PositionId) -> Result<OrderId, BacktestError> {
        self.executor.close_position(position_id)
    }
}

/// Behavior every strategy plugs into the core (spec §4.7). The core
/// only hosts this contract and validates it at scenario init; no
/// concrete implementation ships as product code (see the `testing`
/// feature for fixtures used by integration tests).
pub trait DecisionLogic: Send {
    /// instance_name -> worker_type, the exact contract
    /// `ScenarioConfig.strategy_config.worker_instances` must satisfy.
    fn required_worker_instances(&self) -> HashMap<String, String>;

    /// Order types this strategy may issue; validated at startup,
    /// mismatch aborts the scenario.
    fn required_order_types(&self) -> Vec<OrderType>;

    /// Parameter schema per worker instance name, checked against
    /// configured worker params at scenario init.
    fn worker_param_schema(&self) -> HashMap<String, HashMap<String, ParamSchema>> {
        HashMap::new()
    }

    /// Pure: no side effects, no order issuance.
    fn compute(&mut self, tick: &Tick, worker_results: &[WorkerResult]) -> Decision;

    /// May call the TradingAPI to issue orders based on `decision`.
    fn execute(&mut self, decision: &Decision, tick: &Tick, api: &mut TradingApi<'_>) -> Result<(), BacktestError>;
}

/// Checks a scenario's declared worker instances/types/order types
/// against what a `DecisionLogic` requires (spec §4.7 validation).
pub fn validate_contract(
    logic: &dyn DecisionLogic,
    configured_instances: &HashMap<String, String>,
    configured_order_types: &[OrderType],
) -> Result<(), BacktestError> {
    let required = logic.required_worker_instances();
    for (name, worker_type) in &required {
        match configured_instances.get(name) {
            Some(configured_type) if configured_type == worker_type => {}
            Some(other) => {
                return Err(BacktestError::ContractViolation(format!(
                    "worker instance '{name}' configured as '{other}', decision logic requires '{worker_type}'"
                )));
            }
            None => {
                return Err(BacktestError::ContractViolation(format!(
                    "decision logic requires worker instance '{name}' of type '{worker_type}', not configured"
                )));
            }
        }
    }

    for required_type in logic.required_order_types() {
        if !configured_order_types.contains(&required_type) {
            return Err(BacktestError::ContractViolation(format!(
                "decision logic uses order type {required_type:?} not declared in execution_config"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;

    impl DecisionLogic for Stub {
        fn required_worker_instances(&self) -> HashMap<String, String> {
            HashMap::from([("fast_ma".to_string(), "moving_average".to_string())])
        }

        fn required_order_types(&self) -> Vec<OrderType> {
            vec![OrderType::Market]
        }

        fn compute(&mut self, tick: &Tick, _worker_results: &[WorkerResult]) -> Decision {
            Decision {
                action: DecisionAction::Flat,
                confidence: 0.0,
                reason: "stub".into(),
                price: tick.mid(),
                timestamp: tick.timestamp,
            }
        }

        fn execute(&mut self, _decision: &Decision, _tick: &Tick, _api: &mut TradingApi<'_>) -> Result<(), BacktestError> {
            Ok(())
        }
    }

    #[test]
    fn contract_validation_rejects_missing_worker_instance() {
        let logic = Stub;
        let err = validate_contract(&logic, &HashMap::new(), &[OrderType::Market]).unwrap_err();
        assert!(matches!(err, BacktestError::ContractViolation(_)));
    }

    #[test]
    fn contract_validation_rejects_undeclared_order_type() {
        let logic = Stub;
        let instances = HashMap::from([("fast_ma".to_string(), "moving_average".to_string())]);
        let err = validate_contract(&logic, &instances, &[]).unwrap_err();
        assert!(matches!(err, BacktestError::ContractViolation(_)));
    }

    #[test]
    fn contract_validation_passes_when_satisfied() {
        let logic = Stub;
        let instances = HashMap::from([("fast_ma".to_string(), "moving_average".to_string())]);
        assert!(validate_contract(&logic, &instances, &[OrderType::Market]).is_ok());
    }

    #[test]
    fn param_schema_enforces_bounds_and_choices() {
        let schema = ParamSchema { required: true, min: Some(1.0), max: Some(10.0), choices: None };
        assert!(schema.validate(Some(5.0)).is_ok());
        assert!(schema.validate(Some(0.5)).is_err());
        assert!(schema.validate(None).is_err());
    }
}
