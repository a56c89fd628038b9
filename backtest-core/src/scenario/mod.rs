//! Typed scenario-set configuration and the global/scenario cascade
//! merge (spec §6 "Input: scenario configuration").
//!
//! Grounded on `bog-core::config::types`'s serde-derived config tree with
//! `#[serde(default)]` leaf defaults, and `bog-core::config::mod::Config
//! ::validate` for the `validate()` shape. The core owns parsing a
//! `serde_json` value into this tree and cascade-merging it; it does not
//! own reading that JSON off disk or argv (spec §1 OUT OF SCOPE
//! "configuration file loaders", "CLI argument parsing surfaces") — that
//! is a host binary's job.

pub mod coverage;
pub mod orchestrator;

use crate::core::enums::DataMode;
use crate::core::BacktestError;
use crate::market::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type WorkerParams = HashMap<String, f64>;

/// Default bar interval subscribed when a scenario doesn't name one.
fn default_timeframes() -> Vec<u32> {
    vec![60]
}

fn default_warmup_bars() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub decision_logic_type: String,
    /// instance_name -> worker_type. Global-only: cascade merge never
    /// lets a scenario override the architecture, only its parameters
    /// (spec §6 "worker_instances ... is global-only").
    pub worker_instances: HashMap<String, String>,
    #[serde(default)]
    pub workers: HashMap<String, WorkerParams>,
    #[serde(default)]
    pub decision_logic_config: HashMap<String, f64>,
    /// Bar intervals (seconds) the `TickLoop`'s `BarRenderer` subscribes
    /// to for this scenario; not named explicitly in spec §6 but implied
    /// by `TickLoop`'s per-timeframe bar aggregation (spec §4.8).
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<u32>,
}

impl StrategyConfig {
    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.timeframes.iter().map(|secs| Timeframe(*secs)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub parallel_workers: usize,
    pub worker_parallel_threshold_ms: f64,
    #[serde(default)]
    pub strict_parameter_validation: bool,
    /// Warmup bars requested ahead of `start_time` (spec §4.9 Phase 1
    /// "load ... warmup bars").
    #[serde(default = "default_warmup_bars")]
    pub warmup_bars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seeds {
    pub api_latency_seed: u64,
    pub market_execution_seed: u64,
}

fn default_latency_range() -> (u32, u32) {
    (2, 10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSimulatorConfig {
    pub broker_config_ref: String,
    pub initial_balance: f64,
    pub currency: String,
    pub seeds: Seeds,
    /// Inclusive tick-delay bounds for `api_latency`/`market_execution`
    /// (spec §4.2.1 "defaults documented as a range in ticks, e.g. 2-10").
    #[serde(default = "default_latency_range")]
    pub api_latency_range: (u32, u32),
    #[serde(default = "default_latency_range")]
    pub market_execution_range: (u32, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectOpenOrderConfig {
    pub enabled: bool,
    pub seed: u64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestConfig {
    pub reject_open_order: RejectOpenOrderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub strategy_config: StrategyConfig,
    pub execution_config: ExecutionConfig,
    pub trade_simulator_config: TradeSimulatorConfig,
    #[serde(default)]
    pub stress_test_config: Option<StressTestConfig>,
}

/// Per-scenario per-parameter merge with global, everything optional
/// (spec §6 "optional per-scenario overrides (per-parameter merge with
/// global)"). `worker_instances` has deliberately no override slot here:
/// the type alone enforces the global-only rule spec §6 requires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfigOverride {
    #[serde(default)]
    pub workers: Option<HashMap<String, WorkerParams>>,
    #[serde(default)]
    pub decision_logic_config: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub timeframes: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfigOverride {
    #[serde(default)]
    pub parallel_workers: Option<usize>,
    #[serde(default)]
    pub worker_parallel_threshold_ms: Option<f64>,
    #[serde(default)]
    pub strict_parameter_validation: Option<bool>,
    #[serde(default)]
    pub warmup_bars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeSimulatorConfigOverride {
    #[serde(default)]
    pub broker_config_ref: Option<String>,
    #[serde(default)]
    pub initial_balance: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioOverrides {
    #[serde(default)]
    pub strategy_config: Option<StrategyConfigOverride>,
    #[serde(default)]
    pub execution_config: Option<ExecutionConfigOverride>,
    #[serde(default)]
    pub trade_simulator_config: Option<TradeSimulatorConfigOverride>,
    #[serde(default)]
    pub stress_test_config: Option<StressTestConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub max_ticks: Option<u64>,
    #[serde(default)]
    pub data_mode: DataMode,
    #[serde(default)]
    pub overrides: ScenarioOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSetConfig {
    pub version: String,
    pub scenario_set_name: String,
    pub global: GlobalConfig,
    pub scenarios: Vec<ScenarioDef>,
}

/// One scenario's fully cascade-merged, validated configuration — what
/// the orchestrator hands each worker (spec §4.9 Phase 2 "deserializes
/// the scenario config").
#[derive(Debug, Clone)]
pub struct ResolvedScenario {
    pub index: usize,
    pub name: String,
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_ticks: Option<u64>,
    pub data_mode: DataMode,
    pub strategy_config: StrategyConfig,
    pub execution_config: ExecutionConfig,
    pub trade_simulator_config: TradeSimulatorConfig,
    pub stress_test_config: Option<StressTestConfig>,
}

impl ScenarioSetConfig {
    /// Cascade-merges `global` with each scenario's overrides and
    /// validates the result, per spec §6's cascade rule: "global
    /// provides defaults, scenarios override per-leaf."
    pub fn resolve(&self) -> Result<Vec<ResolvedScenario>, BacktestError> {
        self.validate_shape()?;
        self.scenarios
            .iter()
            .enumerate()
            .map(|(index, def)| self.resolve_one(index, def))
            .collect()
    }

    fn validate_shape(&self) -> Result<(), BacktestError> {
        if self.scenarios.is_empty() {
            return Err(BacktestError::InvalidConfig("scenario set has no scenarios".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for def in &self.scenarios {
            if !seen.insert(&def.name) {
                return Err(BacktestError::InvalidConfig(format!("duplicate scenario name: {}", def.name)));
            }
            if def.end_time <= def.start_time {
                return Err(BacktestError::InvalidConfig(format!(
                    "scenario {}: end_time must be after start_time",
                    def.name
                )));
            }
        }
        if self.global.strategy_config.worker_instances.is_empty() {
            return Err(BacktestError::InvalidConfig("global.strategy_config.worker_instances must not be empty".into()));
        }
        if self.global.execution_config.parallel_workers == 0 {
            return Err(BacktestError::InvalidConfig("execution_config.parallel_workers must be > 0".into()));
        }
        if self.global.trade_simulator_config.initial_balance <= 0.0 {
            return Err(BacktestError::InvalidConfig("trade_simulator_config.initial_balance must be positive".into()));
        }
        Ok(())
    }

    fn resolve_one(&self, index: usize, def: &ScenarioDef) -> Result<ResolvedScenario, BacktestError> {
        let overrides = &def.overrides;

        let mut strategy_config = self.global.strategy_config.clone();
        if let Some(o) = &overrides.strategy_config {
            if let Some(workers) = &o.workers {
                strategy_config.workers = workers.clone();
            }
            if let Some(cfg) = &o.decision_logic_config {
                strategy_config.decision_logic_config = cfg.clone();
            }
            if let Some(tfs) = &o.timeframes {
                strategy_config.timeframes = tfs.clone();
            }
        }

        let mut execution_config = self.global.execution_config.clone();
        if let Some(o) = &overrides.execution_config {
            if let Some(v) = o.parallel_workers {
                execution_config.parallel_workers = v;
            }
            if let Some(v) = o.worker_parallel_threshold_ms {
                execution_config.worker_parallel_threshold_ms = v;
            }
            if let Some(v) = o.strict_parameter_validation {
                execution_config.strict_parameter_validation = v;
            }
            if let Some(v) = o.warmup_bars {
                execution_config.warmup_bars = v;
            }
        }

        let mut trade_simulator_config = self.global.trade_simulator_config.clone();
        if let Some(o) = &overrides.trade_simulator_config {
            if let Some(v) = &o.broker_config_ref {
                trade_simulator_config.broker_config_ref = v.clone();
            }
            if let Some(v) = o.initial_balance {
                trade_simulator_config.initial_balance = v;
            }
            if let Some(v) = &o.currency {
                trade_simulator_config.currency = v.clone();
            }
        }

        let stress_test_config = overrides.stress_test_config.clone().or_else(|| self.global.stress_test_config.clone());

        if execution_config.parallel_workers == 0 {
            return Err(BacktestError::InvalidConfig(format!("scenario {}: parallel_workers must be > 0", def.name)));
        }
        if trade_simulator_config.initial_balance <= 0.0 {
            return Err(BacktestError::InvalidConfig(format!("scenario {}: initial_balance must be positive", def.name)));
        }
        if let Some(stress) = &stress_test_config {
            if !(0.0..=1.0).contains(&stress.reject_open_order.probability) {
                return Err(BacktestError::InvalidConfig(format!(
                    "scenario {}: stress_test_config.reject_open_order.probability out of [0, 1]",
                    def.name
                )));
            }
        }

        Ok(ResolvedScenario {
            index,
            name: def.name.clone(),
            symbol: def.symbol.clone(),
            start_time: def.start_time,
            end_time: def.end_time,
            max_ticks: def.max_ticks,
            data_mode: def.data_mode,
            strategy_config,
            execution_config,
            trade_simulator_config,
            stress_test_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioSetConfig {
        ScenarioSetConfig {
            version: "1".into(),
            scenario_set_name: "sample".into(),
            global: GlobalConfig {
                strategy_config: StrategyConfig {
                    decision_logic_type: "stub".into(),
                    worker_instances: HashMap::from([("fast_ma".to_string(), "moving_average".to_string())]),
                    workers: HashMap::new(),
                    decision_logic_config: HashMap::new(),
                    timeframes: vec![60],
                },
                execution_config: ExecutionConfig {
                    parallel_workers: 2,
                    worker_parallel_threshold_ms: 1.0,
                    strict_parameter_validation: true,
                    warmup_bars: 50,
                },
                trade_simulator_config: TradeSimulatorConfig {
                    broker_config_ref: "demo_broker".into(),
                    initial_balance: 100_000.0,
                    currency: "USD".into(),
                    seeds: Seeds { api_latency_seed: 1, market_execution_seed: 2 },
                    api_latency_range: (2, 10),
                    market_execution_range: (2, 10),
                },
                stress_test_config: None,
            },
            scenarios: vec![ScenarioDef {
                name: "s1".into(),
                symbol: "EURUSD".into(),
                start_time: "2024-01-01T00:00:00Z".parse().unwrap(),
                end_time: "2024-01-02T00:00:00Z".parse().unwrap(),
                max_ticks: None,
                data_mode: DataMode::Clean,
                overrides: ScenarioOverrides::default(),
            }],
        }
    }

    #[test]
    fn resolve_inherits_global_leaves_unchanged() {
        let resolved = sample().resolve().unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].execution_config.parallel_workers, 2);
        assert_eq!(resolved[0].trade_simulator_config.initial_balance, 100_000.0);
    }

    #[test]
    fn scenario_override_replaces_only_named_leaf() {
        let mut cfg = sample();
        cfg.scenarios[0].overrides.trade_simulator_config = Some(TradeSimulatorConfigOverride {
            broker_config_ref: None,
            initial_balance: Some(50_000.0),
            currency: None,
        });
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved[0].trade_simulator_config.initial_balance, 50_000.0);
        assert_eq!(resolved[0].trade_simulator_config.broker_config_ref, "demo_broker");
    }

    #[test]
    fn duplicate_scenario_names_are_rejected() {
        let mut cfg = sample();
        let dup = cfg.scenarios[0].clone();
        cfg.scenarios.push(dup);
        assert!(matches!(cfg.resolve().unwrap_err(), BacktestError::InvalidConfig(_)));
    }

    #[test]
    fn empty_worker_instances_is_rejected() {
        let mut cfg = sample();
        cfg.global.strategy_config.worker_instances.clear();
        assert!(cfg.resolve().is_err());
    }
}
