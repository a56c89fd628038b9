//! Deterministic, parameter-centric backtesting engine.
//!
//! The crate is organized the way the engine's own pipeline runs: market
//! data comes in through [`market`], is matched against resting and
//! newly-placed orders by [`pending`] and [`execution`], positions and
//! cash move through [`portfolio`], a tick-by-tick driver in [`tickloop`]
//! wires a symbol's [`workers`] and [`decision`] logic to one
//! [`execution::ExecutionCore`], and [`scenario`] fans a whole scenario
//! set out across that pipeline. [`core`] holds the shared ids, enums
//! and error taxonomy; [`broker`] the account/instrument configuration;
//! [`rng`] the seeded randomness every stochastic subsystem draws from;
//! [`utils`] the ambient logging setup.

pub mod broker;
pub mod core;
pub mod decision;
pub mod execution;
pub mod market;
pub mod pending;
pub mod portfolio;
pub mod rng;
pub mod scenario;
pub mod tickloop;
pub mod utils;
pub mod workers;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-exports the types most call sites need without chasing module
/// paths: the shared error/enum vocabulary, the per-subsystem managers,
/// and the orchestrator entry point.
pub mod prelude {
    pub use crate::broker::{BrokerConfig, BrokerInfo, FeeModel, FeeStructure, SymbolSpec};
    pub use crate::core::{
        BacktestError, BarType, DataMode, Direction, FillType, GapCategory, OrderAction,
        OrderId, OrderStatus, OrderType, PendingOutcome, PositionId, RejectionReason,
    };
    pub use crate::decision::{Decision, DecisionAction, DecisionLogic, ParamSchema, TradingApi};
    pub use crate::execution::{ExecutionCore, OrderResult, SimulationExecutor, StressConfig};
    pub use crate::market::{Bar, BarRenderer, Tick, Timeframe};
    pub use crate::pending::{LatencySimulator, PendingOrderManager, PendingOrderStats};
    pub use crate::portfolio::{PortfolioManager, Position, TradeRecord};
    pub use crate::rng::SeededGenerator;
    pub use crate::scenario::{
        GlobalConfig, ResolvedScenario, ScenarioDef, ScenarioSetConfig, StrategyConfig,
    };
    pub use crate::scenario::coverage::{BarIndexEntry, CoverageCache, CoverageReport};
    pub use crate::scenario::orchestrator::{
        BatchResult, ProcessResult, ScenarioDataSource, ScenarioFactory, ScenarioOrchestrator,
    };
    pub use crate::tickloop::{LiveProgress, ScenarioStatus, TickLoop, TickLoopResult};
    pub use crate::workers::{Worker, WorkerCoordinator, WorkerResult, WorkerValue};
}
