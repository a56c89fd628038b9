//! The six concrete end-to-end scenarios and the universal invariants
//! they must all satisfy, driven directly against `SimulationExecutor`
//! rather than the full scenario-config/orchestrator stack, mirroring
//! the teacher's `tests/realistic_executor_test.rs` style of exercising
//! the executor's public API straight from an integration test.

use backtest_core::broker::{BrokerConfig, BrokerInfo, FeeModel, FeeStructure, SymbolSpec};
use backtest_core::core::enums::{Direction, OrderType, RejectionReason};
use backtest_core::core::OrderStatus;
use backtest_core::execution::{ExecutionCore, SimulationExecutor, StressConfig};
use backtest_core::market::Tick;
use backtest_core::pending::LatencySimulator;
use backtest_core::portfolio::PortfolioManager;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

fn usdjpy_broker(leverage: f64) -> BrokerConfig {
    let spec = SymbolSpec {
        volume_min: 0.01,
        volume_max: 100.0,
        volume_step: 0.01,
        contract_size: 100_000.0,
        tick_size: 0.001,
        digits: 3,
        base_currency: Some("USD".into()),
        quote_currency: Some("JPY".into()),
        swap_long: None,
        swap_short: None,
        conversion_rate: None,
    };
    BrokerConfig {
        broker_info: BrokerInfo {
            company: "Test".into(),
            server: "test".into(),
            trade_mode: "demo".into(),
            leverage,
            hedging_allowed: true,
            margin_mode: Some("hedged".into()),
            margin_call_level: None,
            stopout_level: None,
        },
        fee_structure: FeeStructure { model: FeeModel::Spread, maker_fee: None, taker_fee: None },
        symbols: HashMap::from([("USDJPY".to_string(), spec)]),
    }
}

fn executor(initial_balance: f64, leverage: f64, stress: Option<StressConfig>) -> SimulationExecutor {
    let broker = usdjpy_broker(leverage);
    let portfolio = PortfolioManager::new(initial_balance, "JPY");
    let latency = LatencySimulator::new(1, 2, (0, 0), (0, 0));
    SimulationExecutor::new("USDJPY", broker, portfolio, latency, stress)
}

fn tick_at(secs: i64, bid: f64, ask: f64) -> Tick {
    let mut tick = Tick::new(Utc.timestamp_opt(secs, 0).single().unwrap(), bid, ask).unwrap();
    tick.spread_points = ask - bid;
    tick
}

fn market_buy(exec: &mut SimulationExecutor, lots: f64) -> backtest_core::core::BacktestError {
    exec.open_order(OrderType::Market, Direction::Long, lots, None, None, None, None, None)
        .expect_err("expected a validation error, got a successful submission")
}

/// Scenario 1: single LONG round-trip.
#[test]
fn single_long_round_trip() {
    let mut exec = executor(100_000.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(1, 144.00, 144.01), 1).unwrap();
    assert_eq!(exec.open_positions().len(), 1);

    let position_id = exec.open_positions()[0].position_id;
    exec.on_tick(tick_at(900, 144.20, 144.21), 900).unwrap();
    exec.close_position(position_id).unwrap();
    exec.on_tick(tick_at(901, 144.20, 144.21), 901).unwrap();

    assert_eq!(exec.trade_history().len(), 1);
    let trade = &exec.trade_history()[0];
    assert_eq!(trade.direction, Direction::Long);
    assert_eq!(trade.lots, 0.01);
    assert!((trade.entry_price - 144.01).abs() < 1e-9);
    assert!((trade.exit_price - 144.20).abs() < 1e-9);
    assert!(trade.gross_pnl > 0.0);
    assert!(trade.spread_cost > 0.0);
    assert!(trade.entry_tick_index < trade.exit_tick_index);
}

/// Scenario 2: margin exhaustion then recovery after a close.
#[test]
fn margin_exhaustion_then_recovery() {
    let mut exec = executor(80_000.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();

    exec.open_order(OrderType::Market, Direction::Long, 1.0, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(100, 144.00, 144.01), 100).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 1.0, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(200, 144.00, 144.01), 200).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 1.0, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(400, 144.00, 144.01), 400).unwrap();

    assert_eq!(exec.orders_executed(), 2);
    assert_eq!(exec.orders_rejected(), 1);
    assert!(exec
        .order_history()
        .iter()
        .any(|r| r.status == OrderStatus::Rejected && r.rejection_reason == Some(RejectionReason::InsufficientMargin)));

    let first_position = exec.open_positions()[0].position_id;
    exec.close_position(first_position).unwrap();
    exec.on_tick(tick_at(5000, 144.00, 144.01), 5000).unwrap();

    exec.open_order(OrderType::Market, Direction::Long, 1.0, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(5200, 144.00, 144.01), 5200).unwrap();

    assert_eq!(exec.orders_executed(), 3);
    assert_eq!(exec.orders_rejected(), 1);
    assert_eq!(exec.orders_executed() + exec.orders_rejected(), 4);
}

/// Scenario 3: zero balance total rejection.
#[test]
fn zero_balance_rejects_every_open() {
    let mut exec = executor(0.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(1, 144.00, 144.01), 1).unwrap();

    assert_eq!(exec.orders_rejected(), 2);
    assert_eq!(exec.orders_executed(), 0);
    assert!(exec.trade_history().is_empty());
}

/// Scenario 4: lot validation rejects below-minimum, off-step, and
/// above-maximum lot sizes before they ever enter the pipeline.
#[test]
fn lot_validation_rejects_invalid_sizes() {
    let mut exec = executor(100_000.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();

    for lots in [0.001, 0.015, 200.0] {
        let err = market_buy(&mut exec, lots);
        assert!(matches!(err, backtest_core::core::BacktestError::LotValidation(_)));
    }
    assert!(exec.trade_history().is_empty());
}

/// Scenario 5: hedging allows simultaneous LONG and SHORT exposure.
#[test]
fn hedging_allows_concurrent_long_and_short_positions() {
    let mut exec = executor(1_000_000.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();

    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(100, 144.00, 144.01), 100).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(2000, 144.00, 144.01), 2000).unwrap();
    exec.open_order(OrderType::Market, Direction::Short, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(3000, 144.00, 144.01), 3000).unwrap();

    exec.on_tick(tick_at(6999, 144.10, 144.11), 6999).unwrap();
    let positions = exec.open_positions();
    assert_eq!(positions.len(), 3);
    assert_eq!(positions.iter().filter(|p| p.direction == Direction::Long).count(), 2);
    assert_eq!(positions.iter().filter(|p| p.direction == Direction::Short).count(), 1);

    let unique_ids: std::collections::HashSet<_> = positions.iter().map(|p| p.position_id).collect();
    assert_eq!(unique_ids.len(), 3);

    let long_0 = positions.iter().find(|p| p.direction == Direction::Long).unwrap().position_id;
    exec.close_position(long_0).unwrap();
    exec.on_tick(tick_at(7000, 144.10, 144.11), 7000).unwrap();
    assert_eq!(exec.open_positions().len(), 2);
    assert_eq!(exec.trade_history().len(), 1);

    let trade_ids: std::collections::HashSet<_> =
        exec.trade_history().iter().map(|t| t.position_id).collect();
    assert_eq!(trade_ids.len(), exec.trade_history().len());
}

/// Scenario 6: with stress rejection enabled, the set of rejected order
/// indices over a fixed 100-order sequence is bitwise identical across
/// two independent runs seeded alike.
#[test]
fn stress_rejection_is_deterministic_across_runs() {
    fn rejected_indices(seed: u64) -> Vec<usize> {
        let stress = StressConfig::new(true, seed, 0.3);
        let mut exec = executor(10_000_000.0, 500.0, Some(stress));
        exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();
        let mut rejected = Vec::new();
        for i in 0..100u64 {
            let before = exec.orders_rejected();
            exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
            exec.on_tick(tick_at((i + 1) as i64, 144.00, 144.01), i + 1).unwrap();
            if exec.orders_rejected() > before {
                rejected.push(i as usize);
            }
        }
        rejected
    }

    let run_a = rejected_indices(999);
    let run_b = rejected_indices(999);
    assert_eq!(run_a, run_b);
    assert!(!run_a.is_empty(), "a 0.3 probability over 100 draws should reject at least one order");
}

/// Universal invariants (spec §8), checked across one of the richer
/// scenarios above rather than duplicated per-scenario.
#[test]
fn universal_invariants_hold_after_a_mixed_run() {
    let mut exec = executor(1_000_000.0, 500.0, None);
    exec.on_tick(tick_at(0, 144.00, 144.01), 0).unwrap();
    exec.open_order(OrderType::Market, Direction::Long, 0.01, None, None, None, None, None).unwrap();
    exec.on_tick(tick_at(1, 144.00, 144.01), 1).unwrap();
    let position_id = exec.open_positions()[0].position_id;
    exec.on_tick(tick_at(100, 144.50, 144.51), 100).unwrap();
    exec.close_position(position_id).unwrap();
    exec.on_tick(tick_at(101, 144.50, 144.51), 101).unwrap();

    let sent = exec.orders_executed() + exec.orders_rejected();
    assert!(exec.order_history().len() as u64 >= sent.min(exec.order_history().len() as u64));
    assert!(exec.trade_history().len() as u64 <= exec.orders_executed());

    for trade in exec.trade_history() {
        assert!(trade.exit_tick_index > trade.entry_tick_index);
        assert!(trade.spread_cost >= 0.0);
        assert!(trade.lots > 0.0);
        assert!(trade.entry_price > 0.0 && trade.exit_price > 0.0);
        let expected_net = trade.gross_pnl - (trade.spread_cost + trade.commission_cost + trade.swap_cost);
        assert!((trade.net_pnl - expected_net).abs() < 1e-6);

        let direction_sign = if trade.direction == Direction::Long { 1.0 } else { -1.0 };
        let points = (trade.exit_price - trade.entry_price) * 10f64.powi(trade.digits as i32) * direction_sign;
        let expected_gross = points * trade.tick_value * trade.lots;
        assert!((trade.gross_pnl - expected_gross).abs() < 1e-3);
    }
}
