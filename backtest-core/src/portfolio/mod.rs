//! Portfolio accounting: balance, equity, margin, open positions and the
//! realized trade ledger (spec §3 `Position`/`TradeRecord`, §4.2
//! `PortfolioManager`).
//!
//! Grounded on `bog-core::risk::types::Position` (Decimal-based PnL
//! bookkeeping) and `bog-core::engine::risk` (margin gating before a
//! signal is allowed through), generalized from a single-symbol BTC
//! market maker to the multi-symbol, multi-position ledger this spec
//! requires.

mod position;
mod trade_record;

pub use position::Position;
pub use trade_record::TradeRecord;

use crate::core::enums::Direction;
use crate::core::ids::{OrderId, PositionId};
use crate::core::BacktestError;
use crate::market::Tick;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

const DEFAULT_TRADE_HISTORY_MAX: usize = 5000;

/// Everything needed to open and later close a position, passed in by
/// the execution core — the portfolio itself never computes fill
/// prices or fees, only margin math and bookkeeping.
pub struct OpenRequest<'a> {
    pub order_id: OrderId,
    pub symbol: &'a str,
    pub direction: Direction,
    pub lots: f64,
    pub entry_price: f64,
    pub entry_time: chrono::DateTime<chrono::Utc>,
    pub entry_tick_index: u64,
    pub entry_type: crate::core::enums::OrderType,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub contract_size: f64,
    pub digits: u32,
    pub tick_value: f64,
    pub entry_fee: f64,
    pub required_margin: f64,
}

pub struct PortfolioManager {
    balance: Decimal,
    margin_used: Decimal,
    account_currency: String,
    last_prices: HashMap<String, Tick>,
    open_positions: HashMap<PositionId, Position>,
    trade_history: VecDeque<TradeRecord>,
    trade_history_max: usize,
    total_spread_cost: Decimal,
    warned_trade_overflow: bool,
}

impl PortfolioManager {
    pub fn new(initial_balance: f64, account_currency: impl Into<String>) -> Self {
        Self::with_trade_history_max(initial_balance, account_currency, DEFAULT_TRADE_HISTORY_MAX)
    }

    pub fn with_trade_history_max(
        initial_balance: f64,
        account_currency: impl Into<String>,
        trade_history_max: usize,
    ) -> Self {
        Self {
            balance: Decimal::try_from(initial_balance).unwrap_or(Decimal::ZERO),
            margin_used: Decimal::ZERO,
            account_currency: account_currency.into(),
            last_prices: HashMap::new(),
            open_positions: HashMap::new(),
            trade_history: VecDeque::new(),
            trade_history_max,
            total_spread_cost: Decimal::ZERO,
            warned_trade_overflow: false,
        }
    }

    pub fn account_currency(&self) -> &str {
        &self.account_currency
    }

    pub fn update_prices(&mut self, tick: Tick, symbol: &str) {
        self.last_prices.insert(symbol.to_string(), tick);
    }

    pub fn balance(&self) -> f64 {
        self.balance.to_f64().unwrap_or(0.0)
    }

    /// Equity = balance + sum of unrealized PnL across open positions,
    /// computed lazily from the last known tick per symbol.
    pub fn equity(&self) -> f64 {
        let unrealized: f64 = self
            .open_positions
            .values()
            .map(|p| self.unrealized_pnl(p))
            .sum();
        self.balance() + unrealized
    }

    pub fn margin_used(&self) -> f64 {
        self.margin_used.to_f64().unwrap_or(0.0)
    }

    pub fn free_margin(&self) -> f64 {
        self.equity() - self.margin_used()
    }

    pub fn total_spread_cost(&self) -> f64 {
        self.total_spread_cost.to_f64().unwrap_or(0.0)
    }

    fn unrealized_pnl(&self, position: &Position) -> f64 {
        let Some(tick) = self.last_prices.get(&position.symbol) else {
            return 0.0;
        };
        let exit_price = match position.direction {
            Direction::Long => tick.bid,
            Direction::Short => tick.ask,
        };
        let points = (exit_price - position.entry_price)
            * 10f64.powi(position.digits as i32)
            * position.direction.sign();
        points * position.tick_value * position.lots
    }

    /// Margin check from spec §4.2:
    /// `required = (lots * contract_size * price) / leverage`, already
    /// pre-converted into account currency by the caller (the execution
    /// core, which knows the symbol spec); the portfolio just compares
    /// against free margin.
    pub fn can_open(&self, required_margin: f64) -> bool {
        required_margin <= self.free_margin()
    }

    pub fn open_position(&mut self, req: OpenRequest<'_>) -> Result<PositionId, BacktestError> {
        if !self.can_open(req.required_margin) {
            return Err(BacktestError::InsufficientMargin {
                required: req.required_margin,
                free: self.free_margin(),
            });
        }

        let position_id = PositionId::from_opening_order(req.order_id);
        let position = Position {
            position_id,
            symbol: req.symbol.to_string(),
            direction: req.direction,
            lots: req.lots,
            entry_price: req.entry_price,
            entry_time: req.entry_time,
            entry_tick_index: req.entry_tick_index,
            entry_type: req.entry_type,
            stop_loss: req.stop_loss,
            take_profit: req.take_profit,
            contract_size: req.contract_size,
            digits: req.digits,
            tick_value: req.tick_value,
            commission_accrued: req.entry_fee,
            spread_accrued: 0.0,
            swap_accrued: 0.0,
            margin_reserved: req.required_margin,
        };

        self.margin_used += Decimal::try_from(req.required_margin).unwrap_or(Decimal::ZERO);
        self.balance -= Decimal::try_from(req.entry_fee).unwrap_or(Decimal::ZERO);
        self.open_positions.insert(position_id, position);
        Ok(position_id)
    }

    pub fn modify_position(
        &mut self,
        position_id: PositionId,
        stop_loss: Option<Option<f64>>,
        take_profit: Option<Option<f64>>,
    ) -> Result<(), BacktestError> {
        let position = self
            .open_positions
            .get_mut(&position_id)
            .ok_or_else(|| BacktestError::PositionNotFound(position_id.to_string()))?;
        if let Some(sl) = stop_loss {
            position.stop_loss = sl;
        }
        if let Some(tp) = take_profit {
            position.take_profit = tp;
        }
        Ok(())
    }

    /// Close a position, realize PnL per spec §3's gross/net formulas,
    /// release margin, and append the resulting `TradeRecord`.
    pub fn close_position(
        &mut self,
        position_id: PositionId,
        exit_price: f64,
        exit_tick_index: u64,
        exit_time: chrono::DateTime<chrono::Utc>,
        exit_commission: f64,
        exit_spread_cost: f64,
        exit_swap: f64,
    ) -> Result<TradeRecord, BacktestError> {
        let position = self
            .open_positions
            .remove(&position_id)
            .ok_or_else(|| BacktestError::PositionNotFound(position_id.to_string()))?;
        let margin_released = position.margin_reserved;

        let points = (exit_price - position.entry_price)
            * 10f64.powi(position.digits as i32)
            * position.direction.sign();
        let gross_pnl = points * position.tick_value * position.lots;

        let spread_cost = position.spread_accrued + exit_spread_cost;
        let commission_cost = position.commission_accrued + exit_commission;
        let swap_cost = position.swap_accrued + exit_swap;
        let net_pnl = gross_pnl - (spread_cost + commission_cost + swap_cost);

        self.margin_used -= Decimal::try_from(margin_released).unwrap_or(Decimal::ZERO);
        self.balance += Decimal::try_from(net_pnl).unwrap_or(Decimal::ZERO);
        self.total_spread_cost += Decimal::try_from(spread_cost).unwrap_or(Decimal::ZERO);

        let record = TradeRecord {
            position_id,
            symbol: position.symbol,
            direction: position.direction,
            lots: position.lots,
            digits: position.digits,
            contract_size: position.contract_size,
            entry_price: position.entry_price,
            exit_price,
            entry_tick_index: position.entry_tick_index,
            exit_tick_index,
            entry_time: position.entry_time,
            exit_time,
            spread_cost,
            commission_cost,
            swap_cost,
            gross_pnl,
            net_pnl,
            tick_value: position.tick_value,
            account_currency: self.account_currency.clone(),
        };
        self.push_trade(record.clone());
        Ok(record)
    }

    fn push_trade(&mut self, record: TradeRecord) {
        if self.trade_history_max != 0 && self.trade_history.len() >= self.trade_history_max {
            self.trade_history.pop_front();
            if !self.warned_trade_overflow {
                warn!(max = self.trade_history_max, "trade history ring overflow, dropping oldest");
                self.warned_trade_overflow = true;
            }
        }
        self.trade_history.push_back(record);
    }

    pub fn get_open_positions(&self) -> Vec<Position> {
        self.open_positions.values().cloned().collect()
    }

    pub fn get_position(&self, position_id: PositionId) -> Option<&Position> {
        self.open_positions.get(&position_id)
    }

    pub fn trade_history(&self) -> &VecDeque<TradeRecord> {
        &self.trade_history
    }

    pub fn total_profit(&self) -> f64 {
        self.trade_history.iter().map(|t| t.net_pnl).filter(|p| *p > 0.0).sum()
    }

    pub fn total_loss(&self) -> f64 {
        self.trade_history.iter().map(|t| t.net_pnl).filter(|p| *p < 0.0).sum::<f64>().abs()
    }
}
