//! A confirmed open exposure held in the portfolio (spec §3 `Position`).

use crate::core::enums::{Direction, OrderType};
use crate::core::ids::PositionId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub position_id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub lots: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_tick_index: u64,
    pub entry_type: OrderType,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub contract_size: f64,
    pub digits: u32,
    pub tick_value: f64,
    pub commission_accrued: f64,
    pub spread_accrued: f64,
    pub swap_accrued: f64,
    pub margin_reserved: f64,
}

impl Position {
    /// SL/TP trigger check against the current bid/ask, per spec
    /// §4.4.1: LONG SL triggers on `bid <= sl`, LONG TP on `bid >= tp`;
    /// SHORT SL triggers on `ask >= sl`, SHORT TP on `ask <= tp`.
    pub fn sl_tp_trigger(&self, bid: f64, ask: f64) -> Option<TriggerKind> {
        match self.direction {
            Direction::Long => {
                if let Some(sl) = self.stop_loss {
                    if bid <= sl {
                        return Some(TriggerKind::StopLoss);
                    }
                }
                if let Some(tp) = self.take_profit {
                    if bid >= tp {
                        return Some(TriggerKind::TakeProfit);
                    }
                }
            }
            Direction::Short => {
                if let Some(sl) = self.stop_loss {
                    if ask >= sl {
                        return Some(TriggerKind::StopLoss);
                    }
                }
                if let Some(tp) = self.take_profit {
                    if ask <= tp {
                        return Some(TriggerKind::TakeProfit);
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    StopLoss,
    TakeProfit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::OrderId;

    fn long_position(sl: Option<f64>, tp: Option<f64>) -> Position {
        Position {
            position_id: PositionId::from_opening_order(OrderId::new(1)),
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            lots: 1.0,
            entry_price: 1.1000,
            entry_time: Utc::now(),
            entry_tick_index: 0,
            entry_type: OrderType::Market,
            stop_loss: sl,
            take_profit: tp,
            contract_size: 100_000.0,
            digits: 4,
            tick_value: 1.0,
            commission_accrued: 0.0,
            spread_accrued: 0.0,
            swap_accrued: 0.0,
            margin_reserved: 0.0,
        }
    }

    #[test]
    fn long_sl_triggers_on_bid_at_or_below() {
        let pos = long_position(Some(1.0950), None);
        assert_eq!(pos.sl_tp_trigger(1.0950, 1.0952), Some(TriggerKind::StopLoss));
        assert_eq!(pos.sl_tp_trigger(1.0960, 1.0962), None);
    }

    #[test]
    fn long_tp_triggers_on_bid_at_or_above() {
        let pos = long_position(None, Some(1.1100));
        assert_eq!(pos.sl_tp_trigger(1.1100, 1.1102), Some(TriggerKind::TakeProfit));
    }
}
