//! Post-close audit record for a round-trip trade (spec §3
//! `TradeRecord`). Appended once on close; never mutated.

use crate::core::enums::Direction;
use crate::core::ids::PositionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub lots: f64,
    pub digits: u32,
    pub contract_size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_tick_index: u64,
    pub exit_tick_index: u64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub spread_cost: f64,
    pub commission_cost: f64,
    pub swap_cost: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub tick_value: f64,
    pub account_currency: String,
}
