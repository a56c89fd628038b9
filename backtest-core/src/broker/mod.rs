//! Broker configuration (spec §6 "Input: broker configuration").
//!
//! A typed tree the core validates (always-required fields, conditional
//! fields, per-symbol completeness) but never loads from disk itself —
//! reading the JSON off a path is an external collaborator's job (spec
//! §1 OUT OF SCOPE "configuration file loaders").

use crate::core::BacktestError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub broker_info: BrokerInfo,
    pub fee_structure: FeeStructure,
    pub symbols: HashMap<String, SymbolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub company: String,
    pub server: String,
    pub trade_mode: String,
    pub leverage: f64,
    pub hedging_allowed: bool,
    #[serde(default)]
    pub margin_mode: Option<String>,
    #[serde(default)]
    pub margin_call_level: Option<f64>,
    #[serde(default)]
    pub stopout_level: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeModel {
    Spread,
    MakerTaker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeStructure {
    pub model: FeeModel,
    #[serde(default)]
    pub maker_fee: Option<f64>,
    #[serde(default)]
    pub taker_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    pub contract_size: f64,
    pub tick_size: f64,
    pub digits: u32,
    #[serde(default)]
    pub base_currency: Option<String>,
    #[serde(default)]
    pub quote_currency: Option<String>,
    #[serde(default)]
    pub swap_long: Option<f64>,
    #[serde(default)]
    pub swap_short: Option<f64>,
    /// Static conversion rate from this symbol's margin currency into
    /// the account currency. Resolves SPEC_FULL.md Open Question 1:
    /// required whenever the two currencies differ, since this core has
    /// no live rate stream input.
    #[serde(default)]
    pub conversion_rate: Option<f64>,
}

impl SymbolSpec {
    /// Tick value in the symbol's quote currency: the P&L impact of one
    /// price unit at the symbol's `digits` precision, before currency
    /// conversion.
    pub fn raw_tick_value(&self) -> f64 {
        self.contract_size * self.tick_size
    }

    pub fn lot_validation_error(&self, lots: f64) -> Option<String> {
        if lots < self.volume_min {
            return Some(format!("lots {} below volume_min {}", lots, self.volume_min));
        }
        if lots > self.volume_max {
            return Some(format!("lots {} above volume_max {}", lots, self.volume_max));
        }
        let steps = (lots - self.volume_min) / self.volume_step;
        if (steps - steps.round()).abs() > 1e-6 {
            return Some(format!(
                "lots {} not aligned with volume_step {}",
                lots, self.volume_step
            ));
        }
        None
    }
}

impl BrokerConfig {
    /// Validates always-required fields, conditional fields (margin
    /// fields required iff leverage > 1; maker/taker fees required iff
    /// model = maker_taker), and per-symbol completeness.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.symbols.is_empty() {
            return Err(BacktestError::InvalidConfig(
                "broker config must declare at least one symbol".into(),
            ));
        }

        if self.broker_info.leverage > 1.0 && self.broker_info.margin_mode.is_none() {
            return Err(BacktestError::InvalidConfig(
                "margin_mode is required when leverage > 1".into(),
            ));
        }

        match self.fee_structure.model {
            FeeModel::MakerTaker => {
                if self.fee_structure.maker_fee.is_none() || self.fee_structure.taker_fee.is_none()
                {
                    return Err(BacktestError::InvalidConfig(
                        "maker_fee and taker_fee are required when fee model is maker_taker"
                            .into(),
                    ));
                }
            }
            FeeModel::Spread => {}
        }

        for (name, spec) in &self.symbols {
            if spec.volume_min <= 0.0 || spec.volume_step <= 0.0 {
                return Err(BacktestError::InvalidConfig(format!(
                    "symbol {name}: volume_min and volume_step must be positive"
                )));
            }
            if spec.volume_max < spec.volume_min {
                return Err(BacktestError::InvalidConfig(format!(
                    "symbol {name}: volume_max below volume_min"
                )));
            }
            if spec.contract_size <= 0.0 || spec.tick_size <= 0.0 {
                return Err(BacktestError::InvalidConfig(format!(
                    "symbol {name}: contract_size and tick_size must be positive"
                )));
            }
        }

        Ok(())
    }

    pub fn symbol(&self, name: &str) -> Result<&SymbolSpec, BacktestError> {
        self.symbols
            .get(name)
            .ok_or_else(|| BacktestError::InvalidConfig(format!("unknown symbol: {name}")))
    }
}
