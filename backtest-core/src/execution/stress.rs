//! Stress injection for open orders (spec §4.4.4).

use crate::core::BacktestError;
use crate::rng::SeededGenerator;

/// `reject_open_order{enabled, seed, probability}` from the scenario's
/// execution config. Determinism: the same seed plus the same order
/// sequence produces an identical rejection pattern across runs,
/// languages and platforms.
pub struct StressConfig {
    pub enabled: bool,
    pub probability: f64,
    rng: SeededGenerator,
}

impl StressConfig {
    pub fn new(enabled: bool, seed: u64, probability: f64) -> Self {
        Self {
            enabled,
            probability,
            rng: SeededGenerator::new(seed),
        }
    }

    pub(super) fn fires(&mut self) -> Result<bool, BacktestError> {
        self.rng.next_bool(self.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_rejection_pattern() {
        let mut a = StressConfig::new(true, 7, 0.4);
        let mut b = StressConfig::new(true, 7, 0.4);
        for _ in 0..100 {
            assert_eq!(a.fires().unwrap(), b.fires().unwrap());
        }
    }
}
