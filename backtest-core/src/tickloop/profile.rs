//! Per-stage timing captured across a scenario's ticks (spec §4.8
//! "Per-stage timing is captured into a ProfileTable").

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Executor,
    Bars,
    Workers,
    DecisionCompute,
    DecisionExecute,
}

impl Stage {
    const ALL: [Stage; 5] = [
        Stage::Executor,
        Stage::Bars,
        Stage::Workers,
        Stage::DecisionCompute,
        Stage::DecisionExecute,
    ];

    fn index(self) -> usize {
        match self {
            Stage::Executor => 0,
            Stage::Bars => 1,
            Stage::Workers => 2,
            Stage::DecisionCompute => 3,
            Stage::DecisionExecute => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StageTotals {
    total: Duration,
    count: u64,
}

/// Running per-stage totals over a scenario's lifetime; summarized into
/// averages on demand rather than kept as a raw sample series, since
/// only the aggregate matters for the batch report.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    totals: [StageTotals; 5],
}

impl ProfileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let entry = &mut self.totals[stage.index()];
        entry.total += elapsed;
        entry.count += 1;
    }

    pub fn total(&self, stage: Stage) -> Duration {
        self.totals[stage.index()].total
    }

    pub fn average(&self, stage: Stage) -> Duration {
        let entry = self.totals[stage.index()];
        if entry.count == 0 {
            Duration::ZERO
        } else {
            entry.total / entry.count as u32
        }
    }

    pub fn grand_total(&self) -> Duration {
        Stage::ALL.iter().map(|s| self.total(*s)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_per_stage_independently() {
        let mut table = ProfileTable::new();
        table.record(Stage::Executor, Duration::from_micros(10));
        table.record(Stage::Executor, Duration::from_micros(30));
        table.record(Stage::Bars, Duration::from_micros(5));
        assert_eq!(table.total(Stage::Executor), Duration::from_micros(40));
        assert_eq!(table.average(Stage::Executor), Duration::from_micros(20));
        assert_eq!(table.total(Stage::Bars), Duration::from_micros(5));
        assert_eq!(table.total(Stage::Workers), Duration::ZERO);
    }

    #[test]
    fn grand_total_sums_every_stage() {
        let mut table = ProfileTable::new();
        table.record(Stage::Executor, Duration::from_millis(1));
        table.record(Stage::Workers, Duration::from_millis(2));
        assert_eq!(table.grand_total(), Duration::from_millis(3));
    }
}
