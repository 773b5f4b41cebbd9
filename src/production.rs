use serde::Serialize;

use crate::ledger::Ledger;
use crate::types::Good;

/// A farm or smithy: emits a fixed batch every `cycle_interval` seconds.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionUnit {
    pub output_per_cycle: f64,
    pub cycle_interval: f64,
    elapsed: f64,
}

impl ProductionUnit {
    pub fn new(output_per_cycle: f64, cycle_interval: f64) -> Self {
        Self {
            output_per_cycle,
            cycle_interval,
            elapsed: 0.0,
        }
    }

    /// Advances the timer. Returns the batch when a cycle completes.
    ///
    /// Time past the interval is dropped, not carried into the next cycle.
    pub fn advance(&mut self, delta_time: f64) -> Option<f64> {
        self.elapsed += delta_time;
        if self.elapsed >= self.cycle_interval {
            self.elapsed = 0.0;
            Some(self.output_per_cycle)
        } else {
            None
        }
    }

    /// Fraction of the current cycle completed, for drawing progress bars.
    pub fn progress(&self) -> f64 {
        (self.elapsed / self.cycle_interval).clamp(0.0, 1.0)
    }
}

/// All units at one settlement producing the same good.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionSite {
    pub good: Good,
    pub units: Vec<ProductionUnit>,
}

impl ProductionSite {
    pub fn new(good: Good, units: &[(f64, f64)]) -> Self {
        Self {
            good,
            units: units
                .iter()
                .map(|&(output, interval)| ProductionUnit::new(output, interval))
                .collect(),
        }
    }

    /// Runs every unit and stores finished batches. Returns the amount stored.
    pub fn update(&mut self, ledger: &mut Ledger, delta_time: f64) -> f64 {
        let mut stored = 0.0;
        for unit in self.units.iter_mut() {
            if let Some(batch) = unit.advance(delta_time) {
                stored += ledger.credit(self.good, batch);
            }
        }
        stored
    }

    pub fn progress(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.progress()).collect()
    }
}
