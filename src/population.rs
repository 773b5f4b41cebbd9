//! Population feedback between wealth, stock and depletion.

use rand::Rng;
use serde::Serialize;

use crate::ledger::Ledger;
use crate::scenario::PopulationConfig;

/// Wealth share around which depletion neither rises nor falls.
pub const DEPLETION_WEALTH_PIVOT: f64 = 0.4;
/// Fraction of the population lost per second under famine.
pub const FAMINE_DECLINE: f64 = 0.1;
/// Amplitude of the uniform noise added to the growth signal.
pub const GROWTH_NOISE: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct Population {
    pub base: f64,
    pub current: f64,
    pub growth_rate: f64,
    pub resource_consumption: f64,
    pub min_wealth: f64,
    pub target_wealth: f64,
}

impl Population {
    pub fn new(config: &PopulationConfig) -> Self {
        Self {
            base: config.base,
            current: config.base,
            growth_rate: config.growth_rate,
            resource_consumption: config.resource_consumption,
            min_wealth: config.min_wealth,
            target_wealth: config.target_wealth,
        }
    }

    pub fn floor(&self) -> f64 {
        self.base * 0.1
    }

    pub fn ceiling(&self) -> f64 {
        self.base * 3.0
    }

    /// Advances the population one tick and re-derives the ledger's
    /// depletion rate from the result.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        ledger: &mut Ledger,
        total_money: f64,
        delta_time: f64,
        rng: &mut R,
    ) {
        let wealth = wealth_factor(ledger.money(), total_money);
        let stock = ledger.stock(ledger.settlement.consumed_good());
        let resources = self.resource_factor(stock);

        let delta = if wealth < self.min_wealth {
            -self.current * FAMINE_DECLINE * delta_time
        } else {
            let noise = rng.random_range(-GROWTH_NOISE..GROWTH_NOISE);
            let signal = 2.0 * (wealth - self.target_wealth) + (resources - 1.0) + noise;
            self.current * self.growth_rate * signal * delta_time
        };

        self.current = (self.current + delta).clamp(self.floor(), self.ceiling());
        ledger.depletion_rate = self.depletion_rate(wealth);
    }

    /// How much of the population's need the stock covers, at most 1.
    pub fn resource_factor(&self, stock: f64) -> f64 {
        let need = self.current * self.resource_consumption;
        if need <= 0.0 {
            return 1.0;
        }
        (stock / need).min(1.0)
    }

    pub fn depletion_rate(&self, wealth: f64) -> f64 {
        let rate = self.current
            * self.resource_consumption
            * (1.0 + (DEPLETION_WEALTH_PIVOT - wealth))
            * 0.01;
        rate.max(0.0)
    }
}

pub fn wealth_factor(money: f64, total_money: f64) -> f64 {
    if total_money <= 0.0 {
        return 0.0;
    }
    money / total_money
}
