//! Periodic repair of the closed money supply.

use serde::{Deserialize, Serialize};

use crate::agents::{Trader, Villager};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Balanced { total: f64 },
    /// Every holder was scaled by `ratio` to restore the expected total.
    Renormalized { observed: f64, ratio: f64 },
    /// No money left anywhere, so there is nothing to scale.
    Unrecoverable { observed: f64 },
}

/// Checks on a fixed interval that money across both ledgers, the trader and
/// every active villager adds up to the fixed total.
#[derive(Debug, Clone)]
pub struct ConservationAuditor {
    pub total_money: f64,
    pub epsilon: f64,
    pub interval: f64,
    elapsed: f64,
}

impl ConservationAuditor {
    pub fn new(total_money: f64, epsilon: f64, interval: f64) -> Self {
        Self {
            total_money,
            epsilon,
            interval,
            elapsed: 0.0,
        }
    }

    /// Advances the timer. Returns `true` when an audit is due.
    pub fn advance(&mut self, delta_time: f64) -> bool {
        self.elapsed += delta_time;
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }

    pub fn observed_total(
        town: &Ledger,
        village: &Ledger,
        trader: &Trader,
        villagers: &[Villager],
    ) -> f64 {
        town.money()
            + village.money()
            + trader.cargo.money
            + villagers.iter().map(|v| v.money_carried).sum::<f64>()
    }

    pub fn audit(
        &self,
        town: &mut Ledger,
        village: &mut Ledger,
        trader: &mut Trader,
        villagers: &mut [Villager],
    ) -> AuditOutcome {
        let observed = Self::observed_total(town, village, trader, villagers);
        if (observed - self.total_money).abs() <= self.epsilon {
            return AuditOutcome::Balanced { total: observed };
        }
        if observed <= 0.0 {
            return AuditOutcome::Unrecoverable { observed };
        }

        let ratio = self.total_money / observed;
        town.scale_money(ratio);
        village.scale_money(ratio);
        trader.scale_money(ratio);
        for villager in villagers.iter_mut() {
            villager.money_carried *= ratio;
        }
        AuditOutcome::Renormalized { observed, ratio }
    }
}
