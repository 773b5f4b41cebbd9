//! Per-settlement stock and treasury.

use serde::Serialize;

use crate::scenario::LedgerConfig;
use crate::types::{Good, Settlement};

/// Stock of goods and money held by one settlement.
///
/// Goods always stay within `[0, max_storage]`; money is floored at zero and
/// has no ceiling.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    pub settlement: Settlement,
    wheat: f64,
    tools: f64,
    money: f64,
    pub depletion_rate: f64,
    /// External depletion rate that wins over the population-derived one.
    pub depletion_override: Option<f64>,
    pub max_storage: f64,
    pub wheat_reserve: f64,
    wheat_market_open: bool,
}

impl Ledger {
    pub fn new(settlement: Settlement, config: &LedgerConfig) -> Self {
        let mut ledger = Self {
            settlement,
            wheat: 0.0,
            tools: 0.0,
            money: config.money.max(0.0),
            depletion_rate: config.depletion_rate.max(0.0),
            depletion_override: None,
            max_storage: config.max_storage,
            wheat_reserve: config.wheat_reserve.max(0.0),
            wheat_market_open: false,
        };
        ledger.wheat = ledger.clamp_good(config.wheat);
        ledger.tools = ledger.clamp_good(config.tools);
        ledger.wheat_market_open = ledger.wheat > ledger.wheat_reserve;
        ledger
    }

    fn clamp_good(&self, amount: f64) -> f64 {
        amount.clamp(0.0, self.max_storage)
    }

    pub fn stock(&self, good: Good) -> f64 {
        match good {
            Good::Wheat => self.wheat,
            Good::Tools => self.tools,
        }
    }

    fn stock_mut(&mut self, good: Good) -> &mut f64 {
        match good {
            Good::Wheat => &mut self.wheat,
            Good::Tools => &mut self.tools,
        }
    }

    pub fn wheat(&self) -> f64 {
        self.wheat
    }

    pub fn tools(&self) -> f64 {
        self.tools
    }

    pub fn money(&self) -> f64 {
        self.money
    }

    /// Free storage for `good`.
    pub fn headroom(&self, good: Good) -> f64 {
        (self.max_storage - self.stock(good)).max(0.0)
    }

    /// Removes `rate * delta_time` of `good`, never going below zero.
    pub fn deplete(&mut self, good: Good, rate: f64, delta_time: f64) {
        let stock = self.stock_mut(good);
        *stock = (*stock - rate * delta_time).max(0.0);
    }

    /// Adds `amount` of `good`, clamped to storage. Returns what was stored.
    pub fn credit(&mut self, good: Good, amount: f64) -> f64 {
        let before = self.stock(good);
        let after = self.clamp_good(before + amount);
        *self.stock_mut(good) = after;
        after - before
    }

    /// Removes `amount` of `good`, floored at zero. Returns what was removed.
    pub fn debit(&mut self, good: Good, amount: f64) -> f64 {
        let before = self.stock(good);
        let after = self.clamp_good(before - amount);
        *self.stock_mut(good) = after;
        before - after
    }

    pub fn credit_money(&mut self, amount: f64) {
        self.money = (self.money + amount).max(0.0);
    }

    /// Removes up to `amount` money. Returns what was actually paid out.
    pub fn debit_money(&mut self, amount: f64) -> f64 {
        let paid = amount.min(self.money).max(0.0);
        self.money -= paid;
        paid
    }

    pub(crate) fn scale_money(&mut self, ratio: f64) {
        self.money = (self.money * ratio).max(0.0);
    }

    /// The rate actually applied this tick.
    pub fn effective_depletion_rate(&self) -> f64 {
        self.depletion_override.unwrap_or(self.depletion_rate).max(0.0)
    }

    /// Market state as last journaled by [`Ledger::refresh_wheat_market`].
    pub fn wheat_market_open(&self) -> bool {
        self.wheat_market_open
    }

    /// Whether the stock is above the reserve right now.
    pub fn has_wheat_for_sale(&self) -> bool {
        self.wheat > self.wheat_reserve
    }

    /// Wheat the trader may take without cutting into the reserve.
    pub fn wheat_above_reserve(&self) -> f64 {
        (self.wheat - self.wheat_reserve).max(0.0)
    }

    /// Recomputes whether the wheat market is open.
    ///
    /// Returns the new state when it changed, `None` otherwise.
    pub fn refresh_wheat_market(&mut self) -> Option<bool> {
        let open = self.has_wheat_for_sale();
        if open == self.wheat_market_open {
            return None;
        }
        self.wheat_market_open = open;
        Some(open)
    }

    #[cfg(test)]
    pub(crate) fn set_money(&mut self, money: f64) {
        self.money = money.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn village() -> Ledger {
        Ledger::new(Settlement::Village, &LedgerConfig::default_village())
    }

    #[test]
    fn test_credit_clamps_to_storage() {
        let mut ledger = village();
        let stored = ledger.credit(Good::Wheat, 250.0);
        assert_eq!(stored, 200.0);
        assert_eq!(ledger.wheat(), 200.0);

        let stored = ledger.credit(Good::Wheat, 5.0);
        assert_eq!(stored, 0.0);
        assert_eq!(ledger.wheat(), 200.0);
    }

    #[test]
    fn test_debit_floors_at_zero() {
        let mut ledger = village();
        ledger.credit(Good::Tools, 3.0);
        let removed = ledger.debit(Good::Tools, 5.0);
        assert_eq!(removed, 3.0);
        assert_eq!(ledger.tools(), 0.0);
    }

    #[test]
    fn test_deplete_over_time() {
        let mut ledger = village();
        ledger.credit(Good::Tools, 10.0);
        ledger.deplete(Good::Tools, 2.0, 1.5);
        assert_eq!(ledger.tools(), 7.0);
        ledger.deplete(Good::Tools, 2.0, 10.0);
        assert_eq!(ledger.tools(), 0.0);
    }

    #[test]
    fn test_money_has_no_ceiling_but_no_debt() {
        let mut ledger = village();
        ledger.credit_money(10_000.0);
        assert_eq!(ledger.money(), 10_500.0);
        let paid = ledger.debit_money(20_000.0);
        assert_eq!(paid, 10_500.0);
        assert_eq!(ledger.money(), 0.0);
    }

    #[test]
    fn test_wheat_market_transitions() {
        let mut ledger = village();
        assert!(!ledger.wheat_market_open());
        assert_eq!(ledger.refresh_wheat_market(), None);

        ledger.credit(Good::Wheat, 20.0);
        // Exactly at the reserve is still closed.
        assert_eq!(ledger.refresh_wheat_market(), None);

        ledger.credit(Good::Wheat, 0.5);
        assert_eq!(ledger.refresh_wheat_market(), Some(true));
        assert!(ledger.wheat_market_open());
        assert_eq!(ledger.wheat_above_reserve(), 0.5);

        ledger.debit(Good::Wheat, 1.0);
        assert_eq!(ledger.refresh_wheat_market(), Some(false));
    }

    #[test]
    fn test_live_gate_ignores_stale_flag() {
        let mut ledger = village();
        ledger.credit(Good::Wheat, 25.0);
        ledger.refresh_wheat_market();
        assert!(ledger.wheat_market_open());

        ledger.debit(Good::Wheat, 10.0);
        assert!(ledger.wheat_market_open());
        assert!(!ledger.has_wheat_for_sale());
    }

    #[test]
    fn test_depletion_override_wins() {
        let mut ledger = village();
        ledger.depletion_rate = 0.7;
        assert_eq!(ledger.effective_depletion_rate(), 0.7);
        ledger.depletion_override = Some(0.0);
        assert_eq!(ledger.effective_depletion_rate(), 0.0);
    }
}
