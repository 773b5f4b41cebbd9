use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::{Event, EventType};

/// Money and population at the last audit of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyState {
    pub town_money: Decimal,
    pub village_money: Decimal,
    pub trader_money: Decimal,
    pub town_population: Decimal,
    pub village_population: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub sim_time: f64,

    pub villagers_spawned: usize,
    pub villagers_returned: usize,
    pub agent_faults: usize,
    pub tools_brought_home: Decimal,

    pub trades_executed: usize,
    pub trades_by_kind: BTreeMap<String, usize>,
    pub wheat_traded: Decimal,
    pub tools_traded: Decimal,
    pub money_exchanged: Decimal,

    pub price_updates: usize,
    pub pricing_failures: usize,
    pub wheat_price_range: Option<(Decimal, Decimal)>,
    pub tools_price_range: Option<(Decimal, Decimal)>,

    pub market_openings: usize,
    pub market_closings: usize,
    pub trader_waits: usize,
    pub trader_timeouts: usize,
    pub longest_wait: f64,

    pub renormalizations: usize,
    /// Largest absolute gap between observed and expected money.
    pub max_drift: Decimal,

    pub final_state: Option<EconomyState>,
    /// Gini coefficient of the final money split between town, village and
    /// trader.
    pub money_inequality: f64,
}

fn widen(range: &mut Option<(Decimal, Decimal)>, value: Decimal) {
    *range = Some(match *range {
        Some((low, high)) => (low.min(value), high.max(value)),
        None => (value, value),
    });
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn summarize(events: &[Event]) -> RunSummary {
        let mut summary = RunSummary::default();

        for event in events {
            summary.ticks = summary.ticks.max(event.tick);
            summary.sim_time = summary.sim_time.max(event.sim_time);

            match &event.event_type {
                EventType::VillagerSpawned { .. } => summary.villagers_spawned += 1,
                EventType::VillagerReturned { tools, .. } => {
                    summary.villagers_returned += 1;
                    summary.tools_brought_home += tools;
                }
                EventType::AgentFaulted { .. } => summary.agent_faults += 1,
                EventType::TradeExecuted {
                    kind,
                    wheat,
                    tools,
                    money,
                    ..
                } => {
                    summary.trades_executed += 1;
                    *summary
                        .trades_by_kind
                        .entry(format!("{:?}", kind))
                        .or_insert(0) += 1;
                    summary.wheat_traded += wheat;
                    summary.tools_traded += tools;
                    summary.money_exchanged += money;
                }
                EventType::WheatMarketChanged { open, .. } => {
                    if *open {
                        summary.market_openings += 1;
                    } else {
                        summary.market_closings += 1;
                    }
                }
                EventType::PricesUpdated {
                    wheat_price,
                    tools_price,
                } => {
                    summary.price_updates += 1;
                    widen(&mut summary.wheat_price_range, *wheat_price);
                    widen(&mut summary.tools_price_range, *tools_price);
                }
                EventType::PricingFailed { .. } => summary.pricing_failures += 1,
                EventType::TraderWaiting { .. } => summary.trader_waits += 1,
                EventType::TraderResumed {
                    waited_seconds,
                    timed_out,
                } => {
                    if *timed_out {
                        summary.trader_timeouts += 1;
                    }
                    summary.longest_wait = summary.longest_wait.max(*waited_seconds);
                }
                EventType::MoneyRenormalized {
                    observed, expected, ..
                } => {
                    summary.renormalizations += 1;
                    summary.max_drift = summary.max_drift.max((observed - expected).abs());
                }
                EventType::EconomySnapshot {
                    town_money,
                    village_money,
                    trader_money,
                    town_population,
                    village_population,
                } => {
                    summary.final_state = Some(EconomyState {
                        town_money: *town_money,
                        village_money: *village_money,
                        trader_money: *trader_money,
                        town_population: *town_population,
                        village_population: *village_population,
                    });
                }
            }
        }

        if let Some(state) = &summary.final_state {
            let holdings: Vec<f64> = [state.town_money, state.village_money, state.trader_money]
                .iter()
                .map(|m| m.to_f64().unwrap_or(0.0))
                .collect();
            summary.money_inequality = Self::calculate_gini_coefficient(&holdings);
        }

        summary
    }

    pub fn calculate_gini_coefficient(values: &[f64]) -> f64 {
        if values.is_empty() || values.iter().all(|&v| v == 0.0) {
            return 0.0;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let total: f64 = sorted.iter().sum();

        if total == 0.0 {
            return 0.0;
        }

        let mut sum = 0.0;

        for (i, &value) in sorted.iter().enumerate() {
            sum += (i as f64 + 1.0) * value;
        }

        2.0 * sum / (n * total) - (n + 1.0) / n
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Run Summary ({} ticks, {:.1}s simulated):",
            self.ticks, self.sim_time
        )?;
        writeln!(
            f,
            "  Villagers: {} spawned, {} returned, {} tools brought home",
            self.villagers_spawned, self.villagers_returned, self.tools_brought_home
        )?;
        writeln!(f, "  Agent faults: {}", self.agent_faults)?;
        writeln!(
            f,
            "  Trades: {} ({} wheat, {} tools, {} money)",
            self.trades_executed, self.wheat_traded, self.tools_traded, self.money_exchanged
        )?;
        for (kind, count) in &self.trades_by_kind {
            writeln!(f, "    - {}: {}", kind, count)?;
        }
        writeln!(
            f,
            "  Prices: {} updates, {} failures",
            self.price_updates, self.pricing_failures
        )?;
        if let Some((low, high)) = self.wheat_price_range {
            writeln!(f, "    - Wheat: {} to {}", low, high)?;
        }
        if let Some((low, high)) = self.tools_price_range {
            writeln!(f, "    - Tools: {} to {}", low, high)?;
        }
        writeln!(
            f,
            "  Wheat market: opened {} times, closed {} times",
            self.market_openings, self.market_closings
        )?;
        writeln!(
            f,
            "  Trader: waited {} times ({} timed out), longest {:.1}s",
            self.trader_waits, self.trader_timeouts, self.longest_wait
        )?;
        writeln!(
            f,
            "  Renormalizations: {} (max drift {})",
            self.renormalizations, self.max_drift
        )?;
        if let Some(state) = &self.final_state {
            writeln!(f, "\nFinal State:")?;
            writeln!(
                f,
                "  Town: {} money, {} people",
                state.town_money, state.town_population
            )?;
            writeln!(
                f,
                "  Village: {} money, {} people",
                state.village_money, state.village_population
            )?;
            writeln!(f, "  Trader: {} money", state.trader_money)?;
            writeln!(
                f,
                "  Money Inequality (Gini): {:.3}",
                self.money_inequality
            )?;
        }
        Ok(())
    }
}
