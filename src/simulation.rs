//! The tick loop tying ledgers, production, agents and timers together.

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agents::{AgentFault, Trader, TraderOutcome, Villager};
use crate::audit::{AuditOutcome, ConservationAuditor};
use crate::events::{EventLogger, EventType, TradeLog, amount};
use crate::ledger::Ledger;
use crate::population::Population;
use crate::pricing::{MarketIndicators, PriceQuote, PriceSource};
use crate::production::ProductionSite;
use crate::scenario::Scenario;
use crate::settlement::{Market, MarketContext, Trade};
use crate::snapshot::{SettlementView, Snapshot, TraderView, VillagerView};
use crate::types::{Good, Settlement};

/// Longest step a single tick will simulate, in seconds.
pub const MAX_DELTA_TIME: f64 = 1.0;

/// How far any indicator may drift from the last one sent before prices are
/// requested ahead of the refresh interval.
pub const INDICATOR_REFRESH_DELTA: f64 = 5.0;

/// One of the four pricing indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    WheatDemand,
    WheatSupply,
    ToolsDemand,
    ToolsSupply,
}

/// Externally set indicator values, each replacing the derived one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorOverrides {
    pub wheat_demand: Option<f64>,
    pub wheat_supply: Option<f64>,
    pub tools_demand: Option<f64>,
    pub tools_supply: Option<f64>,
}

impl IndicatorOverrides {
    fn slot(&mut self, indicator: Indicator) -> &mut Option<f64> {
        match indicator {
            Indicator::WheatDemand => &mut self.wheat_demand,
            Indicator::WheatSupply => &mut self.wheat_supply,
            Indicator::ToolsDemand => &mut self.tools_demand,
            Indicator::ToolsSupply => &mut self.tools_supply,
        }
    }
}

pub struct Simulation {
    scenario: Scenario,
    seed: u64,
    tick: u64,
    sim_time: f64,
    town: Ledger,
    village: Ledger,
    town_population: Population,
    village_population: Population,
    farms: ProductionSite,
    smithies: ProductionSite,
    villagers: Vec<Villager>,
    next_villager_id: u64,
    trader: Trader,
    prices: PriceQuote,
    pricing: Box<dyn PriceSource>,
    price_timer: f64,
    last_indicators: MarketIndicators,
    overrides: IndicatorOverrides,
    auditor: ConservationAuditor,
    last_audit: Option<AuditOutcome>,
    rng: StdRng,
    events: EventLogger,
    trade_log: TradeLog,
}

impl Simulation {
    pub fn new(scenario: Scenario, pricing: Box<dyn PriceSource>) -> Result<Self, String> {
        scenario.validate()?;

        let seed = scenario.random_seed.unwrap_or_else(rand::random);
        let mut simulation = Self {
            seed,
            tick: 0,
            sim_time: 0.0,
            town: Ledger::new(Settlement::Town, &scenario.town),
            village: Ledger::new(Settlement::Village, &scenario.village),
            town_population: Population::new(&scenario.population.town),
            village_population: Population::new(&scenario.population.village),
            farms: ProductionSite::new(Good::Wheat, &scenario.production.farms),
            smithies: ProductionSite::new(Good::Tools, &scenario.production.smithies),
            villagers: Vec::new(),
            next_villager_id: 1,
            trader: Trader::new(&scenario.trader, scenario.economy.trader_money),
            prices: PriceQuote::new(
                scenario.economy.initial_wheat_price,
                scenario.economy.initial_tools_price,
            ),
            pricing,
            price_timer: 0.0,
            last_indicators: MarketIndicators {
                wheat_demand: 0.0,
                wheat_supply: 0.0,
                tools_demand: 0.0,
                tools_supply: 0.0,
            },
            overrides: IndicatorOverrides::default(),
            auditor: ConservationAuditor::new(
                scenario.economy.total_money,
                scenario.timers.audit_epsilon,
                scenario.timers.audit_interval,
            ),
            last_audit: None,
            rng: StdRng::seed_from_u64(seed),
            events: EventLogger::new(),
            trade_log: TradeLog::new(),
            scenario,
        };

        info!(
            "Starting scenario '{}' with seed {}",
            simulation.scenario.name, seed
        );
        simulation.request_prices();
        Ok(simulation)
    }

    /// Advances the whole model by `delta_time` seconds and returns the
    /// resulting state.
    pub fn tick(&mut self, delta_time: f64) -> Snapshot {
        self.advance(delta_time);
        self.snapshot()
    }

    /// Advances the model without building a snapshot.
    ///
    /// Non-finite or negative steps count as zero; steps longer than
    /// [`MAX_DELTA_TIME`] are cut to it.
    pub fn advance(&mut self, delta_time: f64) {
        let dt = if delta_time.is_finite() {
            delta_time.clamp(0.0, MAX_DELTA_TIME)
        } else {
            0.0
        };
        self.tick += 1;
        self.sim_time += dt;

        self.farms.update(&mut self.village, dt);
        self.smithies.update(&mut self.town, dt);

        let town_rate = self.town.effective_depletion_rate();
        self.town.deplete(Good::Wheat, town_rate, dt);
        let village_rate = self.village.effective_depletion_rate();
        self.village.deplete(Good::Tools, village_rate, dt);

        self.update_prices(dt);
        self.check_wheat_market();
        self.maybe_spawn_villager();
        self.update_agents(dt);
        self.check_wheat_market();

        let total_money = self.scenario.economy.total_money;
        self.town_population
            .update(&mut self.town, total_money, dt, &mut self.rng);
        self.village_population
            .update(&mut self.village, total_money, dt, &mut self.rng);

        if self.auditor.advance(dt) {
            self.run_audit();
        }
    }

    fn update_prices(&mut self, dt: f64) {
        while let Some(result) = self.pricing.poll() {
            match result {
                Ok(quote) => {
                    if quote != self.prices {
                        debug!(
                            "Prices now wheat {:.2}, tools {:.2}",
                            quote.wheat_price, quote.tools_price
                        );
                        self.log_event(
                            "market",
                            EventType::PricesUpdated {
                                wheat_price: amount(quote.wheat_price),
                                tools_price: amount(quote.tools_price),
                            },
                        );
                    }
                    self.prices = quote;
                }
                Err(e) => {
                    warn!("Keeping previous prices: {}", e);
                    self.log_event(
                        "market",
                        EventType::PricingFailed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        self.price_timer += dt;
        if self.price_timer >= self.scenario.timers.price_refresh_interval
            || self.indicators_moved()
        {
            self.request_prices();
        }
    }

    fn request_prices(&mut self) {
        self.price_timer = 0.0;
        let indicators = self.indicators();
        self.last_indicators = indicators;
        self.pricing.request(indicators);
    }

    fn indicators_moved(&self) -> bool {
        let now = self.indicators();
        let last = self.last_indicators;
        [
            now.wheat_demand - last.wheat_demand,
            now.wheat_supply - last.wheat_supply,
            now.tools_demand - last.tools_demand,
            now.tools_supply - last.tools_supply,
        ]
        .iter()
        .any(|d| d.abs() > INDICATOR_REFRESH_DELTA)
    }

    /// Indicators as they would be sent to the pricing service right now.
    pub fn indicators(&self) -> MarketIndicators {
        let baseline = self.scenario.market.demand_baseline;
        MarketIndicators {
            wheat_demand: self
                .overrides
                .wheat_demand
                .unwrap_or((baseline - self.town.wheat()).max(0.0)),
            wheat_supply: self
                .overrides
                .wheat_supply
                .unwrap_or(self.scenario.market.wheat_supply),
            tools_demand: self
                .overrides
                .tools_demand
                .unwrap_or((baseline - self.village.tools()).max(0.0)),
            tools_supply: self
                .overrides
                .tools_supply
                .unwrap_or(self.scenario.market.tools_supply),
        }
    }

    fn check_wheat_market(&mut self) {
        if let Some(open) = self.village.refresh_wheat_market() {
            info!(
                "Village wheat market {} ({:.1} wheat, reserve {:.1})",
                if open { "opened" } else { "closed" },
                self.village.wheat(),
                self.village.wheat_reserve
            );
            self.log_event(
                "village",
                EventType::WheatMarketChanged {
                    open,
                    wheat: amount(self.village.wheat()),
                    reserve: amount(self.village.wheat_reserve),
                },
            );
        }
    }

    fn maybe_spawn_villager(&mut self) {
        let config = &self.scenario.villagers;
        if self.village.wheat() < config.spawn_threshold || self.villagers.len() >= config.max_active
        {
            return;
        }

        let wheat = self.village.debit(Good::Wheat, config.wheat_payload);
        let (min_speed, max_speed) = config.speed_range;
        let speed = self.rng.random_range(min_speed..max_speed);
        let id = self.next_villager_id;
        self.next_villager_id += 1;
        self.villagers
            .push(Villager::new(id, wheat, speed, config.max_steps));

        debug!(
            "Villager {} set out with {:.1} wheat at speed {:.2}",
            id, wheat, speed
        );
        let active_villagers = self.villagers.len();
        self.log_event(
            "village",
            EventType::VillagerSpawned {
                villager_id: id,
                wheat: amount(wheat),
                speed,
                active_villagers,
            },
        );
    }

    /// Updates villagers in list order, then the trader, one settlement at a
    /// time against the shared ledgers.
    fn update_agents(&mut self, dt: f64) {
        let mut trades: Vec<Trade> = Vec::new();
        let mut returned: Vec<(u64, f64, f64)> = Vec::new();
        let mut faulted: Vec<(u64, AgentFault)> = Vec::new();

        let trader_result = {
            let mut market = Market {
                town: &mut self.town,
                village: &mut self.village,
                prices: self.prices,
                trades: &mut trades,
            };

            for villager in self.villagers.iter_mut() {
                let (tools, money) = (villager.tools_carried, villager.money_carried);
                match villager.update(&mut market) {
                    Ok(()) if villager.finished() => returned.push((villager.id, tools, money)),
                    Ok(()) => {}
                    Err(fault) => {
                        let (wheat, tools, money) = villager.surrender_assets();
                        market.recover_assets(wheat, tools, money);
                        faulted.push((villager.id, fault));
                    }
                }
            }

            self.trader.update(dt, &mut market)
        };

        self.villagers
            .retain(|v| !v.finished() && !faulted.iter().any(|(id, _)| *id == v.id));

        for (id, tools, money) in returned {
            debug!(
                "Villager {} returned with {:.1} tools and {:.1} money",
                id, tools, money
            );
            self.log_event(
                &format!("villager-{}", id),
                EventType::VillagerReturned {
                    villager_id: id,
                    tools: amount(tools),
                    money: amount(money),
                },
            );
        }
        for (id, fault) in faulted {
            error!("Removing villager {}: {}", id, fault);
            self.log_event(
                &format!("villager-{}", id),
                EventType::AgentFaulted {
                    agent: format!("villager-{}", id),
                    reason: fault.to_string(),
                },
            );
        }

        match trader_result {
            Ok(TraderOutcome::StartedWaiting) => {
                debug!("Trader waiting at the village for wheat");
                let event = EventType::TraderWaiting {
                    money: amount(self.trader.cargo.money),
                    tools: amount(self.trader.cargo.tools),
                };
                self.log_event("trader", event);
            }
            Ok(TraderOutcome::StoppedWaiting { timed_out }) => {
                let event = EventType::TraderResumed {
                    waited_seconds: self.trader.seconds_waited(),
                    timed_out,
                };
                self.log_event("trader", event);
            }
            Ok(_) => {}
            Err(fault) => {
                error!("Resetting trader: {}", fault);
                self.trader.reset_position();
                self.log_event(
                    "trader",
                    EventType::AgentFaulted {
                        agent: "trader".to_string(),
                        reason: fault.to_string(),
                    },
                );
            }
        }

        for trade in trades {
            self.trade_log.record(self.sim_time, &trade);
            self.log_event("market", EventType::trade(&trade));
        }
    }

    /// Runs the conservation audit immediately.
    pub fn run_audit(&mut self) -> AuditOutcome {
        let outcome = self.auditor.audit(
            &mut self.town,
            &mut self.village,
            &mut self.trader,
            &mut self.villagers,
        );

        match outcome {
            AuditOutcome::Balanced { .. } => {}
            AuditOutcome::Renormalized { observed, ratio } => {
                error!(
                    "Money drifted to {:.4} (expected {:.4}), rescaled by {:.6}",
                    observed, self.auditor.total_money, ratio
                );
                self.log_event(
                    "auditor",
                    EventType::MoneyRenormalized {
                        observed: amount(observed),
                        expected: amount(self.auditor.total_money),
                        ratio,
                    },
                );
            }
            AuditOutcome::Unrecoverable { observed } => {
                error!("No money left to rescale (observed {:.4})", observed);
            }
        }

        let event = EventType::EconomySnapshot {
            town_money: amount(self.town.money()),
            village_money: amount(self.village.money()),
            trader_money: amount(self.trader.cargo.money),
            town_population: amount(self.town_population.current),
            village_population: amount(self.village_population.current),
        };
        self.log_event("auditor", event);

        self.last_audit = Some(outcome);
        outcome
    }

    fn log_event(&mut self, source: &str, event_type: EventType) {
        self.events.log(self.tick, self.sim_time, source, event_type);
    }

    /// Replaces one indicator until cleared with `None`, and asks for fresh
    /// prices straight away.
    pub fn set_indicator_override(&mut self, indicator: Indicator, value: Option<f64>) {
        *self.overrides.slot(indicator) = value.map(|v| v.max(0.0));
        self.request_prices();
    }

    pub fn indicator_overrides(&self) -> IndicatorOverrides {
        self.overrides
    }

    /// Forces a settlement's depletion rate until cleared with `None`.
    pub fn set_depletion_override(&mut self, settlement: Settlement, rate: Option<f64>) {
        self.ledger_mut(settlement).depletion_override = rate.map(|r| r.max(0.0));
    }

    pub fn ledger(&self, settlement: Settlement) -> &Ledger {
        match settlement {
            Settlement::Town => &self.town,
            Settlement::Village => &self.village,
        }
    }

    /// Direct access for external writes; applied before the next tick.
    pub fn ledger_mut(&mut self, settlement: Settlement) -> &mut Ledger {
        match settlement {
            Settlement::Town => &mut self.town,
            Settlement::Village => &mut self.village,
        }
    }

    pub fn population(&self, settlement: Settlement) -> &Population {
        match settlement {
            Settlement::Town => &self.town_population,
            Settlement::Village => &self.village_population,
        }
    }

    pub fn villagers(&self) -> &[Villager] {
        &self.villagers
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    pub fn prices(&self) -> PriceQuote {
        self.prices
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn last_audit(&self) -> Option<AuditOutcome> {
        self.last_audit
    }

    pub fn events(&self) -> &EventLogger {
        &self.events
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    /// Money currently held by both ledgers, the trader and every villager.
    pub fn total_money(&self) -> f64 {
        ConservationAuditor::observed_total(&self.town, &self.village, &self.trader, &self.villagers)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            sim_time: self.sim_time,
            prices: self.prices,
            indicators: self.indicators(),
            town: SettlementView::new(&self.town, &self.town_population, self.smithies.progress()),
            village: SettlementView::new(
                &self.village,
                &self.village_population,
                self.farms.progress(),
            ),
            villagers: self
                .villagers
                .iter()
                .map(|v| VillagerView {
                    id: v.id,
                    position: v.position,
                    phase: v.phase,
                    wheat: v.wheat_carried,
                    tools: v.tools_carried,
                    money: v.money_carried,
                })
                .collect(),
            trader: TraderView {
                position: self.trader.position,
                phase: self.trader.phase,
                wheat: self.trader.cargo.wheat,
                tools: self.trader.cargo.tools,
                money: self.trader.cargo.money,
                capacity: self.trader.cargo.capacity,
                trade_cooldown: self.trader.trade_cooldown,
                waiting_for_wheat: self.trader.waiting_for_wheat(),
            },
            total_money: self.total_money(),
            trade_log: self.trade_log.entries().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{FormulaPriceSource, PricingError, StaticPriceSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: f64 = 1.0 / 60.0;

    fn seeded(mut scenario: Scenario) -> Scenario {
        scenario.random_seed = Some(7);
        scenario
    }

    fn static_prices(wheat: f64, tools: f64) -> Box<dyn PriceSource> {
        Box::new(StaticPriceSource::new(PriceQuote::new(wheat, tools)))
    }

    /// Fails every request and counts how often it was asked.
    struct FailingPriceSource {
        requests: Rc<RefCell<Vec<MarketIndicators>>>,
        pending: usize,
    }

    impl PriceSource for FailingPriceSource {
        fn request(&mut self, indicators: MarketIndicators) {
            self.requests.borrow_mut().push(indicators);
            self.pending += 1;
        }

        fn poll(&mut self) -> Option<Result<PriceQuote, PricingError>> {
            if self.pending == 0 {
                return None;
            }
            self.pending -= 1;
            Some(Err(PricingError::Status(500)))
        }
    }

    fn failing() -> (Box<dyn PriceSource>, Rc<RefCell<Vec<MarketIndicators>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let source = FailingPriceSource {
            requests: Rc::clone(&requests),
            pending: 0,
        };
        (Box::new(source), requests)
    }

    #[test]
    fn test_invalid_scenario_is_rejected() {
        let mut scenario = Scenario::default();
        scenario.trader.capacity = 0.0;
        assert!(Simulation::new(scenario, static_prices(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_first_tick_applies_quote() {
        let mut sim = Simulation::new(seeded(Scenario::default()), static_prices(2.0, 1.0)).unwrap();
        assert_eq!(sim.prices(), PriceQuote::new(10.0, 10.0));

        let snapshot = sim.tick(DT);
        assert_eq!(snapshot.prices, PriceQuote::new(2.0, 1.0));
        assert_eq!(snapshot.tick, 1);
    }

    #[test]
    fn test_pricing_failure_keeps_previous_prices() {
        let (source, requests) = failing();
        let mut sim = Simulation::new(seeded(Scenario::default()), source).unwrap();

        for _ in 0..300 {
            sim.advance(DT);
        }

        assert_eq!(sim.prices(), PriceQuote::new(10.0, 10.0));
        // One request at start plus one every two seconds.
        assert_eq!(requests.borrow().len(), 3);
        let failures = sim
            .events()
            .get_events()
            .iter()
            .filter(|e| matches!(e.event_type, EventType::PricingFailed { .. }))
            .count();
        assert_eq!(failures, 3);
    }

    #[test]
    fn test_indicator_override_triggers_refresh() {
        let (source, requests) = failing();
        let mut sim = Simulation::new(seeded(Scenario::default()), source).unwrap();
        assert_eq!(requests.borrow()[0].wheat_demand, 100.0);

        sim.set_indicator_override(Indicator::WheatDemand, Some(80.0));
        sim.set_indicator_override(Indicator::ToolsSupply, Some(-5.0));

        let sent = requests.borrow();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].wheat_demand, 80.0);
        assert_eq!(sent[2].tools_supply, 0.0);
        assert_eq!(sent[2].tools_demand, 100.0);
    }

    #[test]
    fn test_stock_changes_trigger_refresh() {
        let (source, requests) = failing();
        let mut sim = Simulation::new(seeded(Scenario::default()), source).unwrap();
        assert_eq!(requests.borrow().len(), 1);

        // A small move waits for the interval.
        sim.ledger_mut(Settlement::Town).credit(Good::Wheat, 3.0);
        sim.advance(DT);
        assert_eq!(requests.borrow().len(), 1);

        sim.ledger_mut(Settlement::Town).credit(Good::Wheat, 7.0);
        sim.advance(DT);
        let sent = requests.borrow();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].wheat_demand < 91.0);
    }

    #[test]
    fn test_formula_prices_follow_demand() {
        let mut sim =
            Simulation::new(seeded(Scenario::default()), Box::new(FormulaPriceSource::default()))
                .unwrap();
        sim.set_indicator_override(Indicator::WheatDemand, Some(25.0));
        sim.advance(DT);
        assert_eq!(sim.prices().wheat_price, 5.0);
        // Village has no tools, so tools demand is at the baseline.
        assert_eq!(sim.prices().tools_price, 20.0);
    }

    #[test]
    fn test_production_fills_storage_over_time() {
        let mut scenario = seeded(Scenario::default());
        scenario.villagers.max_active = 0;
        let mut sim = Simulation::new(scenario, static_prices(10.0, 10.0)).unwrap();
        sim.set_depletion_override(Settlement::Town, Some(0.0));
        sim.set_depletion_override(Settlement::Village, Some(0.0));

        // Every unit completes a cycle before the trader first reaches the village.
        for _ in 0..385 {
            sim.advance(DT);
        }

        let village = sim.ledger(Settlement::Village);
        let town = sim.ledger(Settlement::Town);
        assert!(village.wheat() >= 3.0 * 2.0 + 2.5 * 3.0 + 2.8 * 4.0 - 1e-9);
        assert!(town.tools() >= 1.5 + 1.2 + 1.0 - 1e-9);
    }

    #[test]
    fn test_depletion_override_wins_over_population() {
        let mut scenario = seeded(Scenario::default());
        scenario.production.farms.clear();
        scenario.production.smithies.clear();
        scenario.town.wheat = 50.0;
        let mut sim = Simulation::new(scenario, static_prices(10.0, 10.0)).unwrap();

        sim.set_depletion_override(Settlement::Town, Some(6.0));
        sim.advance(0.5);
        assert!((sim.ledger(Settlement::Town).wheat() - 47.0).abs() < 1e-9);

        sim.set_depletion_override(Settlement::Town, None);
        let derived = sim.ledger(Settlement::Town).depletion_rate;
        sim.advance(0.5);
        assert!((sim.ledger(Settlement::Town).wheat() - (47.0 - derived * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_spawn_respects_threshold_and_cap() {
        let mut scenario = seeded(Scenario::default());
        scenario.production.farms.clear();
        scenario.production.smithies.clear();
        scenario.village.wheat = 35.0;
        let mut sim = Simulation::new(scenario, static_prices(10.0, 10.0)).unwrap();
        sim.set_depletion_override(Settlement::Village, Some(0.0));

        sim.advance(DT);
        assert_eq!(sim.villagers().len(), 1);
        sim.advance(DT);
        assert_eq!(sim.villagers().len(), 2);
        sim.advance(DT);
        assert_eq!(sim.villagers().len(), 2);
        assert!((sim.ledger(Settlement::Village).wheat() - 15.0).abs() < 1e-9);
        for villager in sim.villagers() {
            assert!((1.0..3.0).contains(&villager.speed));
        }
    }

    #[test]
    fn test_huge_or_invalid_steps_are_bounded() {
        let mut sim = Simulation::new(seeded(Scenario::default()), static_prices(10.0, 10.0)).unwrap();
        sim.advance(f64::NAN);
        sim.advance(-3.0);
        assert_eq!(sim.sim_time(), 0.0);
        sim.advance(3600.0);
        assert_eq!(sim.sim_time(), MAX_DELTA_TIME);
        assert_eq!(sim.tick_count(), 3);
    }

    #[test]
    fn test_market_transition_is_journaled() {
        let mut scenario = seeded(Scenario::default());
        scenario.production.farms.clear();
        scenario.village.wheat = 30.0;
        scenario.villagers.max_active = 0;
        let mut sim = Simulation::new(scenario, static_prices(10.0, 10.0)).unwrap();
        assert!(sim.ledger(Settlement::Village).wheat_market_open());

        sim.ledger_mut(Settlement::Village).debit(Good::Wheat, 15.0);
        sim.advance(DT);

        assert!(!sim.ledger(Settlement::Village).wheat_market_open());
        let changed = sim
            .events()
            .get_events()
            .iter()
            .any(|e| matches!(e.event_type, EventType::WheatMarketChanged { open: false, .. }));
        assert!(changed);
    }

    #[test]
    fn test_waiting_trader_sees_wheat_taken_by_spawn() {
        let mut scenario = seeded(Scenario::default());
        scenario.production.farms.clear();
        scenario.production.smithies.clear();
        scenario.villagers.max_active = 1;
        let mut sim = Simulation::new(scenario, static_prices(10.0, 10.0)).unwrap();
        sim.set_depletion_override(Settlement::Village, Some(0.0));

        for _ in 0..1000 {
            if sim.trader().waiting_for_wheat() {
                break;
            }
            sim.advance(DT);
        }
        assert!(sim.trader().waiting_for_wheat());

        // The gate opens, then the spawn in the same tick takes it back below the reserve.
        sim.ledger_mut(Settlement::Village).credit(Good::Wheat, 25.0);
        sim.advance(DT);

        assert_eq!(sim.villagers().len(), 1);
        assert!((sim.ledger(Settlement::Village).wheat() - 15.0).abs() < 1e-9);
        assert!(sim.trader().waiting_for_wheat());
        assert!(!sim.ledger(Settlement::Village).wheat_market_open());
        let resumed = sim
            .events()
            .get_events()
            .iter()
            .any(|e| matches!(e.event_type, EventType::TraderResumed { .. }));
        assert!(!resumed);

        // With the villager still on the road no spawn competes for the wheat.
        sim.ledger_mut(Settlement::Village).credit(Good::Wheat, 10.0);
        sim.advance(DT);

        assert!(!sim.trader().waiting_for_wheat());
        assert_eq!(sim.trader().cargo.wheat, 5.0);
        assert!((sim.ledger(Settlement::Village).wheat() - 20.0).abs() < 1e-9);
    }
}
