use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settlement::{Trade, TradeKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
    /// Simulated seconds since start.
    pub sim_time: f64,
    pub source: String,
    pub event_type: EventType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventType {
    VillagerSpawned {
        villager_id: u64,
        wheat: Decimal,
        speed: f64,
        active_villagers: usize,
    },
    VillagerReturned {
        villager_id: u64,
        tools: Decimal,
        money: Decimal,
    },
    AgentFaulted {
        agent: String,
        reason: String,
    },
    TradeExecuted {
        kind: TradeKind,
        wheat: Decimal,
        tools: Decimal,
        money: Decimal,
        wheat_price: Decimal,
        tools_price: Decimal,
    },
    WheatMarketChanged {
        open: bool,
        wheat: Decimal,
        reserve: Decimal,
    },
    PricesUpdated {
        wheat_price: Decimal,
        tools_price: Decimal,
    },
    PricingFailed {
        reason: String,
    },
    TraderWaiting {
        money: Decimal,
        tools: Decimal,
    },
    TraderResumed {
        waited_seconds: f64,
        timed_out: bool,
    },
    MoneyRenormalized {
        observed: Decimal,
        expected: Decimal,
        ratio: f64,
    },
    EconomySnapshot {
        town_money: Decimal,
        village_money: Decimal,
        trader_money: Decimal,
        town_population: Decimal,
        village_population: Decimal,
    },
}

/// Converts a simulation quantity for the journal, rounded to 4 places.
pub fn amount(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(4)
}

impl EventType {
    pub fn trade(trade: &Trade) -> Self {
        EventType::TradeExecuted {
            kind: trade.kind,
            wheat: amount(trade.wheat),
            tools: amount(trade.tools),
            money: amount(trade.money),
            wheat_price: amount(trade.wheat_price),
            tools_price: amount(trade.tools_price),
        }
    }

    /// Short identifier used for filtering.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::VillagerSpawned { .. } => "villager_spawned",
            EventType::VillagerReturned { .. } => "villager_returned",
            EventType::AgentFaulted { .. } => "agent_faulted",
            EventType::TradeExecuted { .. } => "trade_executed",
            EventType::WheatMarketChanged { .. } => "wheat_market_changed",
            EventType::PricesUpdated { .. } => "prices_updated",
            EventType::PricingFailed { .. } => "pricing_failed",
            EventType::TraderWaiting { .. } => "trader_waiting",
            EventType::TraderResumed { .. } => "trader_resumed",
            EventType::MoneyRenormalized { .. } => "money_renormalized",
            EventType::EconomySnapshot { .. } => "economy_snapshot",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {:.1}s] {}: ", self.tick, self.sim_time, self.source)?;

        match &self.event_type {
            EventType::VillagerSpawned {
                villager_id,
                wheat,
                speed,
                active_villagers,
            } => write!(
                f,
                "Villager {} left with {} wheat at speed {:.2} ({} active)",
                villager_id, wheat, speed, active_villagers
            ),
            EventType::VillagerReturned {
                villager_id,
                tools,
                money,
            } => write!(
                f,
                "Villager {} returned with {} tools and {} money",
                villager_id, tools, money
            ),
            EventType::AgentFaulted { agent, reason } => {
                write!(f, "{} removed: {}", agent, reason)
            }
            EventType::TradeExecuted {
                kind,
                wheat,
                tools,
                money,
                wheat_price,
                tools_price,
            } => write!(
                f,
                "{:?}: {} wheat at {}, {} tools at {}, {} money",
                kind, wheat, wheat_price, tools, tools_price, money
            ),
            EventType::WheatMarketChanged {
                open,
                wheat,
                reserve,
            } => write!(
                f,
                "Wheat market {} ({} wheat, reserve {})",
                if *open { "OPEN" } else { "CLOSED" },
                wheat,
                reserve
            ),
            EventType::PricesUpdated {
                wheat_price,
                tools_price,
            } => write!(f, "Prices wheat {} tools {}", wheat_price, tools_price),
            EventType::PricingFailed { reason } => write!(f, "Pricing failed: {}", reason),
            EventType::TraderWaiting { money, tools } => write!(
                f,
                "Trader waiting for wheat ({} money, {} tools)",
                money, tools
            ),
            EventType::TraderResumed {
                waited_seconds,
                timed_out,
            } => write!(
                f,
                "Trader left after {:.1}s{}",
                waited_seconds,
                if *timed_out { " (timed out)" } else { "" }
            ),
            EventType::MoneyRenormalized {
                observed,
                expected,
                ratio,
            } => write!(
                f,
                "Money renormalized from {} to {} (x{:.6})",
                observed, expected, ratio
            ),
            EventType::EconomySnapshot {
                town_money,
                village_money,
                trader_money,
                town_population,
                village_population,
            } => write!(
                f,
                "State - Town {} money/{} pop, Village {} money/{} pop, Trader {} money",
                town_money, town_population, village_money, village_population, trader_money
            ),
        }
    }
}

#[derive(Default)]
pub struct EventLogger {
    events: Vec<Event>,
}

impl EventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, tick: u64, sim_time: f64, source: &str, event_type: EventType) {
        self.events.push(Event {
            timestamp: Utc::now(),
            tick,
            sim_time,
            source: source.to_string(),
            event_type,
        });
    }

    pub fn get_events(&self) -> &[Event] {
        &self.events
    }

    /// The most recent `count` events, oldest first.
    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn save_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.events)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let events: Vec<Event> = serde_json::from_str(&json)?;
        Ok(Self { events })
    }
}

pub const TRADE_LOG_CAPACITY: usize = 100;

/// One line of the trade log shown to players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub sim_time: f64,
    pub kind: TradeKind,
    pub wheat_amount: f64,
    pub tools_amount: f64,
    pub wheat_price: f64,
    pub tools_price: f64,
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:?}: {:.1} wheat at {:.2} for {:.1} tools at {:.2}",
            self.timestamp.format("%H:%M:%S"),
            self.kind,
            self.wheat_amount,
            self.wheat_price,
            self.tools_amount,
            self.tools_price
        )
    }
}

/// Bounded trade history, newest first.
#[derive(Debug, Clone, Default)]
pub struct TradeLog {
    entries: std::collections::VecDeque<TradeRecord>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sim_time: f64, trade: &Trade) {
        self.entries.push_front(TradeRecord {
            timestamp: Utc::now(),
            sim_time,
            kind: trade.kind,
            wheat_amount: trade.wheat,
            tools_amount: trade.tools,
            wheat_price: trade.wheat_price,
            tools_price: trade.tools_price,
        });
        self.entries.truncate(TRADE_LOG_CAPACITY);
    }

    pub fn entries(&self) -> impl Iterator<Item = &TradeRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
