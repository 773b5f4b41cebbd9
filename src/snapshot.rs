//! Read-only view of the simulation for renderers and reports.

use serde::Serialize;

use crate::agents::{TraderPhase, VillagerPhase};
use crate::events::TradeRecord;
use crate::ledger::Ledger;
use crate::population::Population;
use crate::pricing::{MarketIndicators, PriceQuote};
use crate::types::{Position, Settlement};

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub sim_time: f64,
    pub prices: PriceQuote,
    pub indicators: MarketIndicators,
    pub town: SettlementView,
    pub village: SettlementView,
    pub villagers: Vec<VillagerView>,
    pub trader: TraderView,
    pub total_money: f64,
    pub trade_log: Vec<TradeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementView {
    pub settlement: Settlement,
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
    pub max_storage: f64,
    pub depletion_rate: f64,
    pub wheat_reserve: f64,
    pub wheat_market_open: bool,
    pub population: f64,
    pub population_base: f64,
    /// Cycle progress of each production unit, in `[0, 1]`.
    pub production_progress: Vec<f64>,
}

impl SettlementView {
    pub fn new(ledger: &Ledger, population: &Population, production_progress: Vec<f64>) -> Self {
        Self {
            settlement: ledger.settlement,
            wheat: ledger.wheat(),
            tools: ledger.tools(),
            money: ledger.money(),
            max_storage: ledger.max_storage,
            depletion_rate: ledger.effective_depletion_rate(),
            wheat_reserve: ledger.wheat_reserve,
            wheat_market_open: ledger.wheat_market_open(),
            population: population.current,
            population_base: population.base,
            production_progress,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VillagerView {
    pub id: u64,
    pub position: Position,
    pub phase: VillagerPhase,
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraderView {
    pub position: Position,
    pub phase: TraderPhase,
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
    pub capacity: f64,
    pub trade_cooldown: f64,
    pub waiting_for_wheat: bool,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save_to_file(&self, path: &str) -> std::io::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
