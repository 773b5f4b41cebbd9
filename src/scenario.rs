use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Every constant of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub economy: EconomyConfig,
    pub town: LedgerConfig,
    pub village: LedgerConfig,
    pub production: ProductionConfig,
    pub population: PopulationConfigs,
    pub villagers: VillagerConfig,
    pub trader: TraderConfig,
    pub timers: TimerConfig,
    pub market: MarketConfig,
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// The fixed amount of money in circulation. The auditor restores it.
    pub total_money: f64,
    pub trader_money: f64,
    pub initial_wheat_price: f64,
    pub initial_tools_price: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            total_money: 1700.0,
            trader_money: 200.0,
            initial_wheat_price: 10.0,
            initial_tools_price: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
    pub depletion_rate: f64,
    pub max_storage: f64,
    /// Only meaningful for the village: wheat kept back from the trader.
    pub wheat_reserve: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            wheat: 0.0,
            tools: 0.0,
            money: 0.0,
            depletion_rate: 1.0,
            max_storage: 200.0,
            wheat_reserve: 0.0,
        }
    }
}

impl LedgerConfig {
    pub fn default_town() -> Self {
        Self {
            money: 1000.0,
            ..Self::default()
        }
    }

    pub fn default_village() -> Self {
        Self {
            money: 500.0,
            wheat_reserve: 20.0,
            ..Self::default()
        }
    }
}

/// `(output_per_cycle, cycle_interval_seconds)` pairs per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    pub farms: Vec<(f64, f64)>,
    pub smithies: Vec<(f64, f64)>,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            farms: vec![(3.0, 3.0), (2.5, 2.0), (2.8, 1.5)],
            smithies: vec![(1.5, 6.0), (1.2, 5.0), (1.0, 4.0)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub base: f64,
    pub growth_rate: f64,
    pub resource_consumption: f64,
    pub min_wealth: f64,
    pub target_wealth: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            base: 100.0,
            growth_rate: 0.01,
            resource_consumption: 1.0,
            min_wealth: 0.1,
            target_wealth: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfigs {
    pub town: PopulationConfig,
    pub village: PopulationConfig,
}

impl Default for PopulationConfigs {
    fn default() -> Self {
        Self {
            town: PopulationConfig::default(),
            village: PopulationConfig {
                base: 50.0,
                min_wealth: 0.05,
                target_wealth: 0.25,
                ..PopulationConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VillagerConfig {
    /// Village wheat needed before a villager sets out.
    pub spawn_threshold: f64,
    pub wheat_payload: f64,
    pub max_active: usize,
    /// Half-open `[min, max)` range villager speeds are drawn from.
    pub speed_range: (f64, f64),
    /// Steps after which a villager still on the road is treated as stuck.
    pub max_steps: u32,
}

impl Default for VillagerConfig {
    fn default() -> Self {
        Self {
            spawn_threshold: 10.0,
            wheat_payload: 10.0,
            max_active: 2,
            speed_range: (1.0, 3.0),
            max_steps: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub speed: f64,
    pub capacity: f64,
    pub trade_cooldown: f64,
    /// Seconds to wait at the village for wheat before leaving empty handed.
    /// `None` waits for as long as it takes.
    pub wait_timeout: Option<f64>,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            speed: 1.5,
            capacity: 15.0,
            trade_cooldown: 3.0,
            wait_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub price_refresh_interval: f64,
    pub audit_interval: f64,
    pub audit_epsilon: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            price_refresh_interval: 2.0,
            audit_interval: 5.0,
            audit_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Demand indicators are `baseline - stock`, floored at zero.
    pub demand_baseline: f64,
    pub wheat_supply: f64,
    pub tools_supply: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            demand_baseline: 100.0,
            wheat_supply: 50.0,
            tools_supply: 50.0,
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: "Town and village trading wheat for tools".to_string(),
            economy: EconomyConfig::default(),
            town: LedgerConfig::default_town(),
            village: LedgerConfig::default_village(),
            production: ProductionConfig::default(),
            population: PopulationConfigs::default(),
            villagers: VillagerConfig::default(),
            trader: TraderConfig::default(),
            timers: TimerConfig::default(),
            market: MarketConfig::default(),
            random_seed: None,
        }
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Money held by the two ledgers and the trader at start.
    pub fn initial_money(&self) -> f64 {
        self.town.money + self.village.money + self.economy.trader_money
    }

    pub fn save_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a scenario from YAML (`.yaml`/`.yml`) or JSON (anything else).
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scenario file {}: {}", path.display(), e))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| format!("Failed to parse YAML: {}", e))
        } else {
            serde_json::from_str(&contents).map_err(|e| format!("Failed to parse JSON: {}", e))
        }
    }

    /// Every numeric parameter with its path, for the finiteness check.
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        let economy = &self.economy;
        let mut fields = vec![
            ("economy.total_money".to_string(), economy.total_money),
            ("economy.trader_money".to_string(), economy.trader_money),
            ("economy.initial_wheat_price".to_string(), economy.initial_wheat_price),
            ("economy.initial_tools_price".to_string(), economy.initial_tools_price),
        ];
        for (site, ledger) in [("town", &self.town), ("village", &self.village)] {
            fields.extend([
                (format!("{}.wheat", site), ledger.wheat),
                (format!("{}.tools", site), ledger.tools),
                (format!("{}.money", site), ledger.money),
                (format!("{}.depletion_rate", site), ledger.depletion_rate),
                (format!("{}.max_storage", site), ledger.max_storage),
                (format!("{}.wheat_reserve", site), ledger.wheat_reserve),
            ]);
        }
        for (site, units) in [
            ("farms", &self.production.farms),
            ("smithies", &self.production.smithies),
        ] {
            for (i, (output, interval)) in units.iter().enumerate() {
                fields.push((format!("production.{}[{}].output", site, i), *output));
                fields.push((format!("production.{}[{}].interval", site, i), *interval));
            }
        }
        for (site, pop) in [
            ("town", &self.population.town),
            ("village", &self.population.village),
        ] {
            fields.extend([
                (format!("population.{}.base", site), pop.base),
                (format!("population.{}.growth_rate", site), pop.growth_rate),
                (
                    format!("population.{}.resource_consumption", site),
                    pop.resource_consumption,
                ),
                (format!("population.{}.min_wealth", site), pop.min_wealth),
                (format!("population.{}.target_wealth", site), pop.target_wealth),
            ]);
        }
        let villagers = &self.villagers;
        let trader = &self.trader;
        let timers = &self.timers;
        let market = &self.market;
        fields.extend([
            ("villagers.spawn_threshold".to_string(), villagers.spawn_threshold),
            ("villagers.wheat_payload".to_string(), villagers.wheat_payload),
            ("villagers.speed_range.min".to_string(), villagers.speed_range.0),
            ("villagers.speed_range.max".to_string(), villagers.speed_range.1),
            ("trader.speed".to_string(), trader.speed),
            ("trader.capacity".to_string(), trader.capacity),
            ("trader.trade_cooldown".to_string(), trader.trade_cooldown),
            ("timers.price_refresh_interval".to_string(), timers.price_refresh_interval),
            ("timers.audit_interval".to_string(), timers.audit_interval),
            ("timers.audit_epsilon".to_string(), timers.audit_epsilon),
            ("market.demand_baseline".to_string(), market.demand_baseline),
            ("market.wheat_supply".to_string(), market.wheat_supply),
            ("market.tools_supply".to_string(), market.tools_supply),
        ]);
        if let Some(timeout) = trader.wait_timeout {
            fields.push(("trader.wait_timeout".to_string(), timeout));
        }
        fields
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some((name, value)) = self
            .numeric_fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(format!("{} must be a finite number, got {}", name, value));
        }
        if self.economy.total_money <= 0.0 {
            return Err("Total money must be positive".to_string());
        }
        if (self.initial_money() - self.economy.total_money).abs() > self.timers.audit_epsilon {
            return Err(format!(
                "Initial money {} does not add up to total money {}",
                self.initial_money(),
                self.economy.total_money
            ));
        }
        if self.economy.initial_wheat_price <= 0.0 || self.economy.initial_tools_price <= 0.0 {
            return Err("Initial prices must be positive".to_string());
        }

        for (site, ledger) in [("town", &self.town), ("village", &self.village)] {
            if ledger.max_storage <= 0.0 {
                return Err(format!("The {} must have positive storage", site));
            }
            if ledger.wheat < 0.0 || ledger.tools < 0.0 || ledger.money < 0.0 {
                return Err(format!("The {} cannot start with negative stock", site));
            }
            if ledger.wheat > ledger.max_storage || ledger.tools > ledger.max_storage {
                return Err(format!("The {} starts above its storage capacity", site));
            }
        }

        for (output, interval) in self.production.farms.iter().chain(&self.production.smithies) {
            if *output <= 0.0 || *interval <= 0.0 {
                return Err(format!(
                    "Production units need positive output and interval, got ({}, {})",
                    output, interval
                ));
            }
        }

        for (site, pop) in [
            ("town", &self.population.town),
            ("village", &self.population.village),
        ] {
            if pop.base <= 0.0 || pop.resource_consumption <= 0.0 {
                return Err(format!(
                    "The {} population needs a positive base and consumption",
                    site
                ));
            }
            let in_unit = |v: f64| (0.0..=1.0).contains(&v);
            if !in_unit(pop.min_wealth) || !in_unit(pop.target_wealth) {
                return Err(format!(
                    "The {} population wealth thresholds must be within [0, 1]",
                    site
                ));
            }
        }

        let (min_speed, max_speed) = self.villagers.speed_range;
        if min_speed <= 0.0 || max_speed <= min_speed {
            return Err(format!(
                "Villager speed range [{}, {}) must be positive and non-empty",
                min_speed, max_speed
            ));
        }
        if self.villagers.wheat_payload <= 0.0 {
            return Err("Villagers must carry some wheat".to_string());
        }
        if self.trader.speed <= 0.0 || self.trader.capacity <= 0.0 {
            return Err("The trader needs positive speed and capacity".to_string());
        }
        if self.timers.price_refresh_interval <= 0.0 || self.timers.audit_interval <= 0.0 {
            return Err("Timer intervals must be positive".to_string());
        }

        Ok(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.name)?;
        writeln!(f, "Description: {}", self.description)?;
        writeln!(f, "\nEconomy:")?;
        writeln!(f, "  Total money: {:.2}", self.economy.total_money)?;
        writeln!(
            f,
            "  Initial prices: wheat {:.2}, tools {:.2}",
            self.economy.initial_wheat_price, self.economy.initial_tools_price
        )?;
        for (site, ledger, units) in [
            ("Town", &self.town, &self.production.smithies),
            ("Village", &self.village, &self.production.farms),
        ] {
            writeln!(f, "\n  {}:", site)?;
            writeln!(
                f,
                "    Stock: {:.1} wheat, {:.1} tools, {:.1} money (storage {:.0})",
                ledger.wheat, ledger.tools, ledger.money, ledger.max_storage
            )?;
            writeln!(f, "    Production units: {}", units.len())?;
        }
        writeln!(
            f,
            "\n  Trader: {:.1} money, capacity {:.0}, speed {:.1}",
            self.economy.trader_money, self.trader.capacity, self.trader.speed
        )?;
        writeln!(
            f,
            "  Villagers: up to {} active, {} wheat each",
            self.villagers.max_active, self.villagers.wheat_payload
        )?;
        if let Some(seed) = self.random_seed {
            writeln!(f, "  Seed: {}", seed)?;
        }
        Ok(())
    }
}

pub fn create_standard_scenarios() -> HashMap<String, Scenario> {
    let mut scenarios = HashMap::new();

    scenarios.insert("default".to_string(), Scenario::default());

    // No production anywhere; nothing should ever move.
    let mut idle = Scenario::new("idle");
    idle.description = "Empty settlements with production disabled".to_string();
    idle.production.farms.clear();
    idle.production.smithies.clear();
    scenarios.insert("idle".to_string(), idle);

    let mut scarcity = Scenario::new("scarcity");
    scarcity.description = "One slow farm and one slow smithy".to_string();
    scarcity.production.farms = vec![(1.0, 4.0)];
    scarcity.production.smithies = vec![(0.5, 8.0)];
    scarcity.trader.wait_timeout = Some(30.0);
    scenarios.insert("scarcity".to_string(), scarcity);

    scenarios
}
