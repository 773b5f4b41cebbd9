//! Trade settlement between agents and settlement ledgers.
//!
//! Every function here is one trade leg: it checks feasibility (money on hand,
//! carrying capacity, storage, stock) and moves goods and money together.
//! An infeasible leg is a normal outcome and changes nothing.

use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;
use crate::pricing::PriceQuote;
use crate::types::Good;

/// Markup the trader charges when selling.
pub const SELL_MARKUP: f64 = 1.2;
/// Discount the trader gets when buying.
pub const BUY_DISCOUNT: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// A villager swapped its wheat for town tools.
    VillagerSale,
    /// A villager handed its tools and money to the village.
    VillagerReturn,
    TraderSoldTools,
    TraderBoughtWheat,
    TraderSoldWheat,
    TraderBoughtTools,
}

/// One completed trade leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub kind: TradeKind,
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
    pub wheat_price: f64,
    pub tools_price: f64,
}

/// Goods and money carried by the trader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cargo {
    pub wheat: f64,
    pub tools: f64,
    pub money: f64,
    /// Per-good carrying limit.
    pub capacity: f64,
}

impl Cargo {
    pub fn new(money: f64, capacity: f64) -> Self {
        Self {
            wheat: 0.0,
            tools: 0.0,
            money,
            capacity,
        }
    }

    pub fn space_for(&self, good: Good) -> f64 {
        let held = match good {
            Good::Wheat => self.wheat,
            Good::Tools => self.tools,
        };
        (self.capacity - held).max(0.0)
    }
}

/// What a villager carries home after trading in town.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VillagerSale {
    pub tools: f64,
    pub money: f64,
}

/// Operations agents may perform on the market.
///
/// Agents receive this at update time and never reach the ledgers directly.
pub trait MarketContext {
    fn prices(&self) -> PriceQuote;

    fn wheat_market_open(&self) -> bool;

    /// Villager leg at town. `None` when town cannot supply a single tool.
    fn sell_wheat_for_tools(&mut self, wheat: f64) -> Option<VillagerSale>;

    /// Villager arriving home with whatever it still carries.
    fn deliver_home(&mut self, wheat: f64, tools: f64, money: f64);

    /// Trader visit to the village. Returns whether any leg executed.
    fn trade_at_village(&mut self, cargo: &mut Cargo) -> bool;

    fn trade_at_town(&mut self, cargo: &mut Cargo);

    /// Hands the assets of a faulted agent back to the village.
    fn recover_assets(&mut self, wheat: f64, tools: f64, money: f64);
}

/// Number of whole units `budget` buys at `unit_price`.
fn affordable(budget: f64, unit_price: f64) -> f64 {
    if unit_price <= 0.0 || budget <= 0.0 {
        return 0.0;
    }
    (budget / unit_price).floor()
}

/// Villager sale at town.
///
/// The village is charged for the wheat at the point of sale; the villager
/// carries the sale value back as cash. With no tool obtainable nothing moves.
pub fn settle_villager_sale(
    town: &mut Ledger,
    village: &mut Ledger,
    prices: PriceQuote,
    wheat: f64,
) -> Option<(VillagerSale, Trade)> {
    let max_tools = affordable(wheat * prices.wheat_price, prices.tools_price).min(town.tools());
    if max_tools <= 0.0 {
        return None;
    }

    let value = wheat * prices.wheat_price;
    town.credit(Good::Wheat, wheat);
    town.debit(Good::Tools, max_tools);
    let paid = village.debit_money(value);
    town.credit_money(paid);

    let sale = VillagerSale {
        tools: max_tools,
        money: value,
    };
    let trade = Trade {
        kind: TradeKind::VillagerSale,
        wheat,
        tools: max_tools,
        money: value,
        wheat_price: prices.wheat_price,
        tools_price: prices.tools_price,
    };
    Some((sale, trade))
}

/// Villager arriving home. Unsold wheat goes back into village storage.
pub fn settle_villager_return(
    village: &mut Ledger,
    prices: PriceQuote,
    wheat: f64,
    tools: f64,
    money: f64,
) -> Trade {
    let wheat = village.credit(Good::Wheat, wheat);
    let stored = village.credit(Good::Tools, tools);
    village.credit_money(money);
    Trade {
        kind: TradeKind::VillagerReturn,
        wheat,
        tools: stored,
        money,
        wheat_price: prices.wheat_price,
        tools_price: prices.tools_price,
    }
}

/// Trader sells carried tools to the village at a markup.
pub fn trader_sell_tools(village: &mut Ledger, cargo: &mut Cargo, prices: PriceQuote) -> Option<Trade> {
    if cargo.tools <= 0.0 {
        return None;
    }
    let price = prices.tools_price * SELL_MARKUP;
    let quantity = cargo
        .tools
        .min(affordable(village.money(), price))
        .min(village.headroom(Good::Tools));
    if quantity <= 0.0 {
        return None;
    }

    let cost = village.debit_money(quantity * price);
    village.credit(Good::Tools, quantity);
    cargo.tools -= quantity;
    cargo.money += cost;

    Some(Trade {
        kind: TradeKind::TraderSoldTools,
        wheat: 0.0,
        tools: quantity,
        money: cost,
        wheat_price: prices.wheat_price,
        tools_price: price,
    })
}

/// Trader buys village wheat above the reserve at a discount.
///
/// Callers must only invoke this while the village wheat market is open.
pub fn trader_buy_wheat(village: &mut Ledger, cargo: &mut Cargo, prices: PriceQuote) -> Option<Trade> {
    let price = prices.wheat_price * BUY_DISCOUNT;
    let quantity = affordable(cargo.money, price)
        .min(cargo.space_for(Good::Wheat))
        .min(village.wheat_above_reserve());
    if quantity <= 0.0 {
        return None;
    }

    let cost = quantity * price;
    village.debit(Good::Wheat, quantity);
    village.credit_money(cost);
    cargo.wheat += quantity;
    cargo.money -= cost;

    Some(Trade {
        kind: TradeKind::TraderBoughtWheat,
        wheat: quantity,
        tools: 0.0,
        money: cost,
        wheat_price: price,
        tools_price: prices.tools_price,
    })
}

/// Trader sells all carried wheat to the town at a markup.
///
/// The town always takes the wheat (storage clamps what it keeps) and pays
/// as much of the proceeds as its treasury holds.
pub fn trader_sell_wheat(town: &mut Ledger, cargo: &mut Cargo, prices: PriceQuote) -> Option<Trade> {
    if cargo.wheat <= 0.0 {
        return None;
    }
    let price = prices.wheat_price * SELL_MARKUP;
    let quantity = cargo.wheat;

    town.credit(Good::Wheat, quantity);
    let paid = town.debit_money(quantity * price);
    cargo.wheat = 0.0;
    cargo.money += paid;

    Some(Trade {
        kind: TradeKind::TraderSoldWheat,
        wheat: quantity,
        tools: 0.0,
        money: paid,
        wheat_price: price,
        tools_price: prices.tools_price,
    })
}

/// Trader buys town tools at a discount.
pub fn trader_buy_tools(town: &mut Ledger, cargo: &mut Cargo, prices: PriceQuote) -> Option<Trade> {
    let price = prices.tools_price * BUY_DISCOUNT;
    let quantity = affordable(cargo.money, price)
        .min(cargo.space_for(Good::Tools))
        .min(town.tools());
    if quantity <= 0.0 {
        return None;
    }

    let cost = quantity * price;
    town.debit(Good::Tools, quantity);
    town.credit_money(cost);
    cargo.tools += quantity;
    cargo.money -= cost;

    Some(Trade {
        kind: TradeKind::TraderBoughtTools,
        wheat: 0.0,
        tools: quantity,
        money: cost,
        wheat_price: prices.wheat_price,
        tools_price: price,
    })
}

/// The market as seen by agents during one tick.
///
/// Borrows both ledgers for the duration of the agent pass so settlements
/// happen strictly one at a time. Completed legs are collected in `trades`.
pub struct Market<'a> {
    pub town: &'a mut Ledger,
    pub village: &'a mut Ledger,
    pub prices: PriceQuote,
    pub trades: &'a mut Vec<Trade>,
}

impl MarketContext for Market<'_> {
    fn prices(&self) -> PriceQuote {
        self.prices
    }

    fn wheat_market_open(&self) -> bool {
        self.village.has_wheat_for_sale()
    }

    fn sell_wheat_for_tools(&mut self, wheat: f64) -> Option<VillagerSale> {
        let (sale, trade) = settle_villager_sale(self.town, self.village, self.prices, wheat)?;
        self.trades.push(trade);
        Some(sale)
    }

    fn deliver_home(&mut self, wheat: f64, tools: f64, money: f64) {
        let trade = settle_villager_return(self.village, self.prices, wheat, tools, money);
        self.trades.push(trade);
    }

    fn trade_at_village(&mut self, cargo: &mut Cargo) -> bool {
        let mut traded = false;
        if let Some(trade) = trader_sell_tools(self.village, cargo, self.prices) {
            self.trades.push(trade);
            traded = true;
        }
        if self.village.has_wheat_for_sale() {
            if let Some(trade) = trader_buy_wheat(self.village, cargo, self.prices) {
                self.trades.push(trade);
                traded = true;
            }
        }
        traded
    }

    fn trade_at_town(&mut self, cargo: &mut Cargo) {
        if let Some(trade) = trader_sell_wheat(self.town, cargo, self.prices) {
            self.trades.push(trade);
        }
        if let Some(trade) = trader_buy_tools(self.town, cargo, self.prices) {
            self.trades.push(trade);
        }
    }

    fn recover_assets(&mut self, wheat: f64, tools: f64, money: f64) {
        self.village.credit(Good::Wheat, wheat);
        self.village.credit(Good::Tools, tools);
        self.village.credit_money(money);
    }
}
