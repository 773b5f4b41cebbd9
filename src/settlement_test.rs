#[cfg(test)]
mod tests {
    use super::super::ledger::Ledger;
    use super::super::pricing::PriceQuote;
    use super::super::scenario::LedgerConfig;
    use super::super::settlement::*;
    use super::super::types::{Good, Settlement};

    fn town(wheat: f64, tools: f64, money: f64) -> Ledger {
        Ledger::new(
            Settlement::Town,
            &LedgerConfig {
                wheat,
                tools,
                money,
                ..LedgerConfig::default_town()
            },
        )
    }

    fn village(wheat: f64, tools: f64, money: f64) -> Ledger {
        Ledger::new(
            Settlement::Village,
            &LedgerConfig {
                wheat,
                tools,
                money,
                ..LedgerConfig::default_village()
            },
        )
    }

    #[test]
    fn test_villager_sale_moves_goods_and_money() {
        let mut town = town(0.0, 5.0, 1000.0);
        let mut village = village(0.0, 0.0, 500.0);
        let prices = PriceQuote::new(2.0, 1.0);

        let (sale, trade) = settle_villager_sale(&mut town, &mut village, prices, 10.0).unwrap();

        assert_eq!(sale, VillagerSale { tools: 5.0, money: 20.0 });
        assert_eq!(trade.kind, TradeKind::VillagerSale);
        assert_eq!(town.wheat(), 10.0);
        assert_eq!(town.tools(), 0.0);
        assert_eq!(town.money(), 1020.0);
        assert_eq!(village.money(), 480.0);

        let back = settle_villager_return(&mut village, prices, 0.0, sale.tools, sale.money);
        assert_eq!(back.tools, 5.0);
        assert_eq!(village.tools(), 5.0);
        assert_eq!(village.money(), 500.0);
    }

    #[test]
    fn test_villager_sale_limited_by_price_ratio() {
        let mut town = town(0.0, 50.0, 1000.0);
        let mut village = village(0.0, 0.0, 500.0);

        let (sale, _) =
            settle_villager_sale(&mut town, &mut village, PriceQuote::new(1.0, 3.0), 10.0).unwrap();

        assert_eq!(sale.tools, 3.0);
        assert_eq!(town.tools(), 47.0);
    }

    #[test]
    fn test_villager_sale_without_tools_changes_nothing() {
        let mut town = town(4.0, 0.0, 1000.0);
        let mut village = village(0.0, 0.0, 500.0);

        let result = settle_villager_sale(&mut town, &mut village, PriceQuote::new(2.0, 1.0), 10.0);

        assert!(result.is_none());
        assert_eq!(town.wheat(), 4.0);
        assert_eq!(town.money(), 1000.0);
        assert_eq!(village.money(), 500.0);

        // Cheap wheat against dear tools also buys nothing.
        let mut town = self::town(0.0, 10.0, 1000.0);
        let result = settle_villager_sale(&mut town, &mut village, PriceQuote::new(1.0, 20.0), 10.0);
        assert!(result.is_none());
    }

    #[test]
    fn test_unsold_wheat_goes_back_to_storage() {
        let mut village = village(195.0, 0.0, 500.0);
        let trade = settle_villager_return(&mut village, PriceQuote::new(1.0, 1.0), 10.0, 0.0, 0.0);

        assert_eq!(trade.wheat, 5.0);
        assert_eq!(village.wheat(), 200.0);
    }

    #[test]
    fn test_trader_sells_tools_within_village_means() {
        let prices = PriceQuote::new(10.0, 10.0);
        let mut cargo = Cargo::new(0.0, 15.0);
        cargo.tools = 10.0;

        // 12 per tool; 50 money buys 4.
        let mut poor = village(0.0, 0.0, 50.0);
        let trade = trader_sell_tools(&mut poor, &mut cargo, prices).unwrap();
        assert_eq!(trade.tools, 4.0);
        assert_eq!(trade.money, 48.0);
        assert_eq!(cargo.tools, 6.0);
        assert_eq!(cargo.money, 48.0);
        assert_eq!(poor.money(), 2.0);

        // Storage headroom caps the sale.
        let mut full = village(0.0, 198.0, 500.0);
        let trade = trader_sell_tools(&mut full, &mut cargo, prices).unwrap();
        assert_eq!(trade.tools, 2.0);
        assert_eq!(full.tools(), 200.0);

        let mut broke = village(0.0, 0.0, 0.0);
        assert!(trader_sell_tools(&mut broke, &mut cargo, prices).is_none());
    }

    #[test]
    fn test_trader_buys_only_wheat_above_reserve() {
        let prices = PriceQuote::new(10.0, 10.0);
        let mut village = village(26.0, 0.0, 500.0);
        let mut cargo = Cargo::new(200.0, 15.0);

        let trade = trader_buy_wheat(&mut village, &mut cargo, prices).unwrap();

        assert_eq!(trade.wheat, 6.0);
        assert_eq!(trade.money, 48.0);
        assert_eq!(village.wheat(), 20.0);
        assert_eq!(village.money(), 548.0);
        assert_eq!(cargo.wheat, 6.0);
        assert_eq!(cargo.money, 152.0);

        assert!(trader_buy_wheat(&mut village, &mut cargo, prices).is_none());
    }

    #[test]
    fn test_trader_wheat_purchase_limited_by_capacity_and_money() {
        let prices = PriceQuote::new(10.0, 10.0);
        let mut village = village(150.0, 0.0, 500.0);

        let mut cargo = Cargo::new(1000.0, 15.0);
        cargo.wheat = 12.0;
        assert_eq!(trader_buy_wheat(&mut village, &mut cargo, prices).unwrap().wheat, 3.0);

        let mut cargo = Cargo::new(20.0, 15.0);
        assert_eq!(trader_buy_wheat(&mut village, &mut cargo, prices).unwrap().wheat, 2.0);
    }

    #[test]
    fn test_trader_sells_all_wheat_to_town() {
        let prices = PriceQuote::new(10.0, 10.0);
        let mut town = town(195.0, 0.0, 100.0);
        let mut cargo = Cargo::new(0.0, 15.0);
        cargo.wheat = 15.0;

        let trade = trader_sell_wheat(&mut town, &mut cargo, prices).unwrap();

        // Storage clamps the wheat and the treasury caps the payment.
        assert_eq!(town.wheat(), 200.0);
        assert_eq!(trade.wheat, 15.0);
        assert_eq!(trade.money, 100.0);
        assert_eq!(town.money(), 0.0);
        assert_eq!(cargo.wheat, 0.0);
        assert_eq!(cargo.money, 100.0);

        assert!(trader_sell_wheat(&mut town, &mut cargo, prices).is_none());
    }

    #[test]
    fn test_trader_buys_tools_from_town() {
        let prices = PriceQuote::new(10.0, 5.0);
        let mut town = town(0.0, 30.0, 1000.0);
        let mut cargo = Cargo::new(200.0, 15.0);

        let trade = trader_buy_tools(&mut town, &mut cargo, prices).unwrap();

        assert_eq!(trade.tools, 15.0);
        assert_eq!(trade.money, 60.0);
        assert_eq!(town.tools(), 15.0);
        assert_eq!(town.money(), 1060.0);
        assert_eq!(cargo.money, 140.0);

        let mut empty = self::town(0.0, 0.0, 1000.0);
        let mut cargo = Cargo::new(200.0, 15.0);
        assert!(trader_buy_tools(&mut empty, &mut cargo, prices).is_none());
    }

    #[test]
    fn test_market_skips_wheat_while_closed() {
        let mut town = town(0.0, 0.0, 1000.0);
        let mut village = village(20.0, 0.0, 500.0);
        let mut trades = Vec::new();
        let mut cargo = Cargo::new(200.0, 15.0);

        let mut market = Market {
            town: &mut town,
            village: &mut village,
            prices: PriceQuote::new(10.0, 10.0),
            trades: &mut trades,
        };
        assert!(!market.wheat_market_open());
        assert!(!market.trade_at_village(&mut cargo));
        assert!(trades.is_empty());
        assert_eq!(cargo.wheat, 0.0);
    }

    #[test]
    fn test_market_gate_follows_current_stock() {
        let mut town = town(0.0, 0.0, 1000.0);
        let mut village = village(25.0, 0.0, 500.0);
        assert!(village.wheat_market_open());
        village.debit(Good::Wheat, 10.0);

        let mut trades = Vec::new();
        let mut cargo = Cargo::new(200.0, 15.0);
        let mut market = Market {
            town: &mut town,
            village: &mut village,
            prices: PriceQuote::new(10.0, 10.0),
            trades: &mut trades,
        };
        assert!(!market.wheat_market_open());
        assert!(!market.trade_at_village(&mut cargo));
        assert_eq!(cargo.wheat, 0.0);
    }

    #[test]
    fn test_market_round_of_trades() {
        let mut town = town(0.0, 10.0, 1000.0);
        let mut village = village(40.0, 0.0, 500.0);
        let mut trades = Vec::new();
        let mut cargo = Cargo::new(200.0, 15.0);
        cargo.tools = 2.0;

        let mut market = Market {
            town: &mut town,
            village: &mut village,
            prices: PriceQuote::new(10.0, 10.0),
            trades: &mut trades,
        };
        assert!(market.trade_at_village(&mut cargo));
        market.trade_at_town(&mut cargo);

        let kinds: Vec<TradeKind> = trades.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeKind::TraderSoldTools,
                TradeKind::TraderBoughtWheat,
                TradeKind::TraderSoldWheat,
                TradeKind::TraderBoughtTools,
            ]
        );
        assert_eq!(village.stock(Good::Tools), 2.0);
        assert_eq!(town.stock(Good::Wheat), 15.0);
    }

    #[test]
    fn test_recovered_assets_return_to_village() {
        let mut town = town(0.0, 0.0, 1000.0);
        let mut village = village(0.0, 0.0, 480.0);
        let mut trades = Vec::new();

        let mut market = Market {
            town: &mut town,
            village: &mut village,
            prices: PriceQuote::new(2.0, 1.0),
            trades: &mut trades,
        };
        market.recover_assets(3.0, 5.0, 20.0);

        assert_eq!(village.wheat(), 3.0);
        assert_eq!(village.tools(), 5.0);
        assert_eq!(village.money(), 500.0);
        assert!(trades.is_empty());
    }
}
