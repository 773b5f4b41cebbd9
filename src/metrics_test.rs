#[cfg(test)]
mod tests {
    use super::super::events::*;
    use super::super::metrics::*;
    use super::super::settlement::TradeKind;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn event(tick: u64, source: &str, event_type: EventType) -> Event {
        Event {
            timestamp: Utc::now(),
            tick,
            sim_time: tick as f64 / 60.0,
            source: source.to_string(),
            event_type,
        }
    }

    fn create_test_events() -> Vec<Event> {
        vec![
            event(
                1,
                "village",
                EventType::VillagerSpawned {
                    villager_id: 1,
                    wheat: dec!(10),
                    speed: 2.0,
                    active_villagers: 1,
                },
            ),
            event(
                2,
                "market",
                EventType::PricesUpdated {
                    wheat_price: dec!(12.5),
                    tools_price: dec!(8),
                },
            ),
            event(
                3,
                "market",
                EventType::PricesUpdated {
                    wheat_price: dec!(9),
                    tools_price: dec!(11),
                },
            ),
            event(
                150,
                "market",
                EventType::TradeExecuted {
                    kind: TradeKind::VillagerSale,
                    wheat: dec!(10),
                    tools: dec!(5),
                    money: dec!(20),
                    wheat_price: dec!(2),
                    tools_price: dec!(1),
                },
            ),
            event(
                400,
                "market",
                EventType::TradeExecuted {
                    kind: TradeKind::TraderBoughtWheat,
                    wheat: dec!(15),
                    tools: dec!(0),
                    money: dec!(96),
                    wheat_price: dec!(6.4),
                    tools_price: dec!(10),
                },
            ),
            event(
                401,
                "trader",
                EventType::TraderResumed {
                    waited_seconds: 12.5,
                    timed_out: true,
                },
            ),
            event(
                420,
                "villager-1",
                EventType::VillagerReturned {
                    villager_id: 1,
                    tools: dec!(5),
                    money: dec!(20),
                },
            ),
            event(
                500,
                "auditor",
                EventType::MoneyRenormalized {
                    observed: dec!(1720),
                    expected: dec!(1700),
                    ratio: 1700.0 / 1720.0,
                },
            ),
            event(
                500,
                "auditor",
                EventType::EconomySnapshot {
                    town_money: dec!(1000),
                    village_money: dec!(500),
                    trader_money: dec!(200),
                    town_population: dec!(101.5),
                    village_population: dec!(49),
                },
            ),
        ]
    }

    #[test]
    fn test_summary_counts_and_volumes() {
        let summary = MetricsCalculator::summarize(&create_test_events());

        assert_eq!(summary.ticks, 500);
        assert_eq!(summary.villagers_spawned, 1);
        assert_eq!(summary.villagers_returned, 1);
        assert_eq!(summary.tools_brought_home, dec!(5));
        assert_eq!(summary.trades_executed, 2);
        assert_eq!(summary.trades_by_kind.get("VillagerSale"), Some(&1));
        assert_eq!(summary.trades_by_kind.get("TraderBoughtWheat"), Some(&1));
        assert_eq!(summary.wheat_traded, dec!(25));
        assert_eq!(summary.money_exchanged, dec!(116));
        assert_eq!(summary.trader_timeouts, 1);
        assert_eq!(summary.longest_wait, 12.5);
    }

    #[test]
    fn test_price_ranges_and_drift() {
        let summary = MetricsCalculator::summarize(&create_test_events());

        assert_eq!(summary.price_updates, 2);
        assert_eq!(summary.wheat_price_range, Some((dec!(9), dec!(12.5))));
        assert_eq!(summary.tools_price_range, Some((dec!(8), dec!(11))));
        assert_eq!(summary.renormalizations, 1);
        assert_eq!(summary.max_drift, dec!(20));
    }

    #[test]
    fn test_final_state_from_last_snapshot() {
        let summary = MetricsCalculator::summarize(&create_test_events());

        let state = summary.final_state.as_ref().unwrap();
        assert_eq!(state.village_population, dec!(49));
        assert!(summary.money_inequality > 0.0);
    }

    #[test]
    fn test_empty_journal() {
        let summary = MetricsCalculator::summarize(&[]);
        assert_eq!(summary.trades_executed, 0);
        assert!(summary.final_state.is_none());
        assert!(summary.wheat_price_range.is_none());
    }

    #[test]
    fn test_gini_coefficient() {
        let values = vec![10.0, 10.0, 10.0, 10.0];
        let gini = MetricsCalculator::calculate_gini_coefficient(&values);
        assert!(gini < 0.01);

        let values = vec![100.0, 0.0, 0.0, 0.0];
        let gini = MetricsCalculator::calculate_gini_coefficient(&values);
        assert!(gini > 0.7);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsCalculator::summarize(&create_test_events());

        let display = format!("{}", summary);
        assert!(display.contains("Run Summary (500 ticks"));
        assert!(display.contains("Villagers: 1 spawned, 1 returned"));
        assert!(display.contains("- VillagerSale: 1"));
        assert!(display.contains("Renormalizations: 1 (max drift 20)"));
    }
}
