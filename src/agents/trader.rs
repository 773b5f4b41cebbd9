use serde::Serialize;

use super::{AgentFault, Axis, Leg, check_motion};
use crate::scenario::TraderConfig;
use crate::settlement::{Cargo, MarketContext};
use crate::types::{Position, map};

/// Perpetual shuttle between town and village.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraderPhase {
    ToVillageClimb,
    ToVillageTravel,
    TradeAtVillage,
    /// Parked at the village until its wheat market opens.
    WaitingForWheat,
    ToTownTravel,
    ToTownClimb,
    TradeAtTown,
}

impl TraderPhase {
    /// Phase entered once this one's goal is met.
    pub fn next(self) -> Self {
        match self {
            TraderPhase::ToVillageClimb => TraderPhase::ToVillageTravel,
            TraderPhase::ToVillageTravel => TraderPhase::TradeAtVillage,
            TraderPhase::TradeAtVillage => TraderPhase::ToTownTravel,
            TraderPhase::WaitingForWheat => TraderPhase::ToTownTravel,
            TraderPhase::ToTownTravel => TraderPhase::ToTownClimb,
            TraderPhase::ToTownClimb => TraderPhase::TradeAtTown,
            TraderPhase::TradeAtTown => TraderPhase::ToVillageClimb,
        }
    }

    pub fn leg(self) -> Option<Leg> {
        let town = map::TRADER_TOWN_WAYPOINT;
        let village = map::TRADER_VILLAGE_WAYPOINT;
        match self {
            TraderPhase::ToVillageClimb => Some(Leg::new(Axis::Y, village.y, true)),
            TraderPhase::ToVillageTravel => Some(Leg::new(Axis::X, village.x, false)),
            TraderPhase::ToTownTravel => Some(Leg::new(Axis::X, town.x, true)),
            TraderPhase::ToTownClimb => Some(Leg::new(Axis::Y, town.y, false)),
            TraderPhase::TradeAtVillage | TraderPhase::WaitingForWheat | TraderPhase::TradeAtTown => {
                None
            }
        }
    }

    pub fn heading_to_village(self) -> bool {
        matches!(
            self,
            TraderPhase::ToVillageClimb | TraderPhase::ToVillageTravel | TraderPhase::TradeAtVillage
        )
    }
}

/// What happened to the trader during one update, for the event journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraderOutcome {
    Moved,
    Traded,
    StartedWaiting,
    Waiting,
    /// Left the village after waiting; `timed_out` when the market never opened.
    StoppedWaiting { timed_out: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct Trader {
    pub position: Position,
    pub phase: TraderPhase,
    pub speed: f64,
    pub cargo: Cargo,
    /// Seconds until the trader may settle again.
    pub trade_cooldown: f64,
    cooldown_period: f64,
    wait_timeout: Option<f64>,
    waited: f64,
}

impl Trader {
    pub fn new(config: &TraderConfig, money: f64) -> Self {
        Self {
            position: map::TRADER_START,
            phase: TraderPhase::ToVillageClimb,
            speed: config.speed,
            cargo: Cargo::new(money, config.capacity),
            trade_cooldown: 0.0,
            cooldown_period: config.trade_cooldown,
            wait_timeout: config.wait_timeout,
            waited: 0.0,
        }
    }

    pub fn waiting_for_wheat(&self) -> bool {
        self.phase == TraderPhase::WaitingForWheat
    }

    pub fn seconds_waited(&self) -> f64 {
        self.waited
    }

    pub fn update(
        &mut self,
        delta_time: f64,
        market: &mut dyn MarketContext,
    ) -> Result<TraderOutcome, AgentFault> {
        check_motion(self.position, self.speed)?;
        self.trade_cooldown = (self.trade_cooldown - delta_time).max(0.0);

        if self.waiting_for_wheat() {
            return Ok(self.keep_waiting(delta_time, market));
        }

        loop {
            if let Some(leg) = self.phase.leg() {
                if leg.advance(&mut self.position, self.speed) {
                    return Ok(TraderOutcome::Moved);
                }
                self.phase = self.phase.next();
                continue;
            }

            return Ok(match self.phase {
                TraderPhase::TradeAtVillage => self.visit_village(market),
                TraderPhase::TradeAtTown => {
                    let traded = self.trade_cooldown <= 0.0;
                    if traded {
                        market.trade_at_town(&mut self.cargo);
                        self.trade_cooldown = self.cooldown_period;
                    }
                    self.phase = self.phase.next();
                    if traded {
                        TraderOutcome::Traded
                    } else {
                        TraderOutcome::Moved
                    }
                }
                _ => TraderOutcome::Moved,
            });
        }
    }

    fn visit_village(&mut self, market: &mut dyn MarketContext) -> TraderOutcome {
        if self.trade_cooldown > 0.0 {
            self.phase = self.phase.next();
            return TraderOutcome::Moved;
        }
        if market.trade_at_village(&mut self.cargo) {
            self.trade_cooldown = self.cooldown_period;
            self.phase = self.phase.next();
            TraderOutcome::Traded
        } else {
            self.phase = TraderPhase::WaitingForWheat;
            self.waited = 0.0;
            TraderOutcome::StartedWaiting
        }
    }

    /// Polls the village market every tick while parked.
    ///
    /// When the market opens the trader tries the village once more and then
    /// heads for town whether or not that attempt succeeded.
    fn keep_waiting(&mut self, delta_time: f64, market: &mut dyn MarketContext) -> TraderOutcome {
        self.waited += delta_time;

        if market.wheat_market_open() {
            if self.trade_cooldown <= 0.0 && market.trade_at_village(&mut self.cargo) {
                self.trade_cooldown = self.cooldown_period;
            }
            self.phase = self.phase.next();
            return TraderOutcome::StoppedWaiting { timed_out: false };
        }

        if self.wait_timeout.is_some_and(|limit| self.waited >= limit) {
            self.phase = self.phase.next();
            return TraderOutcome::StoppedWaiting { timed_out: true };
        }

        TraderOutcome::Waiting
    }

    pub(crate) fn scale_money(&mut self, ratio: f64) {
        self.cargo.money = (self.cargo.money * ratio).max(0.0);
    }

    /// Puts a trader with corrupted motion back at the town gate.
    pub fn reset_position(&mut self) {
        self.position = map::TRADER_START;
        self.phase = TraderPhase::ToVillageClimb;
        self.speed = if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            TraderConfig::default().speed
        };
    }
}
