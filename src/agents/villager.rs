use serde::Serialize;

use super::{AgentFault, Axis, Leg, check_motion};
use crate::settlement::MarketContext;
use crate::types::{Position, map};

/// Round trip: climb to the town road, travel east, trade once, travel back
/// west, descend home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VillagerPhase {
    OutboundClimb,
    OutboundTravel,
    TradeAtTown,
    InboundTravel,
    InboundDescend,
    Done,
}

impl VillagerPhase {
    /// Phase entered once this one's goal is met.
    pub fn next(self) -> Self {
        match self {
            VillagerPhase::OutboundClimb => VillagerPhase::OutboundTravel,
            VillagerPhase::OutboundTravel => VillagerPhase::TradeAtTown,
            VillagerPhase::TradeAtTown => VillagerPhase::InboundTravel,
            VillagerPhase::InboundTravel => VillagerPhase::InboundDescend,
            VillagerPhase::InboundDescend => VillagerPhase::Done,
            VillagerPhase::Done => VillagerPhase::Done,
        }
    }

    /// Route segment walked during this phase, if it is a travel phase.
    pub fn leg(self) -> Option<Leg> {
        let town = map::VILLAGER_TOWN_WAYPOINT;
        let home = map::VILLAGER_HOME_WAYPOINT;
        match self {
            VillagerPhase::OutboundClimb => Some(Leg::new(Axis::Y, town.y, false)),
            VillagerPhase::OutboundTravel => Some(Leg::new(Axis::X, town.x, true)),
            VillagerPhase::InboundTravel => Some(Leg::new(Axis::X, home.x, false)),
            VillagerPhase::InboundDescend => Some(Leg::new(Axis::Y, home.y, true)),
            VillagerPhase::TradeAtTown | VillagerPhase::Done => None,
        }
    }

    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            VillagerPhase::OutboundClimb | VillagerPhase::OutboundTravel | VillagerPhase::TradeAtTown
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Villager {
    pub id: u64,
    pub position: Position,
    pub phase: VillagerPhase,
    pub speed: f64,
    pub wheat_carried: f64,
    pub tools_carried: f64,
    pub money_carried: f64,
    pub has_traded: bool,
    steps: u32,
    max_steps: u32,
}

impl Villager {
    pub fn new(id: u64, wheat: f64, speed: f64, max_steps: u32) -> Self {
        Self {
            id,
            position: map::VILLAGER_SPAWN,
            phase: VillagerPhase::OutboundClimb,
            speed,
            wheat_carried: wheat,
            tools_carried: 0.0,
            money_carried: 0.0,
            has_traded: false,
            steps: 0,
            max_steps,
        }
    }

    pub fn finished(&self) -> bool {
        self.phase == VillagerPhase::Done
    }

    /// Advances one tick: one step of movement, or the action at a waypoint.
    pub fn update(&mut self, market: &mut dyn MarketContext) -> Result<(), AgentFault> {
        if self.finished() {
            return Ok(());
        }
        check_motion(self.position, self.speed)?;
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(AgentFault::StepLimit { steps: self.steps });
        }

        loop {
            if let Some(leg) = self.phase.leg() {
                if leg.advance(&mut self.position, self.speed) {
                    return Ok(());
                }
                if self.phase.next() == VillagerPhase::Done {
                    self.arrive_home(market);
                    return Ok(());
                }
                self.phase = self.phase.next();
                continue;
            }

            match self.phase {
                VillagerPhase::TradeAtTown => {
                    self.trade_at_town(market);
                    self.phase = self.phase.next();
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }

    fn trade_at_town(&mut self, market: &mut dyn MarketContext) {
        if self.has_traded {
            return;
        }
        self.has_traded = true;
        if let Some(sale) = market.sell_wheat_for_tools(self.wheat_carried) {
            self.wheat_carried = 0.0;
            self.tools_carried = sale.tools;
            self.money_carried = sale.money;
        }
    }

    fn arrive_home(&mut self, market: &mut dyn MarketContext) {
        market.deliver_home(self.wheat_carried, self.tools_carried, self.money_carried);
        self.wheat_carried = 0.0;
        self.tools_carried = 0.0;
        self.money_carried = 0.0;
        self.phase = VillagerPhase::Done;
    }

    /// Empties the villager's pockets, for an agent removed after a fault.
    pub fn surrender_assets(&mut self) -> (f64, f64, f64) {
        let assets = (self.wheat_carried, self.tools_carried, self.money_carried);
        self.wheat_carried = 0.0;
        self.tools_carried = 0.0;
        self.money_carried = 0.0;
        assets
    }

    /// Upper bound on ticks needed for a full round trip at this speed.
    pub fn round_trip_bound(speed: f64) -> u32 {
        let spawn = map::VILLAGER_SPAWN;
        let town = map::VILLAGER_TOWN_WAYPOINT;
        let home = map::VILLAGER_HOME_WAYPOINT;
        let distance = (spawn.y - town.y).abs()
            + (town.x - spawn.x).abs()
            + (town.x - home.x).abs()
            + (home.y - town.y).abs();
        // One step per unit of speed plus a tick for each waypoint action.
        (distance / speed).ceil() as u32 + 8
    }
}
