pub mod trader;
pub mod villager;

use std::error::Error;
use std::fmt;

use serde::Serialize;

use crate::types::Position;

pub use trader::{Trader, TraderOutcome, TraderPhase};
pub use villager::{Villager, VillagerPhase};

/// An agent reached a state it cannot advance from.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentFault {
    NonFinite { position: Position, speed: f64 },
    StepLimit { steps: u32 },
}

impl fmt::Display for AgentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentFault::NonFinite { position, speed } => write!(
                f,
                "invalid motion state at ({}, {}) with speed {}",
                position.x, position.y, speed
            ),
            AgentFault::StepLimit { steps } => {
                write!(f, "still travelling after {} steps", steps)
            }
        }
    }
}

impl Error for AgentFault {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
}

/// One straight segment of a route, travelled along a single axis.
///
/// The leg is done once the coordinate has reached or passed `target`
/// in the direction of travel. Agents may overshoot by less than one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub axis: Axis,
    pub target: f64,
    /// `true` when the coordinate grows towards the target.
    pub increasing: bool,
}

impl Leg {
    pub const fn new(axis: Axis, target: f64, increasing: bool) -> Self {
        Self {
            axis,
            target,
            increasing,
        }
    }

    pub fn reached(&self, position: Position) -> bool {
        let coord = match self.axis {
            Axis::X => position.x,
            Axis::Y => position.y,
        };
        if self.increasing {
            coord >= self.target
        } else {
            coord <= self.target
        }
    }

    /// Moves one step along the leg. Returns `false` without moving when
    /// the leg is already complete.
    pub fn advance(&self, position: &mut Position, speed: f64) -> bool {
        if self.reached(*position) {
            return false;
        }
        let step = if self.increasing { speed } else { -speed };
        match self.axis {
            Axis::X => position.x += step,
            Axis::Y => position.y += step,
        }
        true
    }
}

pub(crate) fn check_motion(position: Position, speed: f64) -> Result<(), AgentFault> {
    if position.is_finite() && speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(AgentFault::NonFinite { position, speed })
    }
}
