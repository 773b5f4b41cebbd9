use serde::{Deserialize, Serialize};
use std::fmt;

/// The two goods traded between the settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Good {
    Wheat,
    Tools,
}

impl Good {
    pub fn as_str(&self) -> &'static str {
        match self {
            Good::Wheat => "wheat",
            Good::Tools => "tools",
        }
    }
}

impl fmt::Display for Good {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two fixed production sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Settlement {
    Town,
    Village,
}

impl Settlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::Town => "town",
            Settlement::Village => "village",
        }
    }

    /// The good this settlement's population consumes from its own stock.
    pub fn consumed_good(&self) -> Good {
        match self {
            Settlement::Town => Good::Wheat,
            Settlement::Village => Good::Tools,
        }
    }
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point on the map agents travel across.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Map coordinates shared by the agents and the renderer.
pub mod map {
    use super::Position;

    /// Where villagers appear when they leave home.
    pub const VILLAGER_SPAWN: Position = Position::new(50.0, 450.0);
    /// Corner a villager turns at on its way to town, and its trade point.
    pub const VILLAGER_TOWN_WAYPOINT: Position = Position::new(400.0, 140.0);
    /// Villager home waypoint.
    pub const VILLAGER_HOME_WAYPOINT: Position = Position::new(100.0, 400.0);

    pub const TRADER_START: Position = Position::new(400.0, 100.0);
    pub const TRADER_TOWN_WAYPOINT: Position = Position::new(400.0, 100.0);
    pub const TRADER_VILLAGE_WAYPOINT: Position = Position::new(100.0, 400.0);

    pub const WIDTH: f64 = 600.0;
    pub const HEIGHT: f64 = 550.0;
}
