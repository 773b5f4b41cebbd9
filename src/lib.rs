pub mod agents;
pub mod audit;
pub mod cli;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod population;
pub mod pricing;
pub mod production;
pub mod scenario;
pub mod settlement;
pub mod simulation;
pub mod snapshot;
pub mod types;
pub mod ui;

pub use simulation::Simulation;

#[cfg(test)]
mod metrics_test;
#[cfg(test)]
mod settlement_test;
