//! Command-line interface for the trade route simulation.

use crate::pricing::DEFAULT_PRICING_URL;
use crate::scenario::{Scenario, create_standard_scenarios};
use crate::ui::WATCH_CONTROLS;
use lexopt::prelude::*;
use log::LevelFilter;
use std::path::PathBuf;

/// Command-line arguments for the simulation.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
    pub scenario_name: String,
    pub scenario_file: Option<PathBuf>,
    pub random_seed: Option<u64>,
    /// Simulated seconds for a headless run.
    pub duration: f64,
    /// Ticks per simulated second.
    pub tick_rate: f64,
    pub realtime: bool,
    pub pricing_url: String,
    pub offline: bool,
    pub trader_timeout: Option<f64>,
    pub verbose: bool,
    pub quiet: bool,
    pub output_file: Option<PathBuf>,
    pub snapshot_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run,
    Watch,
    Summarize { file: PathBuf },
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            command: Command::Run,
            scenario_name: "default".to_string(),
            scenario_file: None,
            random_seed: None,
            duration: 120.0,
            tick_rate: 60.0,
            realtime: false,
            pricing_url: DEFAULT_PRICING_URL.to_string(),
            offline: false,
            trader_timeout: None,
            verbose: false,
            quiet: false,
            output_file: None,
            snapshot_file: None,
        }
    }
}

impl CliArgs {
    /// Default log filter; `RUST_LOG` still overrides it.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }
}

pub fn parse_args() -> Result<CliArgs, lexopt::Error> {
    parse_from(lexopt::Parser::from_env())
}

pub fn parse_from(mut args: lexopt::Parser) -> Result<CliArgs, lexopt::Error> {
    let mut cli_args = CliArgs::default();
    let mut subcommand = None;
    let mut summarize_file = None;

    while let Some(arg) = args.next()? {
        match arg {
            Value(val) => {
                let val_str = val.string()?;
                if subcommand.is_none() {
                    subcommand = Some(val_str);
                } else if subcommand.as_deref() == Some("summarize") {
                    summarize_file = Some(PathBuf::from(val_str));
                } else {
                    return Err(lexopt::Error::from(format!(
                        "Unexpected argument: {}",
                        val_str
                    )));
                }
            }
            Long("scenario") => cli_args.scenario_name = args.value()?.string()?,
            Long("scenario-file") => {
                cli_args.scenario_file = Some(PathBuf::from(args.value()?.string()?));
            }
            Long("seed") => cli_args.random_seed = Some(args.value()?.parse()?),
            Long("duration") | Short('d') => cli_args.duration = args.value()?.parse()?,
            Long("tick-rate") => cli_args.tick_rate = args.value()?.parse()?,
            Long("realtime") => cli_args.realtime = true,
            Long("pricing-url") => cli_args.pricing_url = args.value()?.string()?,
            Long("offline") => cli_args.offline = true,
            Long("trader-timeout") => cli_args.trader_timeout = Some(args.value()?.parse()?),
            Long("verbose") | Short('v') => cli_args.verbose = true,
            Long("quiet") | Short('q') => cli_args.quiet = true,
            Long("output") | Short('o') => {
                cli_args.output_file = Some(PathBuf::from(args.value()?.string()?));
            }
            Long("snapshot") => {
                cli_args.snapshot_file = Some(PathBuf::from(args.value()?.string()?));
            }
            Long("help") | Short('h') => {
                print_help();
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    if !(cli_args.tick_rate >= 1.0 && cli_args.tick_rate.is_finite()) {
        return Err(lexopt::Error::from("Tick rate must be at least 1"));
    }
    if !(cli_args.duration > 0.0 && cli_args.duration.is_finite()) {
        return Err(lexopt::Error::from("Duration must be positive"));
    }

    cli_args.command = match subcommand.as_deref() {
        Some("run") | None => Command::Run,
        Some("watch") => Command::Watch,
        Some("summarize") => Command::Summarize {
            file: summarize_file.unwrap_or_else(|| PathBuf::from("simulation_events.json")),
        },
        Some(cmd) => {
            return Err(lexopt::Error::from(format!("Unknown command: {}", cmd)));
        }
    };

    Ok(cli_args)
}

/// Resolves the scenario from `--scenario-file` or a built-in name.
pub fn load_scenario(args: &CliArgs) -> Result<Scenario, String> {
    let mut scenario = match &args.scenario_file {
        Some(path) => Scenario::load_from_file(path)?,
        None => create_standard_scenarios()
            .remove(&args.scenario_name)
            .ok_or_else(|| {
                format!(
                    "Unknown scenario '{}' (available: default, idle, scarcity)",
                    args.scenario_name
                )
            })?,
    };
    apply_overrides(&mut scenario, args);
    scenario.validate()?;
    Ok(scenario)
}

/// Apply CLI overrides to a scenario's parameters.
pub fn apply_overrides(scenario: &mut Scenario, args: &CliArgs) {
    if let Some(seed) = args.random_seed {
        scenario.random_seed = Some(seed);
    }
    if let Some(timeout) = args.trader_timeout {
        scenario.trader.wait_timeout = Some(timeout);
    }
}

fn watch_controls() -> String {
    WATCH_CONTROLS
        .iter()
        .map(|(key, action)| format!("    {:<16} {}\n", key, action))
        .collect()
}

fn print_help() {
    println!("\nTrade Route Simulation\n");
    println!("USAGE:");
    println!("    trade-route-sim [COMMAND] [OPTIONS]\n");

    println!("COMMANDS:");
    println!("    run              Run the simulation headless (default)");
    println!("    watch            Run the simulation in a live terminal view");
    println!("    summarize [FILE] Summarize a saved event journal");
    println!("                     (default: simulation_events.json)\n");

    println!("SIMULATION OPTIONS:");
    println!("    --scenario <NAME>          Built-in scenario: default, idle, scarcity");
    println!("    --scenario-file <FILE>     Load scenario from YAML or JSON file");
    println!("    --seed <N>                 Random seed for reproducible runs");
    println!("    -d, --duration <SECS>      Simulated seconds for `run` (default: 120)");
    println!("    --tick-rate <N>            Ticks per simulated second (default: 60)");
    println!("    --realtime                 Pace `run` against the wall clock");
    println!("    --trader-timeout <SECS>    Let the trader give up waiting for wheat\n");

    println!("PRICING OPTIONS:");
    println!(
        "    --pricing-url <URL>        Pricing service (default: {})",
        DEFAULT_PRICING_URL
    );
    println!("    --offline                  Compute prices locally instead\n");

    println!("OUTPUT OPTIONS:");
    println!("    -o, --output <FILE>        Write events to file (default for run:");
    println!("                               simulation_events.json)");
    println!("    --snapshot <FILE>          Write the final state as JSON");
    println!("    -v, --verbose              Enable debug logging");
    println!("    -q, --quiet                Only log warnings and errors");
    println!("    -h, --help                 Print help information\n");

    println!("WATCH CONTROLS:");
    println!("{}", watch_controls());

    println!("EXAMPLES:");
    println!("    # Ten simulated minutes with local prices");
    println!("    trade-route-sim run --offline --duration 600 --seed 12345\n");

    println!("    # Watch the scarcity scenario");
    println!("    trade-route-sim watch --scenario scarcity\n");

    println!("    # Summarize a previous run");
    println!("    trade-route-sim summarize simulation_events.json");
}
