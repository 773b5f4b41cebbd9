use std::process;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use trade_route_sim::cli::{self, CliArgs, Command};
use trade_route_sim::events::EventLogger;
use trade_route_sim::metrics::MetricsCalculator;
use trade_route_sim::pricing::{FormulaPriceSource, HttpPriceSource, PriceSource};
use trade_route_sim::simulation::Simulation;
use trade_route_sim::types::Settlement;
use trade_route_sim::ui;

const PRICING_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_EVENTS_FILE: &str = "simulation_events.json";

fn main() {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run with --help for usage.");
            process::exit(2);
        }
    };

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let result = match &args.command {
        Command::Run => run_headless(&args),
        Command::Watch => run_watch(&args),
        Command::Summarize { file } => summarize(&file.to_string_lossy()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn price_source(args: &CliArgs) -> Box<dyn PriceSource> {
    if args.offline {
        info!("Using local price formula");
        return Box::new(FormulaPriceSource::default());
    }
    match HttpPriceSource::new(&args.pricing_url, PRICING_TIMEOUT) {
        Ok(source) => {
            info!("Pricing service at {}", args.pricing_url);
            Box::new(source)
        }
        Err(e) => {
            warn!("Pricing client unavailable ({}), using local formula", e);
            Box::new(FormulaPriceSource::default())
        }
    }
}

fn build_simulation(args: &CliArgs) -> Result<Simulation, String> {
    let scenario = cli::load_scenario(args)?;
    info!("Loaded scenario '{}'", scenario.name);
    let simulation = Simulation::new(scenario, price_source(args))?;
    info!("Random seed {}", simulation.seed());
    Ok(simulation)
}

fn run_headless(args: &CliArgs) -> Result<(), String> {
    let mut simulation = build_simulation(args)?;
    println!("{}", simulation.scenario());

    let delta_time = 1.0 / args.tick_rate;
    let ticks = (args.duration * args.tick_rate).ceil() as u64;
    let report_every = (10.0 * args.tick_rate).round().max(1.0) as u64;

    for tick in 1..=ticks {
        simulation.advance(delta_time);

        if tick % report_every == 0 {
            let town = simulation.ledger(Settlement::Town);
            let village = simulation.ledger(Settlement::Village);
            info!(
                "t={:.0}s town {:.1}w/{:.1}t village {:.1}w/{:.1}t villagers {} money {:.2}",
                simulation.sim_time(),
                town.wheat(),
                town.tools(),
                village.wheat(),
                village.tools(),
                simulation.villagers().len(),
                simulation.total_money()
            );
        }

        if args.realtime {
            thread::sleep(Duration::from_secs_f64(delta_time));
        }
    }

    let summary = MetricsCalculator::summarize(simulation.events().get_events());
    println!("\n{}", summary);

    let output = args
        .output_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_EVENTS_FILE.to_string());
    save_events(simulation.events(), &output)?;

    if let Some(path) = &args.snapshot_file {
        let path = path.to_string_lossy();
        simulation
            .snapshot()
            .save_to_file(&path)
            .map_err(|e| format!("Failed to save snapshot to {}: {}", path, e))?;
        println!("Final state saved to {}", path);
    }

    Ok(())
}

fn run_watch(args: &CliArgs) -> Result<(), String> {
    let mut simulation = build_simulation(args)?;
    ui::run_live(&mut simulation, args.tick_rate)
        .map_err(|e| format!("Error running UI: {}", e))?;

    if let Some(path) = &args.output_file {
        save_events(simulation.events(), &path.to_string_lossy())?;
    }
    Ok(())
}

fn summarize(file: &str) -> Result<(), String> {
    let logger = EventLogger::load_from_file(file)
        .map_err(|e| format!("Failed to load events from {}: {}", file, e))?;
    println!("{}", MetricsCalculator::summarize(logger.get_events()));
    Ok(())
}

fn save_events(events: &EventLogger, path: &str) -> Result<(), String> {
    events
        .save_to_file(path)
        .map_err(|e| format!("Failed to save events to {}: {}", path, e))?;
    println!("Events saved to {}", path);
    Ok(())
}
