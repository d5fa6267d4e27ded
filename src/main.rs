//! rdw-sim entry point
//!
//! Runs every trial of a command file in batch at a fixed step and prints
//! one JSON summary per trial to stdout.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use rdw_sim::io::load_commands;
use rdw_sim::{ConfigError, Settings, Simulation, TrialSummary};

/// Redirected walking batch simulator
#[derive(Parser, Debug)]
#[command(name = "rdw-sim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command file describing the trials
    command_file: PathBuf,

    /// Settings JSON applied before the command file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Stop a trial after this many ticks
    #[arg(long, default_value = "1000000")]
    max_ticks: u64,

    /// Pretty-print the summaries
    #[arg(long)]
    pretty: bool,
}

fn print_summary(summary: &TrialSummary, pretty: bool) -> Result<(), ConfigError> {
    let json = if pretty {
        serde_json::to_string_pretty(summary)?
    } else {
        serde_json::to_string(summary)?
    };
    println!("{}", json);
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let trials = load_commands(&cli.command_file, settings)?;

    for (index, trial) in trials.into_iter().enumerate() {
        let mut sim = Simulation::new(trial.settings);
        sim.begin_trial(trial.setup)?;
        let summary = sim.run_to_end(cli.max_ticks)?;
        log::info!(
            "Trial {} finished: {:?} after {:.1}s",
            index + 1,
            summary.end_state,
            summary.duration
        );
        print_summary(&summary, cli.pretty)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("rdw-sim starting with {}", cli.command_file.display());

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
