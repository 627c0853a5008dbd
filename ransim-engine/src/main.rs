//! ransim - discrete-time 5G RAN simulator
//!
//! Drives the simulation engine from the command line:
//! - CLI argument parsing and configuration loading
//! - Logging initialization
//! - The tick loop, with an optional final snapshot dump
//!
//! # Usage
//!
//! ```bash
//! ransim -c config/simulation.yaml --ticks 200 --dump-snapshot
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ransim_common::config::SimulationConfig;
use ransim_common::logging::{init_logging, LogLevel};
use ransim_engine::{load_simulation_config, SimulationEngine};

/// ransim - discrete-time 5G RAN simulator
#[derive(Parser, Debug)]
#[command(name = "ransim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation configuration file (YAML); built-in defaults
    /// are used when absent
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Override the number of ticks to simulate
    #[arg(short = 't', long = "ticks")]
    ticks: Option<u64>,

    /// Override the RNG seed for a reproducible run
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: String,

    /// Print the final network snapshot as JSON on stdout
    #[arg(long = "dump-snapshot")]
    dump_snapshot: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level: LogLevel = args
        .log_level
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    init_logging(level);

    let mut config = match &args.config_file {
        Some(path) => load_simulation_config(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => SimulationConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.time.max_ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let mut engine = SimulationEngine::new(config).context("building simulation engine")?;
    engine.network_setup().context("setting up the network")?;

    engine.start_simulation();
    info!(
        "final state: {} UEs across {} base stations",
        engine.ue_count(),
        engine.base_stations().len()
    );

    if args.dump_snapshot {
        let snapshot = engine.snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}
