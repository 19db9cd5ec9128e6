//! Command line driver for trying out balancer configurations.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use upstream_balancer::config::load_config;
use upstream_balancer::observability::logging::init_logging;
use upstream_balancer::simulation::{self, SimulationParams};

#[derive(Parser)]
#[command(name = "balancer-sim")]
#[command(about = "Validate and simulate upstream load balancer configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resulting servers
    Check {
        config: PathBuf,
    },
    /// Drive simulated traffic through a configuration
    Simulate {
        config: PathBuf,

        /// Number of requests to issue
        #[arg(short, long, default_value_t = 1000)]
        requests: usize,

        /// Probability in [0, 1] that a request fails
        #[arg(short, long, default_value_t = 0.0)]
        failure_rate: f64,

        /// Server name whose requests always fail (repeatable)
        #[arg(long = "broken")]
        broken: Vec<String>,

        /// Simulated milliseconds between requests
        #[arg(long, default_value_t = 10)]
        tick_ms: u64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            init_logging(&config.observability.log_level)?;

            let servers: Vec<_> = config
                .servers
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "address": s.address,
                        "weight": s.weight,
                        "max_fails": s.max_fails,
                        "fail_timeout_ms": s.fail_timeout_ms,
                        "backup": s.backup,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "valid": true, "servers": servers }))?);
        }
        Commands::Simulate {
            config,
            requests,
            failure_rate,
            broken,
            tick_ms,
            seed,
        } => {
            if !(0.0..=1.0).contains(&failure_rate) {
                return Err(format!("failure rate {failure_rate} is outside [0, 1]").into());
            }

            let config = load_config(&config)?;
            init_logging(&config.observability.log_level)?;

            let params = SimulationParams {
                requests,
                failure_rate,
                broken: broken.into_iter().collect::<HashSet<_>>(),
                tick: Duration::from_millis(tick_ms),
                seed,
            };
            tracing::info!(requests, failure_rate, seed, "Starting simulation");

            let report = simulation::run(&config, &params)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
