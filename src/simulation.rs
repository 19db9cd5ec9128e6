//! Offline driver that exercises a configured balancer.
//!
//! Plays the role of the calling process: asks for a server, decides the
//! outcome of the "request" from a seeded RNG, reports it back and backs off
//! when nothing is available. Time runs on a [`ManualClock`], so a run is
//! fully reproducible from its seed.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use crate::config::{build_load_balancer_with_clock, BalancerConfig, ConfigError};
use crate::health::{Clock, ManualClock};
use crate::load_balancer::{ServerEvent, ServerStatus};

/// Knobs for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// Number of logical requests to issue.
    pub requests: usize,
    /// Probability that any single request fails.
    pub failure_rate: f64,
    /// Names of servers whose requests always fail.
    pub broken: HashSet<String>,
    /// Simulated time between requests.
    pub tick: Duration,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            requests: 1000,
            failure_rate: 0.0,
            broken: HashSet::new(),
            tick: Duration::from_millis(10),
            seed: 42,
        }
    }
}

/// Failure reported to the balancer for a simulated request.
#[derive(Debug, Error)]
#[error("simulated request to '{server}' failed")]
pub struct SimulatedFailure {
    pub server: String,
}

/// One availability transition observed during the run.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub at_ms: u64,
    pub server: String,
    pub event: ServerEvent,
    pub error: Option<String>,
}

/// Final state of one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerReport {
    pub name: String,
    pub picks: usize,
    #[serde(flatten)]
    pub status: ServerStatus,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `next` calls that returned `NoAvailableServer`.
    pub unavailable: usize,
    /// Requests abandoned after exhausting retry attempts.
    pub dropped: usize,
    pub elapsed_ms: u64,
    pub picks: BTreeMap<String, usize>,
    pub events: Vec<EventRecord>,
    pub servers: Vec<ServerReport>,
}

/// Run a simulation against the servers in `config`.
pub fn run(config: &BalancerConfig, params: &SimulationParams) -> Result<SimulationReport, ConfigError> {
    let clock = ManualClock::new();
    let start = clock.now();
    let lb = build_load_balancer_with_clock(config, Arc::new(clock.clone()))?;

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        let clock = clock.clone();
        lb.set_event_handler(move |event, server, err| {
            let record = EventRecord {
                at_ms: clock.now().duration_since(start).as_millis() as u64,
                server: server.user_data().name.clone(),
                event,
                error: err.map(|e| e.to_string()),
            };
            events.lock().unwrap_or_else(|e| e.into_inner()).push(record);
        });
    }

    let failure_rate = if params.failure_rate.is_nan() {
        0.0
    } else {
        params.failure_rate.clamp(0.0, 1.0)
    };
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut picks: BTreeMap<String, usize> = config
        .servers
        .iter()
        .map(|s| (s.name.clone(), 0))
        .collect();
    let (mut succeeded, mut failed, mut unavailable, mut dropped) = (0, 0, 0, 0);

    for _ in 0..params.requests {
        let mut attempt = 0;
        loop {
            match lb.next() {
                Ok(server) => {
                    let name = &server.user_data().name;
                    *picks.entry(name.clone()).or_default() += 1;

                    if params.broken.contains(name) || rng.gen_bool(failure_rate) {
                        failed += 1;
                        server.set_offline_with_error(&SimulatedFailure {
                            server: name.clone(),
                        });
                    } else {
                        succeeded += 1;
                        server.set_online();
                    }
                    break;
                }
                Err(e) => {
                    unavailable += 1;
                    attempt += 1;
                    if attempt >= config.retry.max_attempts {
                        tracing::debug!(error = %e, attempt, "Dropping request");
                        dropped += 1;
                        break;
                    }
                    clock.advance(config.retry.delay(&mut rng, attempt));
                }
            }
        }
        clock.advance(params.tick);
    }

    lb.clear_event_handler();
    let servers = lb
        .servers()
        .iter()
        .zip(lb.snapshot())
        .map(|(server, status)| ServerReport {
            name: server.user_data().name.clone(),
            picks: picks.get(&server.user_data().name).copied().unwrap_or(0),
            status,
        })
        .collect();
    let events = std::mem::take(&mut *events.lock().unwrap_or_else(|e| e.into_inner()));

    Ok(SimulationReport {
        requests: params.requests,
        succeeded,
        failed,
        unavailable,
        dropped,
        elapsed_ms: clock.now().duration_since(start).as_millis() as u64,
        picks,
        events,
        servers,
    })
}
