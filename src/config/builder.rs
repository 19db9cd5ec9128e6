//! Turn a validated configuration into a running balancer.

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::BalancerConfig;
use crate::config::validation::ValidationError;
use crate::health::Clock;
use crate::load_balancer::LoadBalancer;

/// User data attached to servers built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upstream {
    pub name: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
}

impl Upstream {
    /// Join `path` onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Build a balancer on the system clock.
pub fn build_load_balancer(config: &BalancerConfig) -> Result<LoadBalancer<Upstream>, ConfigError> {
    populate(LoadBalancer::new(), config)
}

/// Build a balancer driven by `clock`.
pub fn build_load_balancer_with_clock(
    config: &BalancerConfig,
    clock: Arc<dyn Clock>,
) -> Result<LoadBalancer<Upstream>, ConfigError> {
    populate(LoadBalancer::with_clock(clock), config)
}

fn populate(
    lb: LoadBalancer<Upstream>,
    config: &BalancerConfig,
) -> Result<LoadBalancer<Upstream>, ConfigError> {
    for (i, server) in config.servers.iter().enumerate() {
        let url = Url::parse(&server.address).map_err(|e| {
            ConfigError::Validation(vec![ValidationError {
                field: format!("servers[{i}].address"),
                message: e.to_string(),
            }])
        })?;
        let upstream = Upstream {
            name: server.name.clone(),
            base_url: url.as_str().trim_end_matches('/').to_string(),
        };

        lb.add(server.options(), upstream)
            .map_err(|source| ConfigError::Server {
                name: server.name.clone(),
                source,
            })?;
    }

    tracing::info!(
        servers = lb.len(),
        primary_online = lb.primary_online_count(),
        "Load balancer built from configuration"
    );
    Ok(lb)
}
