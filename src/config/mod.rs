//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → builder.rs (LoadBalancer<Upstream>)
//! ```
//!
//! # Design Decisions
//! - Optional: embedders may call `LoadBalancer::add` directly instead
//! - All fields except name and address have defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod builder;
pub mod loader;
pub mod schema;
pub mod validation;

pub use builder::{build_load_balancer, build_load_balancer_with_clock, Upstream};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BalancerConfig, ObservabilityConfig, RetryConfig, UpstreamConfig};
pub use validation::ValidationError;
