//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! LoadBalancer operations produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or exporter itself
//! - Metrics are recorded outside the state lock

pub mod logging;
pub mod metrics;
