//! Error definitions for the load balancer core.

use thiserror::Error;

/// Errors returned by [`LoadBalancer`](super::LoadBalancer) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    /// `add` was called with options that can never work.
    #[error("Invalid server options: {0}")]
    InvalidOptions(String),

    /// Neither the primary nor the backup group has a selectable server.
    #[error("No available server")]
    NoAvailableServer,
}

/// Result type for load balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;
