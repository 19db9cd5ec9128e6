//! Resilience helpers for callers of the balancer.
//!
//! # Design Decisions
//! - The balancer never retries or queues on its own
//! - `NoAvailableServer` is transient; callers back off and ask again

pub mod backoff;

pub use backoff::retry_delay;
