//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Caller needs an upstream
//!     → balancer.rs (LoadBalancer::next, under the state lock)
//!         → group.rs (smooth weighted round-robin over primaries)
//!         → group.rs (same over backups if no primary is selectable)
//!     → Caller performs its request with Server::user_data
//!     → Server::set_online / set_offline
//!         → balancer.rs (health bookkeeping under the lock)
//!         → events.rs (handler invoked after the lock is released)
//! ```
//!
//! # Design Decisions
//! - One mutex per balancer guards both groups and the online counter
//! - The lock is never held across the caller's I/O or the event handler
//! - Server handles point back to the balancer through a `Weak`
//! - Backup servers are always eligible and never health-tracked

pub mod balancer;
pub mod error;
pub mod events;
mod group;
pub mod server;

pub use balancer::{LoadBalancer, ServerStatus};
pub use error::{BalancerError, BalancerResult};
pub use events::ServerEvent;
pub use server::{Server, ServerId, ServerOptions, Tier};
