//! Passive health tracking.
//!
//! # Data Flow
//! ```text
//! Caller observes request outcome
//!     → Server::set_online / Server::set_offline
//!     → state.rs (count failures inside a window, flip Up/Down)
//!     → LoadBalancer adjusts the online counter and raises an event
//!
//! Selection:
//!     → state.rs (is the server selectable at `now`?)
//!     → clock.rs (where `now` comes from)
//! ```
//!
//! # Design Decisions
//! - No probes and no background timers; recovery is evaluated lazily
//! - Health state is per-server and only mutated under the balancer lock
//! - Backup servers and servers with `max_fails == 0` are never tracked

pub mod clock;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use state::{HealthPolicy, HealthTimer, ServerHealth, Transition};
