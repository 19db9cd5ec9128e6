//! Client-side load balancer for embedding in a calling process.
//!
//! Servers are grouped into a primary and a backup tier. Each request asks
//! [`LoadBalancer::next`] for a server, uses its user data to reach the
//! upstream and reports the outcome with [`Server::set_online`] or
//! [`Server::set_offline`]. Enough failures inside a window take a primary
//! down; availability changes are delivered to a registered event handler.
//!
//! ```
//! use upstream_balancer::{LoadBalancer, ServerOptions};
//!
//! let lb = LoadBalancer::new();
//! lb.add(ServerOptions::primary(3), "http://10.0.0.1").unwrap();
//! lb.add(ServerOptions::primary(1), "http://10.0.0.2").unwrap();
//! lb.add(ServerOptions::backup(1), "http://10.0.0.9").unwrap();
//!
//! let server = lb.next().unwrap();
//! // ... issue the request against *server.user_data() ...
//! server.set_online();
//! ```

pub mod config;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod simulation;

pub use load_balancer::{
    BalancerError, BalancerResult, LoadBalancer, Server, ServerEvent, ServerId, ServerOptions,
    ServerStatus, Tier,
};
