//! Runtime core: the state machine, dependency tracking, call guarding and
//! the node supervisor.
//!
//! Internal modules:
//! - [`service`]: per-service actor owning the lifecycle state machine;
//! - [`deps`]: incremental dependency readiness tracking;
//! - [`guard`]: readiness gate + measurement wrapper for public operations;
//! - [`node`]: ordered registration, aggregate startup, coordinated disposal;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod deps;
mod guard;
mod node;
mod service;
mod shutdown;
#[cfg(test)]
mod testutil;

pub use guard::{CallStats, MethodGuard};
pub use node::Node;
pub use service::{Service, ServiceStatus};
