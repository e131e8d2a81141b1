//! Service definitions: states, hooks, specs and call contexts.
//!
//! ## Contents
//! - [`ServiceState`] the 12-state lifecycle enum
//! - [`ServiceHooks`] / [`HooksRef`] the optional async hook contract
//! - [`ServiceSpec`] descriptor + implementation bundle for registration
//! - [`CallContext`] opaque per-call correlation id
//!
//! ## Quick wiring
//! ```text
//! ServiceSpec { name, hooks, depends_on, intervals, settings }
//!      └─► Node::register ─► core::service actor drives the hooks
//! ```

mod context;
mod hooks;
mod spec;
mod state;

pub use context::CallContext;
pub use hooks::{HookKind, HooksRef, ServiceHooks};
pub use spec::ServiceSpec;
pub use state::ServiceState;
