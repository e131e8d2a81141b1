//! # servisor
//!
//! **Servisor** is an in-process service lifecycle supervisor for Rust.
//!
//! It runs many independent long-lived components ("services"), each with
//! optional async init/start/check/stop/dispose hooks, coordinates their
//! startup and shutdown order through declared dependencies, recovers from
//! failures with a quick-then-delayed restart policy, and gates every public
//! method call on the component being operational.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ServiceSpec  │   │ ServiceSpec  │   │ ServiceSpec  │
//!     │ (component A)│   │ (B, deps:[A])│   │ (C, deps:…)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Node (supervisor)                                                │
//! │  - Bus (broadcast events)                                         │
//! │  - startup monitor (first Ready/Failed visit per service)         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - registry (name → Service handle, declaration order)            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ ServiceActor │   │ ServiceActor │   │ ServiceActor │
//!  │ (state mach.)│   │ (state mach.)│   │ (state mach.)│
//!  └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!   │ publishes        │ observes         │
//!   │ StateChanged     │ dependencies'    │
//!   │ ServiceError     │ StateChanged     │
//!   │ RestartScheduled │ broadcasts       │
//!   ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! register ──► ServiceActor::run()
//!
//! advance() {
//!   NotInitialized   ─► deps ready? init : WaitingDependencies
//!   WaitingDeps      ─► dep failed? WaitingFailedDependency
//!   Initializing     ─► init hook  ─► Stopped | InitializeFailed
//!   Stopped          ─► deps ready && !stop ─► Starting
//!   Starting         ─► prestart → check → start ─► Ready | Stopping
//!   Ready            ─► run once (fire-and-forget), periodic check
//!                       stop / dep loss / critical failure ─► Stopping
//!   Stopping         ─► stop hook ─► Failed (reason pending) | Stopped
//!   Failed           ─► restart policy: quick ×2, then recovery interval
//!   any              ─► dispose ─► Disposing ─► Disposed (terminal)
//! }
//! ```
//!
//! ## Features
//! | Area             | Description                                                       | Key types / traits                      |
//! |------------------|-------------------------------------------------------------------|------------------------------------------|
//! | **Hooks**        | Define components as optional async lifecycle hooks.             | [`ServiceHooks`], [`ServiceSpec`]        |
//! | **Supervision**  | Register components, await aggregate startup, dispose.           | [`Node`], [`NodeConfig`]                 |
//! | **Dependencies** | Dependency-ordered startup, forced stop on dependency loss.      | [`ServiceSpec::with_depends_on`]         |
//! | **Restarts**     | Two immediate quick attempts, then delayed recovery.             | [`RestartDecision`], [`default_restart`] |
//! | **Call guard**   | Gate public methods on readiness, measure, retry, escalate.      | [`MethodGuard`], [`CallStats`]           |
//! | **Events**       | Broadcast every transition/error with sequence numbers.          | [`Event`], [`EventKind`], [`Bus`]        |
//! | **Subscribers**  | Hook into runtime events (logging, metrics, audit).              | [`Subscribe`], [`SubscriberSet`]         |
//! | **Errors**       | Typed errors for registration, calls and hooks.                  | [`ConfigError`], [`CallError`], [`HookError`] |
//!
//! ## Optional features
//! - `logging`: exports a tracing-backed [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use servisor::{
//!     CallContext, HookError, Node, NodeConfig, ServiceHooks, ServiceSpec,
//! };
//!
//! struct Database;
//!
//! #[async_trait]
//! impl ServiceHooks for Database {
//!     async fn init(&self, _ctx: CallContext) -> Result<(), HookError> {
//!         // open pools, run migrations...
//!         Ok(())
//!     }
//!     async fn check(&self, _ctx: CallContext) -> Result<(), HookError> {
//!         // SELECT 1
//!         Ok(())
//!     }
//! }
//!
//! struct Api;
//!
//! #[async_trait]
//! impl ServiceHooks for Api {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut node = Node::new(NodeConfig::default(), Vec::new());
//!
//!     node.register(vec![
//!         ServiceSpec::new("db", Arc::new(Database)),
//!         ServiceSpec::new("api", Arc::new(Api)).with_depends_on(["db"]),
//!     ])?;
//!
//!     // Resolves once both services visited Ready (or Failed) once.
//!     node.started().await;
//!
//!     node.dispose().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policies;
mod services;
mod subscribers;

// ---- Public re-exports ----

pub use config::NodeConfig;
pub use self::core::{CallStats, MethodGuard, Node, Service, ServiceStatus};
pub use error::{CallError, ConfigError, HookError, NodeError, OpError};
pub use events::{Bus, Event, EventKind, Severity};
pub use policies::{default_restart, RestartDecision, RestartState, QUICK_RESTART_ATTEMPTS};
pub use services::{CallContext, HookKind, HooksRef, ServiceHooks, ServiceSpec, ServiceState};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the tracing-backed reference subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
