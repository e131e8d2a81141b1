//! # Service lifecycle states.
//!
//! [`ServiceState`] enumerates every state a supervised service can occupy.
//!
//! ## State graph
//! ```text
//! NotInitialized ──► WaitingDependencies ◄──► WaitingFailedDependency
//!       │                    │
//!       ▼                    ▼
//!  Initializing ──────► InitializeFailed (dead end until dispose)
//!       │
//!       ▼
//!    Stopped ◄───────────────────────┐
//!       │                            │
//!       ▼                            │
//!    Starting ──► Ready ──► Stopping ┤
//!                              │     │
//!                              ▼     │
//!                           Failed ──┘ (after restart delay)
//!
//! any state ──► Disposing ──► Disposed (terminal)
//! ```
//!
//! ## Rules
//! - `Ready` is the only state in which guarded public methods may run.
//! - `Failed` and `InitializeFailed` are the only states carrying a failure reason.
//! - `Disposed` is terminal; the actor exits once it is reached.

use std::fmt;

/// Current position of a service in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Constructed, `advance()` not yet decided the first transition.
    NotInitialized,
    /// One or more declared dependencies are not yet `Ready`.
    WaitingDependencies,
    /// A watched dependency failed to start; waiting for it to recover.
    WaitingFailedDependency,
    /// The `init` hook is in flight.
    Initializing,
    /// The `init` hook failed; dead end until dispose.
    InitializeFailed,
    /// Initialized and not running (after init, or after a clean stop).
    Stopped,
    /// The prestart → check → start sequence is in flight.
    Starting,
    /// Operational: guarded methods may run, periodic health checks fire.
    Ready,
    /// The `stop` hook is in flight.
    Stopping,
    /// Stopped with a pending failure reason; restart scheduled per policy.
    Failed,
    /// The `dispose` hook is in flight.
    Disposing,
    /// Terminal.
    Disposed,
}

impl ServiceState {
    /// Returns a short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceState::NotInitialized => "not_initialized",
            ServiceState::WaitingDependencies => "waiting_dependencies",
            ServiceState::WaitingFailedDependency => "waiting_failed_dependency",
            ServiceState::Initializing => "initializing",
            ServiceState::InitializeFailed => "initialize_failed",
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Ready => "ready",
            ServiceState::Stopping => "stopping",
            ServiceState::Failed => "failed",
            ServiceState::Disposing => "disposing",
            ServiceState::Disposed => "disposed",
        }
    }

    /// True when this state counts a dependency as available for its dependents.
    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceState::Ready)
    }

    /// True when a dependent waiting on this service should give up until recovery.
    ///
    /// Covers both outright failure and the transitive case where the
    /// dependency itself is stuck behind one of *its* failed dependencies.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ServiceState::Failed
                | ServiceState::InitializeFailed
                | ServiceState::WaitingFailedDependency
        )
    }

    /// True once the service can never become `Ready` again without disposal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Disposed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
