//! # Lifecycle hook contract for supervised services.
//!
//! [`ServiceHooks`] is the capability set a component implementation exposes
//! to the supervisor. Every hook is optional: the default methods complete
//! instantly with `Ok(())`, so an implementation only overrides the phases it
//! actually needs.
//!
//! ## Hook order
//! ```text
//! init ──► (Stopped) ──► prestart ─► check ─► start ──► (Ready)
//!                                                         │
//!                              run (fire-and-forget) ◄────┤
//!                              check (periodic)      ◄────┤
//!                                                         ▼
//!                                          stop ──► (Stopped | Failed)
//!
//! dispose ──► (Disposed)
//! ```
//!
//! ## Rules
//! - Hooks are the only suspension points of the state machine; at most one
//!   is in flight per service at any instant.
//! - A hook error is absorbed into the state machine (never rethrown to
//!   whoever requested the transition) and reported exactly once.
//! - `is_critical_error` and `restart_logic` are synchronous classification
//!   knobs, not hooks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HookError;
use crate::policies::{default_restart, RestartDecision};
use crate::services::context::CallContext;

/// Shared handle to a service implementation.
pub type HooksRef = Arc<dyn ServiceHooks>;

/// Identifies which lifecycle phase a pending hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Init,
    /// The folded prestart → check → start sequence.
    Start,
    /// A periodic health check fired while `Ready`.
    Check,
    Stop,
    Dispose,
}

impl HookKind {
    /// Short stable label for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            HookKind::Init => "init",
            HookKind::Start => "start",
            HookKind::Check => "check",
            HookKind::Stop => "stop",
            HookKind::Dispose => "dispose",
        }
    }
}

/// # Optional async lifecycle hooks of one service.
///
/// Implementations are shared (`Arc<dyn ServiceHooks>`) between the service
/// actor and any [`MethodGuard`](crate::MethodGuard) wrapping their public
/// operations, so hooks take `&self`; interior state wants `Mutex`/`RwLock`
/// or message passing.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servisor::{CallContext, HookError, ServiceHooks};
///
/// struct PgPool;
///
/// #[async_trait]
/// impl ServiceHooks for PgPool {
///     async fn init(&self, _ctx: CallContext) -> Result<(), HookError> {
///         // allocate the pool...
///         Ok(())
///     }
///
///     async fn check(&self, _ctx: CallContext) -> Result<(), HookError> {
///         // SELECT 1
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ServiceHooks: Send + Sync + 'static {
    /// One-time initialization. Runs once per service lifetime; a clean
    /// stop/start cycle does **not** re-run it.
    async fn init(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs immediately before `check`/`start` on every start attempt.
    async fn prestart(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Health probe. Runs once during the start sequence and then
    /// periodically while `Ready`; a rejection while `Ready` is treated as a
    /// critical failure.
    async fn check(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Brings the service into its operational state.
    async fn start(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Fired once on entering `Ready`, fire-and-forget. The token is
    /// cancelled when the service leaves `Ready`; long-lived loops should
    /// exit promptly on cancellation. A rejection is reported but does not
    /// drive the state machine.
    async fn run(&self, ctx: CallContext, cancel: CancellationToken) -> Result<(), HookError> {
        let _ = (ctx, cancel);
        Ok(())
    }

    /// Tears down the running state. Failures are reported but the service
    /// still lands in `Stopped`/`Failed` per the pending failure reason.
    async fn stop(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Final resource release. Failures are reported; the service reaches
    /// `Disposed` regardless.
    async fn dispose(&self, ctx: CallContext) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Classifies an error raised by a guarded public method. `true`
    /// escalates to [`Service::critical_failure`](crate::Service::critical_failure);
    /// `false` reports it as non-fatal. The error is rethrown to the caller
    /// either way.
    fn is_critical_error(&self, error: &(dyn std::error::Error + Send + Sync)) -> bool {
        let _ = error;
        false
    }

    /// Maps a consecutive-failure attempt counter to a restart decision.
    /// Defaults to the policy in [`crate::policies`]: two immediate quick
    /// attempts, then `fail_recovery_interval` delays.
    fn restart_logic(&self, attempt: u32, fail_recovery_interval: Duration) -> RestartDecision {
        default_restart(attempt, fail_recovery_interval)
    }
}
