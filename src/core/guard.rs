//! # MethodGuard: gate public operations on service readiness.
//!
//! [`MethodGuard`] wraps a component's public operations once at
//! construction (explicit decorator — no runtime mutation of anything
//! shared) and, for every call:
//!
//! ```text
//! call(method, ctx, op)
//!   ├─► require ctx (if configured)          ─► CallError::MissingContext
//!   ├─► await readiness
//!   │     ├─ Ready                           ─► proceed
//!   │     ├─ quick restart in flight         ─► wait for recovery
//!   │     └─ anything else                   ─► CallError::InvalidState
//!   ├─► run op, measure wall-clock duration
//!   ├─► record rolling avg/max, publish MethodCalled
//!   └─► on error:
//!         ├─ is_critical_error == true       ─► escalate critical_failure
//!         ├─ is_critical_error == false      ─► report as non-fatal
//!         ├─ quick window open               ─► retry (attempt += 1)
//!         └─► rethrow to the caller either way
//! ```
//!
//! ## Rules
//! - The guard never swallows an operation error: after classification and
//!   reporting it is rethrown unchanged (wrapped in
//!   [`CallError::Operation`]).
//! - Retries happen only inside the quick-restart window and are bounded by
//!   [`QUICK_RESTART_ATTEMPTS`](crate::policies::QUICK_RESTART_ATTEMPTS).
//! - Duration stats are per method, rolling average and maximum.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::service::Service;
use crate::error::{CallError, OpError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::QUICK_RESTART_ATTEMPTS;
use crate::services::{CallContext, HooksRef, ServiceState};

/// Rolling duration statistics for one guarded method.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStats {
    /// Number of completed invocations (successful or not).
    pub calls: u64,
    /// Sum of all observed durations.
    pub total: Duration,
    /// Maximum observed duration.
    pub max: Duration,
}

impl CallStats {
    /// Rolling average duration.
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.calls).unwrap_or(u32::MAX)
        }
    }

    fn record(&mut self, d: Duration) {
        self.calls += 1;
        self.total = self.total.saturating_add(d);
        self.max = self.max.max(d);
    }
}

/// Readiness gate and measurement wrapper for one service's operations.
pub struct MethodGuard {
    service: Service,
    hooks: HooksRef,
    bus: Bus,
    require_context: bool,
    stats: RwLock<HashMap<Arc<str>, CallStats>>,
}

impl MethodGuard {
    /// Wraps the operations of `service` (implemented by `hooks`).
    pub fn new(service: Service, hooks: HooksRef, bus: Bus) -> Self {
        Self {
            service,
            hooks,
            bus,
            require_context: true,
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Controls whether calls without a [`CallContext`] are rejected
    /// (default: required).
    pub fn require_context(mut self, required: bool) -> Self {
        self.require_context = required;
        self
    }

    /// The guarded service handle.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Runs one guarded operation.
    ///
    /// `op` is a factory invoked once per attempt with the call context; a
    /// fresh future per attempt keeps retries free of intermediate state.
    pub async fn call<T, F, Fut>(
        &self,
        method: &'static str,
        ctx: Option<CallContext>,
        op: F,
    ) -> Result<T, CallError>
    where
        F: Fn(CallContext) -> Fut,
        Fut: Future<Output = Result<T, OpError>>,
    {
        let ctx = match ctx {
            Some(c) => c,
            None if self.require_context => {
                return Err(CallError::MissingContext {
                    method: method.into(),
                })
            }
            None => CallContext::new(),
        };

        let mut attempt: u32 = 1;
        loop {
            self.await_operational(method).await?;

            let started = Instant::now();
            let res = op(ctx.clone()).await;
            let took = started.elapsed();
            self.record(method, took).await;

            let mut ev = Event::new(EventKind::MethodCalled)
                .with_service(Arc::clone(self.service.name()))
                .with_method(method)
                .with_context(ctx.as_arc())
                .with_duration(took);
            if attempt > 1 {
                ev = ev.with_attempt(attempt);
            }
            self.bus.publish(ev);

            match res {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let critical = self.hooks.is_critical_error(e.as_ref());
                    if critical {
                        // An escalation can race the service having already
                        // left Ready for the same underlying cause; either
                        // way the failure path is in motion.
                        let _ = self.service.critical_failure(e.to_string());
                    } else {
                        self.bus.publish(
                            Event::new(EventKind::ServiceError)
                                .with_service(Arc::clone(self.service.name()))
                                .with_method(method)
                                .with_context(ctx.as_arc())
                                .with_reason(e.to_string()),
                        );
                    }

                    if attempt <= QUICK_RESTART_ATTEMPTS && self.quick_window_open(critical).await {
                        attempt += 1;
                        continue;
                    }
                    return Err(CallError::Operation(e));
                }
            }
        }
    }

    /// Duration statistics recorded for `method` so far.
    pub async fn stats(&self, method: &str) -> Option<CallStats> {
        self.stats.read().await.get(method).copied()
    }

    /// Waits until the service is `Ready`, riding out a quick restart.
    ///
    /// Fails fast with [`CallError::InvalidState`] when the service is
    /// neither ready nor quick-restarting; the error carries the state and
    /// the failure behind it, if any.
    async fn await_operational(&self, method: &'static str) -> Result<(), CallError> {
        let mut rx = self.service.status();
        loop {
            let snap = rx.borrow_and_update().clone();
            if snap.state == ServiceState::Ready {
                return Ok(());
            }
            if !snap.quick_restart {
                return Err(CallError::InvalidState {
                    method: method.into(),
                    state: snap.state,
                    cause: snap.failure,
                });
            }
            if rx.changed().await.is_err() {
                let snap = rx.borrow().clone();
                return Err(CallError::InvalidState {
                    method: method.into(),
                    state: snap.state,
                    cause: snap.failure,
                });
            }
        }
    }

    /// Whether the call may be retried: the service is in (or about to
    /// enter) a quick restart. When this guard escalated the failure itself,
    /// the actor may not have processed the command yet, so one status
    /// update is awaited before giving up.
    async fn quick_window_open(&self, escalated: bool) -> bool {
        let mut rx = self.service.status();
        let snap = rx.borrow_and_update().clone();
        if snap.quick_restart {
            return true;
        }
        if escalated && snap.state == ServiceState::Ready && rx.changed().await.is_ok() {
            return rx.borrow().quick_restart;
        }
        false
    }

    async fn record(&self, method: &'static str, took: Duration) {
        let mut stats = self.stats.write().await;
        stats.entry(method.into()).or_default().record(took);
    }
}
