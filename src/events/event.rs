//! # Runtime events emitted by services, guards and the node.
//!
//! The [`EventKind`] enum classifies event types across four families:
//! - **State events**: every service transition (`StateChanged`);
//! - **Error/health events**: reported failures and slow hooks
//!   (`ServiceError`, `HookTooSlow`, `RestartScheduled`);
//! - **Call events**: guarded method measurements (`MethodCalled`);
//! - **Node events**: aggregate startup/shutdown (`SettingsAnnounced`,
//!   `NodeStarted`, `NodeDisposed`).
//!
//! The [`Event`] struct carries metadata such as the service name, previous
//! and new state, failure reason, call context and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Consumers that may observe reordered delivery can use `seq`
//! to restore the true order.
//!
//! ## Example
//! ```rust
//! use servisor::{Event, EventKind, ServiceState};
//!
//! let ev = Event::new(EventKind::StateChanged)
//!     .with_service("db")
//!     .with_transition(ServiceState::Starting, ServiceState::Ready);
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.state, Some(ServiceState::Ready));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::services::{HookKind, ServiceState};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Service state ===
    /// A service moved from one state to another.
    ///
    /// Sets:
    /// - `service`: service name
    /// - `prev_state` / `state`: the transition endpoints
    /// - `reason`: failure reason when the new state carries one
    /// - `at` / `seq`
    StateChanged,

    // === Errors and health ===
    /// An error was reported for a service (hook rejection, critical method
    /// failure, non-fatal operational error).
    ///
    /// Sets:
    /// - `service`, `reason`
    /// - `hook`: the hook that rejected, when applicable
    /// - `context`: correlation id of the failing call, when applicable
    /// - `at` / `seq`
    ServiceError,

    /// A hook has been running longer than the slow-hook threshold and has
    /// not settled yet. Repeated every threshold period until it settles.
    ///
    /// Sets: `service`, `hook`, `context`, `duration_ms`, `at` / `seq`
    HookTooSlow,

    /// A failed service scheduled its next recovery attempt.
    ///
    /// Sets: `service`, `delay_ms`, `attempt`, `reason`, `at` / `seq`
    RestartScheduled,

    // === Guarded calls ===
    /// A guarded public method completed (successfully or not).
    ///
    /// Sets: `service`, `method`, `context`, `duration_ms`,
    /// `attempt` (when the call was retried), `at` / `seq`
    MethodCalled,

    // === Node ===
    /// A service's settings payload was announced at registration.
    ///
    /// Sets: `service`, `settings`, `at` / `seq`
    SettingsAnnounced,

    /// Every registered service has visited `Ready` or `Failed` at least
    /// once; node startup is complete.
    ///
    /// Sets: `elapsed_ms`, `failed` (names still failed at that moment),
    /// `at` / `seq`
    NodeStarted,

    /// Node disposal finished: every service reached `Disposed`.
    ///
    /// Sets: `elapsed_ms`, `at` / `seq`
    NodeDisposed,
}

/// Reporting severity of an event, for sinks that split info/warn/error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl EventKind {
    /// Maps the kind to the severity a sink should report it at.
    pub fn severity(&self) -> Severity {
        match self {
            EventKind::ServiceError => Severity::Error,
            EventKind::HookTooSlow => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the service, if applicable.
    pub service: Option<Arc<str>>,
    /// State before the transition (`StateChanged` only).
    pub prev_state: Option<ServiceState>,
    /// State after the transition (`StateChanged` only).
    pub state: Option<ServiceState>,
    /// Human-readable reason (failures, restart causes).
    pub reason: Option<Arc<str>>,
    /// Call-correlation id, when the event traces back to one call.
    pub context: Option<Arc<str>>,
    /// Lifecycle hook involved, if any.
    pub hook: Option<HookKind>,
    /// Guarded method name (`MethodCalled` only).
    pub method: Option<Arc<str>>,
    /// Call attempt count (1-based) when the call was retried.
    pub attempt: Option<u32>,
    /// Measured duration in milliseconds (calls, slow hooks).
    pub duration_ms: Option<u64>,
    /// Scheduled restart delay in milliseconds.
    pub delay_ms: Option<u64>,
    /// Elapsed time in milliseconds (node startup/disposal).
    pub elapsed_ms: Option<u64>,
    /// Services still failed when node startup completed.
    pub failed: Option<Arc<[Arc<str>]>>,
    /// Settings payload (`SettingsAnnounced` only).
    pub settings: Option<Arc<serde_json::Value>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            prev_state: None,
            state: None,
            reason: None,
            context: None,
            hook: None,
            method: None,
            attempt: None,
            duration_ms: None,
            delay_ms: None,
            elapsed_ms: None,
            failed: None,
            settings: None,
        }
    }

    /// Attaches the service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches both endpoints of a state transition.
    #[inline]
    pub fn with_transition(mut self, prev: ServiceState, new: ServiceState) -> Self {
        self.prev_state = Some(prev);
        self.state = Some(new);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a call-correlation id.
    #[inline]
    pub fn with_context(mut self, context: impl Into<Arc<str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attaches the lifecycle hook involved.
    #[inline]
    pub fn with_hook(mut self, hook: HookKind) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Attaches a guarded method name.
    #[inline]
    pub fn with_method(mut self, method: impl Into<Arc<str>>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a measured duration (stored as milliseconds).
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches an elapsed time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches the list of services still failed at node startup.
    #[inline]
    pub fn with_failed(mut self, failed: Vec<Arc<str>>) -> Self {
        self.failed = Some(failed.into());
        self
    }

    /// Attaches a settings payload.
    #[inline]
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = Some(Arc::new(settings));
        self
    }

    /// Reporting severity of this event.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    #[inline]
    pub fn is_state_change(&self) -> bool {
        matches!(self.kind, EventKind::StateChanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::StateChanged);
        let b = Event::new(EventKind::StateChanged);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(EventKind::ServiceError.severity(), Severity::Error);
        assert_eq!(EventKind::HookTooSlow.severity(), Severity::Warn);
        assert_eq!(EventKind::StateChanged.severity(), Severity::Info);
        assert_eq!(EventKind::NodeStarted.severity(), Severity::Info);
    }

    #[test]
    fn test_builder_fields() {
        let ev = Event::new(EventKind::MethodCalled)
            .with_service("db")
            .with_method("query")
            .with_context("ctx-1")
            .with_duration(Duration::from_millis(12))
            .with_attempt(2);
        assert_eq!(ev.service.as_deref(), Some("db"));
        assert_eq!(ev.method.as_deref(), Some("query"));
        assert_eq!(ev.duration_ms, Some(12));
        assert_eq!(ev.attempt, Some(2));
    }
}
