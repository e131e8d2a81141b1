//! # Tracing-backed event subscriber for debugging and demos.
//!
//! [`LogWriter`] forwards events to `tracing` at the severity declared by
//! [`EventKind::severity`](crate::EventKind::severity).
//!
//! ## Output shape
//! ```text
//! INFO  service=db state starting -> ready
//! ERROR service=db error reason="connection refused" hook=check
//! WARN  service=soap hook=start running for 20000ms
//! INFO  node started elapsed=412ms failed=[]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind, Severity};
use crate::subscribers::Subscribe;

/// Built-in subscriber that logs every event via `tracing`.
///
/// Enabled via the `logging` feature. Intended for development and demos;
/// implement a custom [`Subscribe`] for metrics or structured audit trails.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }

    fn describe(e: &Event) -> String {
        let service = e.service.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::StateChanged => format!(
                "service={service} state {} -> {}",
                e.prev_state.map(|s| s.as_label()).unwrap_or("?"),
                e.state.map(|s| s.as_label()).unwrap_or("?"),
            ),
            EventKind::ServiceError => format!(
                "service={service} error reason={:?} hook={:?} context={:?}",
                e.reason, e.hook, e.context
            ),
            EventKind::HookTooSlow => format!(
                "service={service} hook={} running for {}ms",
                e.hook.map(|h| h.as_label()).unwrap_or("?"),
                e.duration_ms.unwrap_or(0),
            ),
            EventKind::RestartScheduled => format!(
                "service={service} restart in {}ms attempt={}",
                e.delay_ms.unwrap_or(0),
                e.attempt.unwrap_or(0),
            ),
            EventKind::MethodCalled => format!(
                "service={service} method={} took {}ms attempt={:?}",
                e.method.as_deref().unwrap_or("?"),
                e.duration_ms.unwrap_or(0),
                e.attempt,
            ),
            EventKind::SettingsAnnounced => {
                format!("service={service} settings={:?}", e.settings)
            }
            EventKind::NodeStarted => format!(
                "node started elapsed={}ms failed={:?}",
                e.elapsed_ms.unwrap_or(0),
                e.failed,
            ),
            EventKind::NodeDisposed => {
                format!("node disposed elapsed={}ms", e.elapsed_ms.unwrap_or(0))
            }
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        let msg = Self::describe(event);
        match event.severity() {
            Severity::Info => tracing::info!(seq = event.seq, "{msg}"),
            Severity::Warn => tracing::warn!(seq = event.seq, "{msg}"),
            Severity::Error => tracing::error!(seq = event.seq, "{msg}"),
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::{HookKind, ServiceState};

    #[test]
    fn test_describe_state_change() {
        let ev = Event::new(EventKind::StateChanged)
            .with_service("db")
            .with_transition(ServiceState::Starting, ServiceState::Ready);
        assert_eq!(LogWriter::describe(&ev), "service=db state starting -> ready");
    }

    #[test]
    fn test_describe_slow_hook() {
        let ev = Event::new(EventKind::HookTooSlow)
            .with_service("soap")
            .with_hook(HookKind::Start)
            .with_duration(Duration::from_secs(20));
        assert_eq!(
            LogWriter::describe(&ev),
            "service=soap hook=start running for 20000ms"
        );
    }

    #[test]
    fn test_describe_restart() {
        let ev = Event::new(EventKind::RestartScheduled)
            .with_service("db")
            .with_delay(Duration::from_secs(60))
            .with_attempt(3);
        assert_eq!(
            LogWriter::describe(&ev),
            "service=db restart in 60000ms attempt=3"
        );
    }

    #[test]
    fn test_severity_drives_the_log_level() {
        assert_eq!(
            Event::new(EventKind::ServiceError).severity(),
            Severity::Error
        );
        assert_eq!(Event::new(EventKind::HookTooSlow).severity(), Severity::Warn);
        assert_eq!(Event::new(EventKind::NodeStarted).severity(), Severity::Info);
    }
}
