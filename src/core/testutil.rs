//! Shared helpers for the core test suites: a fully instrumented probe
//! component and wait/collection utilities driven by paused tokio time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::service::{Service, ServiceActor, ServiceStatus};
use crate::error::HookError;
use crate::events::{Bus, Event};
use crate::services::{CallContext, ServiceHooks, ServiceSpec, ServiceState};

/// Generous virtual-time bound for every await in tests; paused time
/// auto-advances, so a hang fails fast in wall-clock terms.
pub(crate) const TEST_WAIT: Duration = Duration::from_secs(600);

/// Instrumented component: counts every hook call, with per-hook failure
/// toggles and delays.
#[derive(Default)]
pub(crate) struct Probe {
    pub init_calls: AtomicU32,
    pub prestart_calls: AtomicU32,
    pub check_calls: AtomicU32,
    pub start_calls: AtomicU32,
    pub run_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    pub dispose_calls: AtomicU32,

    pub fail_init: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_check: AtomicBool,

    pub init_delay_ms: AtomicU64,
    pub start_delay_ms: AtomicU64,
    pub dispose_delay_ms: AtomicU64,

    /// Classify guarded-method errors as critical.
    pub critical_errors: AtomicBool,
}

impl Probe {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn delay(counter: &AtomicU64) {
        let ms = counter.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl ServiceHooks for Probe {
    async fn init(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(&self.init_delay_ms).await;
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(HookError::new("init failed"));
        }
        Ok(())
    }

    async fn prestart(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.prestart_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_check.load(Ordering::SeqCst) {
            return Err(HookError::new("check failed"));
        }
        Ok(())
    }

    async fn start(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(&self.start_delay_ms).await;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(HookError::new("start failed"));
        }
        Ok(())
    }

    async fn run(&self, _ctx: CallContext, cancel: CancellationToken) -> Result<(), HookError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        Ok(())
    }

    async fn stop(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self, _ctx: CallContext) -> Result<(), HookError> {
        self.dispose_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(&self.dispose_delay_ms).await;
        Ok(())
    }

    fn is_critical_error(&self, _error: &(dyn std::error::Error + Send + Sync)) -> bool {
        self.critical_errors.load(Ordering::SeqCst)
    }
}

/// Spawns a standalone service actor (no node) with no dependencies.
pub(crate) fn spawn(spec: &ServiceSpec, bus: &Bus) -> Service {
    spawn_with_deps(spec, bus, HashMap::new())
}

/// Spawns a standalone service actor wired to the given dependency statuses.
pub(crate) fn spawn_with_deps(
    spec: &ServiceSpec,
    bus: &Bus,
    dep_status: HashMap<Arc<str>, watch::Receiver<ServiceStatus>>,
) -> Service {
    let (handle, actor) = ServiceActor::new(spec, bus.clone(), Duration::from_secs(20), dep_status);
    tokio::spawn(actor.run());
    handle
}

/// Builds the dependency-status map a dependent actor needs.
pub(crate) fn dep_map(deps: &[&Service]) -> HashMap<Arc<str>, watch::Receiver<ServiceStatus>> {
    deps.iter()
        .map(|s| (Arc::clone(s.name()), s.status()))
        .collect()
}

/// Waits (bounded) until the service reaches the given state.
pub(crate) async fn wait_state(service: &Service, state: ServiceState) {
    let mut rx = service.status();
    tokio::time::timeout(TEST_WAIT, rx.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {state}"))
        .expect("status channel closed");
}

/// Collects the `StateChanged` sequence of one service up to and including
/// `until`. Subscribe before spawning to observe the full sequence.
pub(crate) async fn state_sequence(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    service: &str,
    until: ServiceState,
) -> Vec<ServiceState> {
    let mut seq = Vec::new();
    loop {
        let ev = tokio::time::timeout(TEST_WAIT, rx.recv())
            .await
            .expect("timed out collecting state events")
            .expect("bus closed");
        if ev.is_state_change() && ev.service.as_deref() == Some(service) {
            let state = ev.state.expect("state change without new state");
            seq.push(state);
            if state == until {
                return seq;
            }
        }
    }
}
