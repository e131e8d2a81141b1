//! # Service actor: the per-component lifecycle state machine.
//!
//! Each registered service is driven by one [`ServiceActor`] task that owns
//! every piece of mutable state (current state, pending hook, dependency
//! view, restart bookkeeping). The public [`Service`] handle talks to it
//! through a command mailbox and observes it through a `watch` channel, so
//! `advance()` can never be re-entered and no locks are needed.
//!
//! ## Architecture
//! ```text
//!            commands (start/stop/dispose/critical_failure)
//! Service ────────────────────────────────────────────────► mailbox ─┐
//! handle  ◄──────────────────────────────────────────────── watch ◄──┤
//!            ServiceStatus { state, failure, quick_restart }         │
//!                                                                    ▼
//! Bus ── StateChanged broadcasts of dependencies ──────────► ServiceActor
//!                                                              │
//!            wake = command | dep event | hook settled         │
//!                 | check timer | recovery timer | slow timer  │
//!                                                              ▼
//!                                                          advance()
//! ```
//!
//! ## Rules
//! - At most one hook future is pending per service; a new transition never
//!   begins while one is outstanding.
//! - There is no preemptive hook cancellation: `stop()` during `Starting`
//!   waits for the start sequence to settle, then moves to `Stopping`.
//! - Every transition publishes exactly one `StateChanged` event carrying
//!   the previous and the new state.
//! - Hook errors are absorbed as the failure reason and reported once; they
//!   are never rethrown to whoever requested the transition.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::deps::DependencyTracker;
use crate::error::{CallError, HookError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::RestartState;
use crate::services::{CallContext, HookKind, HooksRef, ServiceSpec, ServiceState};

/// Point-in-time view of a service, published on every transition.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    /// Current lifecycle state.
    pub state: ServiceState,
    /// Failure reason, present in `Failed`/`InitializeFailed`.
    pub failure: Option<Arc<str>>,
    /// True while the current failure episode is inside the quick-restart
    /// window; guards treat pending calls as retryable while set.
    pub quick_restart: bool,
}

/// Commands accepted by the service actor.
enum Command {
    Start,
    Stop,
    Dispose,
    CriticalFailure { reason: Arc<str> },
}

/// Public handle to one supervised service.
///
/// Cheap to clone. All mutating operations are requests: the effect is
/// asynchronous, applied by the actor on its next turn.
#[derive(Clone)]
pub struct Service {
    name: Arc<str>,
    kind: Option<Arc<str>>,
    depends_on: Arc<[Arc<str>]>,
    cmd: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ServiceStatus>,
}

impl Service {
    /// Service name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Optional type tag from the spec.
    pub fn kind(&self) -> Option<&Arc<str>> {
        self.kind.as_ref()
    }

    /// Declared dependency names.
    pub fn depends_on(&self) -> &[Arc<str>] {
        &self.depends_on
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.status.borrow().state
    }

    /// Current failure reason, if the service is in a failed state.
    pub fn failure_reason(&self) -> Option<Arc<str>> {
        self.status.borrow().failure.clone()
    }

    /// Subscribes to status updates. The receiver observes every transition.
    pub fn status(&self) -> watch::Receiver<ServiceStatus> {
        self.status.clone()
    }

    /// Requests the running state. Idempotent; a disposed service ignores it.
    pub fn start(&self) {
        let _ = self.cmd.send(Command::Start);
    }

    /// Requests the stopped state. Idempotent. Does not abort an in-flight
    /// hook: a start sequence settles first, then the service stops.
    pub fn stop(&self) {
        let _ = self.cmd.send(Command::Stop);
    }

    /// Requests disposal and resolves once the service reaches `Disposed`.
    pub async fn dispose(&self) {
        let _ = self.cmd.send(Command::Dispose);
        let mut rx = self.status.clone();
        // wait_for returns Err only if the actor is gone, which means it
        // already passed through Disposed.
        let _ = rx.wait_for(|s| s.state == ServiceState::Disposed).await;
    }

    /// Forces the failure path of a `Ready` service.
    ///
    /// Precondition: the service is `Ready`. Calling it in any other state is
    /// a programming error surfaced synchronously as
    /// [`CallError::InvalidState`], without mutating the service.
    pub fn critical_failure(&self, reason: impl Into<Arc<str>>) -> Result<(), CallError> {
        let snap = self.status.borrow().clone();
        if snap.state != ServiceState::Ready {
            return Err(CallError::InvalidState {
                method: "critical_failure".into(),
                state: snap.state,
                cause: snap.failure,
            });
        }
        let _ = self.cmd.send(Command::CriticalFailure {
            reason: reason.into(),
        });
        Ok(())
    }
}

/// One in-flight lifecycle hook.
struct PendingHook {
    kind: HookKind,
    context: CallContext,
    started: Instant,
    /// Next deadline of the slow-hook watchdog; re-armed on every warning.
    warn_at: Instant,
    fut: Pin<Box<dyn Future<Output = Result<(), HookError>> + Send>>,
}

/// What woke the actor up.
enum Wake {
    Command(Option<Command>),
    DepEvent(Result<Event, tokio::sync::broadcast::error::RecvError>),
    HookSettled(Result<(), HookError>),
    CheckDue,
    RecoveryDue,
    SlowHook,
}

/// Owns and drives the state machine of one service. Spawned by the node.
pub(crate) struct ServiceActor {
    name: Arc<str>,
    hooks: HooksRef,
    bus: Bus,
    bus_rx: tokio::sync::broadcast::Receiver<Event>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<ServiceStatus>,
    /// Status channels of the dependencies, for resync after broadcast lag.
    dep_status: HashMap<Arc<str>, watch::Receiver<ServiceStatus>>,

    state: ServiceState,
    deps: DependencyTracker,
    restart: RestartState,
    failure: Option<Arc<str>>,
    quick_restart: bool,
    stop_requested: bool,
    dispose_requested: bool,
    cmd_closed: bool,

    pending: Option<PendingHook>,
    run_cancel: Option<CancellationToken>,
    next_check_at: Option<Instant>,
    recover_at: Option<Instant>,

    fail_recovery_interval: Duration,
    check_interval: Duration,
    slow_hook_threshold: Duration,
}

impl ServiceActor {
    /// Builds the actor and its public handle.
    ///
    /// `dep_status` must contain one status receiver per declared dependency;
    /// the tracker is seeded from their current states.
    pub fn new(
        spec: &ServiceSpec,
        bus: Bus,
        slow_hook_threshold: Duration,
        dep_status: HashMap<Arc<str>, watch::Receiver<ServiceStatus>>,
    ) -> (Service, ServiceActor) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ServiceStatus {
            state: ServiceState::NotInitialized,
            failure: None,
            quick_restart: false,
        });

        // Subscribe before reading the seeds: a dependency transition
        // published in between then lands in the receiver instead of being
        // lost, and observe() is idempotent so seeing it twice is harmless.
        let bus_rx = bus.subscribe();
        let seed: Vec<(Arc<str>, ServiceState)> = dep_status
            .iter()
            .map(|(name, rx)| (Arc::clone(name), rx.borrow().state))
            .collect();
        let deps = DependencyTracker::new(seed);

        let handle = Service {
            name: Arc::clone(spec.name()),
            kind: spec.kind().cloned(),
            depends_on: spec.depends_on().to_vec().into(),
            cmd: cmd_tx,
            status: status_rx,
        };

        let actor = ServiceActor {
            name: Arc::clone(spec.name()),
            hooks: Arc::clone(spec.hooks()),
            bus_rx,
            bus,
            cmd_rx,
            status_tx,
            dep_status,
            state: ServiceState::NotInitialized,
            deps,
            restart: RestartState::new(),
            failure: None,
            quick_restart: false,
            stop_requested: false,
            dispose_requested: false,
            cmd_closed: false,
            pending: None,
            run_cancel: None,
            next_check_at: None,
            recover_at: None,
            fail_recovery_interval: spec.fail_recovery_interval(),
            check_interval: spec.check_interval(),
            slow_hook_threshold,
        };
        (handle, actor)
    }

    /// Runs the actor until the service reaches `Disposed`.
    pub async fn run(mut self) {
        self.advance();
        while self.state != ServiceState::Disposed {
            let wake = self.wait_next().await;
            match wake {
                Wake::Command(Some(cmd)) => self.on_command(cmd),
                Wake::Command(None) => {
                    // Every handle dropped: nothing can ever start this
                    // service again, so wind it down.
                    self.cmd_closed = true;
                    self.dispose_requested = true;
                }
                Wake::DepEvent(res) => self.on_dep_event(res),
                Wake::HookSettled(res) => self.on_hook_settled(res),
                Wake::CheckDue => self.on_check_due(),
                Wake::RecoveryDue => self.on_recovery_due(),
                Wake::SlowHook => self.on_slow_hook(),
            }
            self.advance();
        }
    }

    /// Waits for the next wake-up source. Borrows are split field-by-field so
    /// the pending hook future, timers and channels can be polled together.
    async fn wait_next(&mut self) -> Wake {
        let Self {
            cmd_rx,
            bus_rx,
            pending,
            next_check_at,
            recover_at,
            cmd_closed,
            ..
        } = self;

        let warn_at = pending.as_ref().map(|p| p.warn_at);
        let check_at = *next_check_at;
        let recovery_at = *recover_at;
        let closed = *cmd_closed;

        let hook = async {
            match pending {
                Some(p) => p.fut.as_mut().await,
                None => std::future::pending().await,
            }
        };
        let command = async {
            if closed {
                std::future::pending().await
            } else {
                cmd_rx.recv().await
            }
        };
        let check = async {
            match check_at {
                Some(t) => time::sleep_until(t).await,
                None => std::future::pending().await,
            }
        };
        let recovery = async {
            match recovery_at {
                Some(t) => time::sleep_until(t).await,
                None => std::future::pending().await,
            }
        };
        let slow = async {
            match warn_at {
                Some(t) => time::sleep_until(t).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = hook => Wake::HookSettled(res),
            cmd = command => Wake::Command(cmd),
            ev = bus_rx.recv() => Wake::DepEvent(ev),
            _ = check => Wake::CheckDue,
            _ = recovery => Wake::RecoveryDue,
            _ = slow => Wake::SlowHook,
        }
    }

    // === wake handlers ===

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.stop_requested = false,
            Command::Stop => self.stop_requested = true,
            Command::Dispose => self.dispose_requested = true,
            Command::CriticalFailure { reason } => {
                if self.state == ServiceState::Ready {
                    self.report_error(Some(reason.clone()), None, None);
                    self.record_failure(reason);
                } else {
                    // The handle validated Ready, but the state moved before
                    // the command was delivered. Report, do not act on it.
                    self.report_error(Some(reason), None, None);
                }
            }
        }
    }

    fn on_dep_event(&mut self, res: Result<Event, tokio::sync::broadcast::error::RecvError>) {
        use tokio::sync::broadcast::error::RecvError;
        match res {
            Ok(ev) => {
                if !ev.is_state_change() {
                    return;
                }
                if let (Some(service), Some(state)) = (ev.service.as_deref(), ev.state) {
                    if self.deps.tracks(service) {
                        self.deps.observe(service, state);
                    }
                }
            }
            Err(RecvError::Lagged(_)) => {
                // Missed notifications. Re-read authoritative states.
                let states: Vec<(Arc<str>, ServiceState)> = self
                    .dep_status
                    .iter()
                    .map(|(name, rx)| (Arc::clone(name), rx.borrow().state))
                    .collect();
                self.deps
                    .resync(states.iter().map(|(n, s)| (n.as_ref(), *s)));
            }
            Err(RecvError::Closed) => {
                // Bus gone; dependency states are frozen from here on.
            }
        }
    }

    fn on_hook_settled(&mut self, result: Result<(), HookError>) {
        let Some(pending) = self.pending.take() else {
            debug_assert!(false, "hook settled without a pending operation");
            return;
        };
        let ctx = pending.context;
        match pending.kind {
            HookKind::Init => match result {
                Ok(()) => self.set_state(ServiceState::Stopped),
                Err(e) => {
                    self.report_hook_error(HookKind::Init, &ctx, &e);
                    self.failure = Some(Arc::clone(e.message()));
                    self.set_state(ServiceState::InitializeFailed);
                }
            },
            HookKind::Start => match result {
                Ok(()) => {
                    let lost = !self.deps.all_ready();
                    if self.stop_requested || self.dispose_requested || lost {
                        self.begin_stop();
                    } else {
                        self.enter_ready();
                    }
                }
                Err(e) => {
                    self.report_hook_error(HookKind::Start, &ctx, &e);
                    self.record_failure(Arc::clone(e.message()));
                    self.begin_stop();
                }
            },
            HookKind::Check => match result {
                Ok(()) => {
                    self.next_check_at = Some(Instant::now() + self.check_interval);
                }
                Err(e) => {
                    // A failed health probe while Ready is a critical failure.
                    self.report_hook_error(HookKind::Check, &ctx, &e);
                    self.record_failure(Arc::clone(e.message()));
                }
            },
            HookKind::Stop => {
                if let Err(e) = result {
                    // Stop failures are reported, never fatal on their own.
                    self.report_hook_error(HookKind::Stop, &ctx, &e);
                }
                match self.failure.clone() {
                    Some(reason) => self.enter_failed(reason),
                    None => self.set_state(ServiceState::Stopped),
                }
            }
            HookKind::Dispose => {
                if let Err(e) = result {
                    self.report_hook_error(HookKind::Dispose, &ctx, &e);
                }
                self.set_state(ServiceState::Disposed);
            }
        }
    }

    fn on_check_due(&mut self) {
        self.next_check_at = None;
        if self.state == ServiceState::Ready && self.pending.is_none() {
            let ctx = CallContext::new();
            let hooks = Arc::clone(&self.hooks);
            let hook_ctx = ctx.clone();
            self.install_pending(
                HookKind::Check,
                ctx,
                Box::pin(async move { hooks.check(hook_ctx).await }),
            );
        }
    }

    fn on_recovery_due(&mut self) {
        self.recover_at = None;
        if self.state == ServiceState::Failed {
            self.failure = None;
            self.set_state(ServiceState::Stopped);
        }
    }

    fn on_slow_hook(&mut self) {
        if let Some(p) = self.pending.as_mut() {
            let running_for = p.started.elapsed();
            p.warn_at += self.slow_hook_threshold;
            self.bus.publish(
                Event::new(EventKind::HookTooSlow)
                    .with_service(Arc::clone(&self.name))
                    .with_hook(p.kind)
                    .with_context(p.context.as_arc())
                    .with_duration(running_for),
            );
        }
    }

    // === the transition function ===

    /// Inspects the current state and the request/dependency flags and takes
    /// every transition that does not require a pending hook to settle.
    fn advance(&mut self) {
        while self.pending.is_none() {
            let moved = match self.state {
                ServiceState::NotInitialized => {
                    if self.dispose_requested {
                        self.begin_dispose();
                    } else if self.deps.all_ready() {
                        self.begin_init();
                    } else {
                        self.set_state(ServiceState::WaitingDependencies);
                    }
                    true
                }
                ServiceState::WaitingDependencies => {
                    if self.dispose_requested {
                        self.begin_dispose();
                        true
                    } else if self.deps.any_failed() {
                        self.set_state(ServiceState::WaitingFailedDependency);
                        true
                    } else if self.deps.all_ready() {
                        self.begin_init();
                        true
                    } else {
                        false
                    }
                }
                ServiceState::WaitingFailedDependency => {
                    if self.dispose_requested {
                        self.begin_dispose();
                        true
                    } else if !self.deps.any_failed() {
                        self.set_state(ServiceState::WaitingDependencies);
                        true
                    } else {
                        false
                    }
                }
                ServiceState::InitializeFailed => {
                    if self.dispose_requested {
                        self.failure = None;
                        self.begin_dispose();
                        true
                    } else {
                        false
                    }
                }
                ServiceState::Stopped => {
                    if self.dispose_requested {
                        self.begin_dispose();
                        true
                    } else if !self.stop_requested && self.deps.all_ready() {
                        self.begin_start();
                        true
                    } else {
                        false
                    }
                }
                ServiceState::Ready => {
                    if self.dispose_requested
                        || self.stop_requested
                        || self.failure.is_some()
                        || !self.deps.all_ready()
                    {
                        self.begin_stop();
                        true
                    } else {
                        false
                    }
                }
                ServiceState::Failed => {
                    if self.dispose_requested {
                        self.recover_at = None;
                        self.failure = None;
                        self.quick_restart = false;
                        self.begin_dispose();
                        true
                    } else if self.stop_requested {
                        // Force-stop short-circuits the recovery delay.
                        self.recover_at = None;
                        self.failure = None;
                        self.quick_restart = false;
                        self.set_state(ServiceState::Stopped);
                        true
                    } else {
                        false
                    }
                }
                // Driven by the pending hook settling.
                ServiceState::Initializing
                | ServiceState::Starting
                | ServiceState::Stopping
                | ServiceState::Disposing
                | ServiceState::Disposed => false,
            };
            if !moved {
                break;
            }
        }
    }

    // === transition helpers ===

    fn begin_init(&mut self) {
        self.set_state(ServiceState::Initializing);
        let ctx = CallContext::new();
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = ctx.clone();
        self.install_pending(
            HookKind::Init,
            ctx,
            Box::pin(async move { hooks.init(hook_ctx).await }),
        );
    }

    /// Folds prestart → check → start into one pending operation, run in
    /// order with the same call context.
    fn begin_start(&mut self) {
        self.set_state(ServiceState::Starting);
        let ctx = CallContext::new();
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = ctx.clone();
        self.install_pending(
            HookKind::Start,
            ctx,
            Box::pin(async move {
                hooks.prestart(hook_ctx.clone()).await?;
                hooks.check(hook_ctx.clone()).await?;
                hooks.start(hook_ctx).await
            }),
        );
    }

    fn begin_stop(&mut self) {
        self.next_check_at = None;
        if let Some(token) = self.run_cancel.take() {
            token.cancel();
        }
        self.set_state(ServiceState::Stopping);
        let ctx = CallContext::new();
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = ctx.clone();
        self.install_pending(
            HookKind::Stop,
            ctx,
            Box::pin(async move { hooks.stop(hook_ctx).await }),
        );
    }

    fn begin_dispose(&mut self) {
        self.next_check_at = None;
        self.recover_at = None;
        if let Some(token) = self.run_cancel.take() {
            token.cancel();
        }
        self.set_state(ServiceState::Disposing);
        let ctx = CallContext::new();
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = ctx.clone();
        self.install_pending(
            HookKind::Dispose,
            ctx,
            Box::pin(async move { hooks.dispose(hook_ctx).await }),
        );
    }

    fn enter_ready(&mut self) {
        self.restart.reset();
        self.quick_restart = false;
        self.set_state(ServiceState::Ready);
        self.next_check_at = Some(Instant::now() + self.check_interval);
        self.spawn_run_hook();
    }

    fn enter_failed(&mut self, reason: Arc<str>) {
        let raw = self
            .hooks
            .restart_logic(self.restart.attempts(), self.fail_recovery_interval);
        let decision = self.restart.apply(raw);
        self.failure = Some(Arc::clone(&reason));
        self.quick_restart = decision.quick;
        self.set_state(ServiceState::Failed);
        self.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_service(Arc::clone(&self.name))
                .with_delay(decision.delay)
                .with_attempt(self.restart.attempts())
                .with_reason(reason),
        );
        self.recover_at = Some(Instant::now() + decision.delay);
    }

    /// Records a failure while Ready and lets `advance()` take the Stopping
    /// path. The quick-restart flag is raised eagerly (from the prospective
    /// policy decision) so guarded calls already in flight can hold on
    /// through the restart instead of failing on the Stopping window.
    fn record_failure(&mut self, reason: Arc<str>) {
        let prospective = self
            .hooks
            .restart_logic(self.restart.attempts(), self.fail_recovery_interval);
        self.quick_restart = self.restart.peek(prospective).quick;
        self.failure = Some(reason);
        self.publish_status();
    }

    /// Fires the `run` hook once, fire-and-forget, with a token cancelled
    /// when the service leaves `Ready`.
    fn spawn_run_hook(&mut self) {
        let token = CancellationToken::new();
        self.run_cancel = Some(token.clone());
        let hooks = Arc::clone(&self.hooks);
        let bus = self.bus.clone();
        let name = Arc::clone(&self.name);
        let ctx = CallContext::new();
        tokio::spawn(async move {
            let ev_ctx = ctx.as_arc();
            if let Err(e) = hooks.run(ctx, token).await {
                bus.publish(
                    Event::new(EventKind::ServiceError)
                        .with_service(name)
                        .with_reason(Arc::clone(e.message()))
                        .with_context(ev_ctx),
                );
            }
        });
    }

    fn install_pending(
        &mut self,
        kind: HookKind,
        context: CallContext,
        fut: Pin<Box<dyn Future<Output = Result<(), HookError>> + Send>>,
    ) {
        debug_assert!(self.pending.is_none());
        let now = Instant::now();
        self.pending = Some(PendingHook {
            kind,
            context,
            started: now,
            warn_at: now + self.slow_hook_threshold,
            fut,
        });
    }

    /// Applies the transition: publishes exactly one `StateChanged` event and
    /// refreshes the status channel.
    fn set_state(&mut self, new: ServiceState) {
        let prev = self.state;
        self.state = new;
        let mut ev = Event::new(EventKind::StateChanged)
            .with_service(Arc::clone(&self.name))
            .with_transition(prev, new);
        if let Some(reason) = &self.failure {
            ev = ev.with_reason(Arc::clone(reason));
        }
        self.bus.publish(ev);
        self.publish_status();
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send_replace(ServiceStatus {
            state: self.state,
            failure: self.failure.clone(),
            quick_restart: self.quick_restart,
        });
    }

    fn report_hook_error(&self, hook: HookKind, ctx: &CallContext, err: &HookError) {
        self.bus.publish(
            Event::new(EventKind::ServiceError)
                .with_service(Arc::clone(&self.name))
                .with_hook(hook)
                .with_context(ctx.as_arc())
                .with_reason(Arc::clone(err.message())),
        );
    }

    fn report_error(
        &self,
        reason: Option<Arc<str>>,
        hook: Option<HookKind>,
        ctx: Option<&CallContext>,
    ) {
        let mut ev = Event::new(EventKind::ServiceError).with_service(Arc::clone(&self.name));
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        if let Some(hook) = hook {
            ev = ev.with_hook(hook);
        }
        if let Some(ctx) = ctx {
            ev = ev.with_context(ctx.as_arc());
        }
        self.bus.publish(ev);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::watch;

    use crate::core::testutil::{
        dep_map, spawn, spawn_with_deps, state_sequence, wait_state, Probe, TEST_WAIT,
    };
    use crate::error::{CallError, HookError};
    use crate::events::{Bus, Event, EventKind};
    use crate::policies::RestartDecision;
    use crate::services::{CallContext, HookKind, HooksRef, ServiceHooks, ServiceSpec, ServiceState};

    fn spec(name: &str, probe: &Arc<Probe>) -> ServiceSpec {
        ServiceSpec::new(name, Arc::clone(probe) as HooksRef)
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_walks_init_stopped_starting_ready() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let probe = Probe::arc();
        let svc = spawn(&spec("db", &probe), &bus);

        let seq = state_sequence(&mut rx, "db", ServiceState::Ready).await;
        assert_eq!(
            seq,
            vec![
                ServiceState::Initializing,
                ServiceState::Stopped,
                ServiceState::Starting,
                ServiceState::Ready,
            ]
        );
        assert!(svc.state().is_ready());
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.prestart_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.check_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_hook_fires_once_per_ready() {
        let bus = Bus::new(256);
        let probe = Probe::arc();
        let svc = spawn(&spec("worker", &probe), &bus);

        wait_state(&svc, ServiceState::Ready).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(probe.run_calls.load(Ordering::SeqCst), 1);

        svc.stop();
        wait_state(&svc, ServiceState::Stopped).await;
        svc.start();
        wait_state(&svc, ServiceState::Ready).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(probe.run_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_start_round_trip_does_not_reinit() {
        let bus = Bus::new(256);
        let probe = Probe::arc();
        let svc = spawn(&spec("cache", &probe), &bus);
        wait_state(&svc, ServiceState::Ready).await;

        svc.stop();
        wait_state(&svc, ServiceState::Stopped).await;
        assert_eq!(probe.stop_calls.load(Ordering::SeqCst), 1);

        svc.start();
        wait_state(&svc, ServiceState::Ready).await;
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.start_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_failure_takes_stop_failed_quick_restart_path() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let probe = Probe::arc();
        let svc = spawn(&spec("api", &probe), &bus);
        state_sequence(&mut rx, "api", ServiceState::Ready).await;

        svc.critical_failure("upstream gone").unwrap();
        let seq = state_sequence(&mut rx, "api", ServiceState::Ready).await;
        assert_eq!(
            seq,
            vec![
                ServiceState::Stopping,
                ServiceState::Failed,
                ServiceState::Stopped,
                ServiceState::Starting,
                ServiceState::Ready,
            ]
        );
        assert_eq!(probe.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.start_calls.load(Ordering::SeqCst), 2);
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_failure_rejected_outside_ready() {
        let bus = Bus::new(256);
        let probe = Probe::arc();
        let svc = spawn(&spec("api", &probe), &bus);
        wait_state(&svc, ServiceState::Ready).await;
        svc.stop();
        wait_state(&svc, ServiceState::Stopped).await;

        let err = svc.critical_failure("too late").unwrap_err();
        match err {
            CallError::InvalidState { state, .. } => assert_eq!(state, ServiceState::Stopped),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(svc.state(), ServiceState::Stopped);
        assert!(svc.failure_reason().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_check_schedules_quick_then_delayed_restarts() {
        let bus = Bus::new(256);
        let probe = Probe::arc();
        let spec = spec("flaky", &probe)
            .with_check_interval(Duration::from_secs(1))
            .with_fail_recovery_interval(Duration::from_secs(5));
        let svc = spawn(&spec, &bus);
        wait_state(&svc, ServiceState::Ready).await;

        let mut rx = bus.subscribe();
        probe.fail_check.store(true, Ordering::SeqCst);

        let mut delays = Vec::new();
        while delays.len() < 3 {
            let ev = tokio::time::timeout(TEST_WAIT, rx.recv())
                .await
                .expect("timed out waiting for restart events")
                .expect("bus closed");
            if ev.kind == EventKind::RestartScheduled {
                delays.push(ev.delay_ms.expect("restart event without delay"));
            }
        }
        assert_eq!(delays, vec![0, 0, 5_000]);

        // Once the probe passes again the delayed recovery brings it back.
        probe.fail_check.store(false, Ordering::SeqCst);
        wait_state(&svc, ServiceState::Ready).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_mid_start_settles_the_hook_then_stops() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let probe = Probe::arc();
        probe.start_delay_ms.store(500, Ordering::SeqCst);
        let svc = spawn(&spec("db", &probe), &bus);

        wait_state(&svc, ServiceState::Starting).await;
        svc.dispose().await;

        let seq = state_sequence(&mut rx, "db", ServiceState::Disposed).await;
        assert_eq!(
            seq,
            vec![
                ServiceState::Initializing,
                ServiceState::Stopped,
                ServiceState::Starting,
                ServiceState::Stopping,
                ServiceState::Stopped,
                ServiceState::Disposing,
                ServiceState::Disposed,
            ]
        );
        // The in-flight start ran to completion before teardown began.
        assert_eq!(probe.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.dispose_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_hook_warns_repeatedly_until_it_settles() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let probe = Probe::arc();
        probe.start_delay_ms.store(45_000, Ordering::SeqCst);
        let svc = spawn(&spec("slow", &probe), &bus);

        let mut warnings = Vec::new();
        while warnings.len() < 2 {
            let ev = tokio::time::timeout(TEST_WAIT, rx.recv())
                .await
                .expect("timed out waiting for slow-hook warnings")
                .expect("bus closed");
            if ev.kind == EventKind::HookTooSlow {
                assert_eq!(ev.hook, Some(HookKind::Start));
                warnings.push(ev.duration_ms.expect("warning without duration"));
            }
        }
        assert!(warnings[0] >= 20_000);
        assert!(warnings[1] >= 40_000);
        wait_state(&svc, ServiceState::Ready).await;
    }

    struct FixedBackoff {
        fail_check: AtomicBool,
    }

    #[async_trait]
    impl ServiceHooks for FixedBackoff {
        async fn check(&self, _ctx: CallContext) -> Result<(), HookError> {
            if self.fail_check.swap(false, Ordering::SeqCst) {
                Err(HookError::new("probe lost"))
            } else {
                Ok(())
            }
        }

        fn restart_logic(&self, _attempt: u32, _interval: Duration) -> RestartDecision {
            RestartDecision {
                delay: Duration::from_millis(250),
                quick: false,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_logic_override_drives_the_schedule() {
        let bus = Bus::new(256);
        let hooks = Arc::new(FixedBackoff {
            fail_check: AtomicBool::new(false),
        });
        let spec = ServiceSpec::new("custom", Arc::clone(&hooks) as HooksRef)
            .with_check_interval(Duration::from_secs(1));
        let svc = spawn(&spec, &bus);
        wait_state(&svc, ServiceState::Ready).await;

        let mut rx = bus.subscribe();
        hooks.fail_check.store(true, Ordering::SeqCst);

        loop {
            let ev = tokio::time::timeout(TEST_WAIT, rx.recv())
                .await
                .expect("timed out waiting for the restart event")
                .expect("bus closed");
            if ev.kind == EventKind::RestartScheduled {
                assert_eq!(ev.delay_ms, Some(250));
                assert_eq!(ev.attempt, Some(1));
                break;
            }
        }
        wait_state(&svc, ServiceState::Ready).await;
    }

    fn dep_view(state: ServiceState) -> (watch::Sender<super::ServiceStatus>, HashMap<Arc<str>, watch::Receiver<super::ServiceStatus>>) {
        let (tx, rx) = watch::channel(super::ServiceStatus {
            state,
            failure: None,
            quick_restart: false,
        });
        let mut map = HashMap::new();
        map.insert(Arc::from("a"), rx);
        (tx, map)
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_ready_dependency_is_captured_by_the_seed() {
        let bus = Bus::new(256);
        let (_dep_tx, deps) = dep_view(ServiceState::Ready);
        let probe = Probe::arc();
        let b = spawn_with_deps(&spec("b", &probe).with_depends_on(["a"]), &bus, deps);

        // A stable dependency broadcasts nothing further; the status seed
        // alone must open the gate.
        wait_state(&b, ServiceState::Ready).await;
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_broadcast_right_after_wiring_is_not_lost() {
        let bus = Bus::new(256);
        let (_dep_tx, deps) = dep_view(ServiceState::Starting);
        let probe = Probe::arc();
        let b = spawn_with_deps(&spec("b", &probe).with_depends_on(["a"]), &bus, deps);

        // The only Ready notification goes out after the actor is wired up
        // but before it runs, and the status view never reflects it. The
        // subscription taken during wiring must still deliver it.
        bus.publish(
            Event::new(EventKind::StateChanged)
                .with_service("a")
                .with_transition(ServiceState::Starting, ServiceState::Ready),
        );
        wait_state(&b, ServiceState::Ready).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_waits_until_dependency_is_ready() {
        let bus = Bus::new(256);
        let dep_probe = Probe::arc();
        dep_probe.init_delay_ms.store(10, Ordering::SeqCst);
        let a = spawn(&spec("a", &dep_probe), &bus);
        a.stop();

        let probe = Probe::arc();
        let b_spec = spec("b", &probe).with_depends_on(["a"]);
        let b = spawn_with_deps(&b_spec, &bus, dep_map(&[&a]));

        wait_state(&b, ServiceState::WaitingDependencies).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(b.state(), ServiceState::WaitingDependencies);
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 0);

        a.start();
        wait_state(&a, ServiceState::Ready).await;
        wait_state(&b, ServiceState::Ready).await;
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_a_dependency_stops_the_dependent() {
        let bus = Bus::new(256);
        let dep_probe = Probe::arc();
        let a = spawn(&spec("a", &dep_probe), &bus);
        let probe = Probe::arc();
        let b_spec = spec("b", &probe).with_depends_on(["a"]);
        let b = spawn_with_deps(&b_spec, &bus, dep_map(&[&a]));
        wait_state(&b, ServiceState::Ready).await;

        a.stop();
        wait_state(&b, ServiceState::Stopped).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(b.state(), ServiceState::Stopped);

        a.start();
        wait_state(&b, ServiceState::Ready).await;
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.start_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dependency_parks_the_dependent() {
        let bus = Bus::new(256);
        let dep_probe = Probe::arc();
        dep_probe.fail_init.store(true, Ordering::SeqCst);
        let a = spawn(&spec("a", &dep_probe), &bus);
        let probe = Probe::arc();
        let b_spec = spec("b", &probe).with_depends_on(["a"]);
        let b = spawn_with_deps(&b_spec, &bus, dep_map(&[&a]));

        wait_state(&a, ServiceState::InitializeFailed).await;
        wait_state(&b, ServiceState::WaitingFailedDependency).await;
        assert_eq!(a.failure_reason().as_deref(), Some("init failed"));
        assert_eq!(probe.init_calls.load(Ordering::SeqCst), 0);

        // Both park permanently, but disposal still works from there.
        b.dispose().await;
        a.dispose().await;
        assert_eq!(b.state(), ServiceState::Disposed);
        assert_eq!(a.state(), ServiceState::Disposed);
        assert_eq!(probe.dispose_calls.load(Ordering::SeqCst), 1);
    }
}
