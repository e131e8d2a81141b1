//! # Node: registers services and reports aggregate startup.
//!
//! The [`Node`] owns the event bus and a [`SubscriberSet`], spawns one actor
//! per registered [`ServiceSpec`], and watches the bus until every service
//! has visited `Ready` or `Failed` at least once — then it publishes a single
//! `NodeStarted` event and resolves [`Node::started`].
//!
//! ## High-level architecture
//! ```text
//! register([A, B(deps:[A]), C(deps:[A,B])])
//!   │  validate names/deps ─► spawn ServiceActor per spec (implicit start)
//!   ▼
//! Bus ──► startup monitor: first visit of Ready|Failed per service
//!   │         └─ all visited ─► NodeStarted { elapsed, failed[] }
//!   │                           started() resolves (exactly once)
//!   └──► subscriber listener ─► SubscriberSet::emit(&Event)
//!
//! dispose():
//!   every non-Disposed service ─► Service::dispose() (join_all)
//!     ├─ Ok (all reached Disposed)      ─► NodeDisposed { elapsed }
//!     └─ dispose_grace exceeded         ─► NodeError::DisposeGraceExceeded
//! ```
//!
//! ## Rules
//! - Registration order is declaration order; a dependency must name an
//!   earlier-registered service (same batch counts).
//! - Registration is the implicit start: each actor begins advancing as soon
//!   as it is spawned.
//! - `started()` resolves exactly once, even if more services are registered
//!   afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::NodeConfig;
use crate::core::guard::MethodGuard;
use crate::core::service::{Service, ServiceActor, ServiceStatus};
use crate::core::shutdown;
use crate::error::{ConfigError, NodeError};
use crate::events::{Bus, Event, EventKind};
use crate::services::{HooksRef, ServiceSpec, ServiceState};
use crate::subscribers::{Subscribe, SubscriberSet};

struct Entry {
    handle: Service,
    hooks: HooksRef,
}

/// Startup aggregation shared with the monitor task.
struct Progress {
    total: usize,
    visited: HashSet<Arc<str>>,
    currently_failed: HashSet<Arc<str>>,
    started_at: Option<Instant>,
    done: bool,
}

/// Supervisor over many services: ordered registration, aggregate startup
/// reporting, coordinated disposal.
pub struct Node {
    cfg: NodeConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: HashMap<Arc<str>, Entry>,
    order: Vec<Arc<str>>,
    progress: Arc<Mutex<Progress>>,
    started_rx: watch::Receiver<bool>,
}

impl Node {
    /// Creates a node with the given config and subscribers, and starts the
    /// bus listeners (startup monitor + subscriber fan-out).
    pub fn new(cfg: NodeConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let progress = Arc::new(Mutex::new(Progress {
            total: 0,
            visited: HashSet::new(),
            currently_failed: HashSet::new(),
            started_at: None,
            done: false,
        }));
        let (started_tx, started_rx) = watch::channel(false);

        Self::spawn_subscriber_listener(&bus, Arc::clone(&subs));
        Self::spawn_startup_monitor(&bus, Arc::clone(&progress), started_tx);

        Self {
            cfg,
            bus,
            subs,
            registry: HashMap::new(),
            order: Vec::new(),
            progress,
            started_rx,
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn spawn_subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Watches state changes until every registered service has visited
    /// `Ready` or `Failed` at least once, then reports completion.
    fn spawn_startup_monitor(
        bus: &Bus,
        progress: Arc<Mutex<Progress>>,
        started_tx: watch::Sender<bool>,
    ) {
        let mut rx = bus.subscribe();
        let bus = bus.clone();
        tokio::spawn(async move {
            loop {
                let ev = match rx.recv().await {
                    Ok(ev) => ev,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if !ev.is_state_change() {
                    continue;
                }
                let (Some(service), Some(state)) = (ev.service.clone(), ev.state) else {
                    continue;
                };

                let completion = {
                    let mut p = progress.lock().unwrap_or_else(|e| e.into_inner());
                    match state {
                        ServiceState::Failed | ServiceState::InitializeFailed => {
                            p.currently_failed.insert(Arc::clone(&service));
                        }
                        _ => {
                            p.currently_failed.remove(&service);
                        }
                    }
                    if matches!(
                        state,
                        ServiceState::Ready
                            | ServiceState::Failed
                            | ServiceState::InitializeFailed
                    ) {
                        p.visited.insert(Arc::clone(&service));
                    }
                    if !p.done && p.total > 0 && p.visited.len() == p.total {
                        p.done = true;
                        let mut failed: Vec<Arc<str>> =
                            p.currently_failed.iter().cloned().collect();
                        failed.sort_unstable();
                        let elapsed = p
                            .started_at
                            .map(|t| t.elapsed())
                            .unwrap_or_default();
                        Some((elapsed, failed))
                    } else {
                        None
                    }
                };

                if let Some((elapsed, failed)) = completion {
                    bus.publish(
                        Event::new(EventKind::NodeStarted)
                            .with_elapsed(elapsed)
                            .with_failed(failed),
                    );
                    let _ = started_tx.send(true);
                }
            }
        });
    }

    /// Registers services in declaration order and spawns their actors.
    ///
    /// Dependencies must reference services registered earlier (earlier in
    /// the same batch counts). The whole batch is validated before anything
    /// is spawned; on error nothing is registered.
    pub fn register(&mut self, specs: Vec<ServiceSpec>) -> Result<(), ConfigError> {
        // Validate the batch up front.
        let mut known: HashSet<Arc<str>> = self.registry.keys().cloned().collect();
        for spec in &specs {
            let name = spec.name();
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if known.contains(name) {
                return Err(ConfigError::DuplicateName {
                    name: Arc::clone(name),
                });
            }
            for dep in spec.depends_on() {
                if !known.contains(dep) {
                    return Err(ConfigError::UnknownDependency {
                        service: Arc::clone(name),
                        dependency: Arc::clone(dep),
                    });
                }
            }
            known.insert(Arc::clone(name));
        }

        {
            let mut p = self.progress.lock().unwrap_or_else(|e| e.into_inner());
            p.total += specs.len();
            if p.started_at.is_none() {
                p.started_at = Some(Instant::now());
            }
        }

        for spec in specs {
            self.spawn_service(spec);
        }
        Ok(())
    }

    fn spawn_service(&mut self, spec: ServiceSpec) {
        let dep_status: HashMap<Arc<str>, watch::Receiver<ServiceStatus>> = spec
            .depends_on()
            .iter()
            .filter_map(|dep| {
                self.registry
                    .get(dep)
                    .map(|e| (Arc::clone(dep), e.handle.status()))
            })
            .collect();

        if let Some(settings) = spec.settings() {
            self.bus.publish(
                Event::new(EventKind::SettingsAnnounced)
                    .with_service(Arc::clone(spec.name()))
                    .with_settings(settings.clone()),
            );
        }

        let (handle, actor) = ServiceActor::new(
            &spec,
            self.bus.clone(),
            self.cfg.slow_hook_threshold,
            dep_status,
        );
        tokio::spawn(actor.run());

        self.order.push(Arc::clone(spec.name()));
        self.registry.insert(
            Arc::clone(spec.name()),
            Entry {
                handle,
                hooks: Arc::clone(spec.hooks()),
            },
        );
    }

    /// Resolves once every registered service has visited `Ready` or
    /// `Failed` at least once. Resolves exactly once per node; completion
    /// details ride the `NodeStarted` event.
    pub async fn started(&self) {
        let mut rx = self.started_rx.clone();
        let _ = rx.wait_for(|started| *started).await;
    }

    /// Requests disposal of every still-live service and waits until all of
    /// them reach `Disposed`. Services already disposed are skipped.
    ///
    /// With [`NodeConfig::dispose_grace`] set, the wait is bounded and
    /// [`NodeError::DisposeGraceExceeded`] lists the services that were
    /// still not disposed when it elapsed.
    pub async fn dispose(&self) -> Result<(), NodeError> {
        let started = Instant::now();
        let live: Vec<&Service> = self
            .order
            .iter()
            .filter_map(|name| self.registry.get(name))
            .map(|e| &e.handle)
            .filter(|s| s.state() != ServiceState::Disposed)
            .collect();

        let all = futures::future::join_all(live.iter().map(|s| s.dispose()));
        match self.cfg.dispose_grace {
            None => {
                all.await;
            }
            Some(grace) => {
                if tokio::time::timeout(grace, all).await.is_err() {
                    let stuck: Vec<Arc<str>> = live
                        .iter()
                        .filter(|s| s.state() != ServiceState::Disposed)
                        .map(|s| Arc::clone(s.name()))
                        .collect();
                    return Err(NodeError::DisposeGraceExceeded { grace, stuck });
                }
            }
        }

        self.bus
            .publish(Event::new(EventKind::NodeDisposed).with_elapsed(started.elapsed()));
        Ok(())
    }

    /// Waits for an OS termination signal, then disposes every service.
    pub async fn run_until_shutdown(&self) -> Result<(), NodeError> {
        let _ = shutdown::wait_for_shutdown_signal().await;
        self.dispose().await
    }

    /// Handle to a registered service.
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.registry.get(name).map(|e| &e.handle)
    }

    /// Registered services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.order
            .iter()
            .filter_map(|name| self.registry.get(name))
            .map(|e| &e.handle)
    }

    /// Builds a [`MethodGuard`] over a registered service's operations.
    pub fn guard(&self, name: &str) -> Option<MethodGuard> {
        self.registry.get(name).map(|e| {
            MethodGuard::new(e.handle.clone(), Arc::clone(&e.hooks), self.bus.clone())
        })
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The subscriber fan-out set.
    pub fn subscribers(&self) -> &Arc<SubscriberSet> {
        &self.subs
    }

    /// Node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.cfg
    }
}
