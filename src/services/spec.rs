//! # Service specification for supervised execution.
//!
//! [`ServiceSpec`] bundles a component implementation ([`HooksRef`]) with its
//! descriptor: process-unique name, optional kind tag, declared dependencies,
//! recovery/check intervals and an arbitrary settings payload announced once
//! at registration.
//!
//! A spec can be created:
//! - **Explicitly** with [`ServiceSpec::new`] plus `with_*` builders;
//! - **From config** with [`ServiceSpec::with_defaults`] (inherit intervals).
//!
//! ## Rules
//! - The spec is immutable after [`Node::register`](crate::Node::register).
//! - Dependencies must name services registered earlier in declaration order.

use std::sync::Arc;
use std::time::Duration;

use crate::config::NodeConfig;
use crate::services::hooks::HooksRef;

/// Descriptor plus implementation for one supervised service.
#[derive(Clone)]
pub struct ServiceSpec {
    name: Arc<str>,
    kind: Option<Arc<str>>,
    hooks: HooksRef,
    depends_on: Vec<Arc<str>>,
    fail_recovery_interval: Duration,
    check_interval: Duration,
    settings: Option<serde_json::Value>,
}

impl ServiceSpec {
    /// Creates a spec with the crate-default intervals (60 s each).
    ///
    /// ### Parameters
    /// - `name`: process-unique service name
    /// - `hooks`: the component implementation
    pub fn new(name: impl Into<Arc<str>>, hooks: HooksRef) -> Self {
        Self {
            name: name.into(),
            kind: None,
            hooks,
            depends_on: Vec::new(),
            fail_recovery_interval: Duration::from_secs(60),
            check_interval: Duration::from_secs(60),
            settings: None,
        }
    }

    /// Creates a spec inheriting intervals from the node configuration.
    pub fn with_defaults(name: impl Into<Arc<str>>, hooks: HooksRef, cfg: &NodeConfig) -> Self {
        Self::new(name, hooks)
            .with_fail_recovery_interval(cfg.fail_recovery_interval)
            .with_check_interval(cfg.check_interval)
    }

    /// Sets an optional type tag (e.g. `"connector"`, `"cache"`).
    pub fn with_kind(mut self, kind: impl Into<Arc<str>>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Declares the services this one depends on. The service will not
    /// initialize or start until every named dependency is `Ready`.
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the delay used by the default restart policy once quick attempts
    /// are exhausted.
    pub fn with_fail_recovery_interval(mut self, interval: Duration) -> Self {
        self.fail_recovery_interval = interval;
        self
    }

    /// Sets the period of the health-check timer while `Ready`.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Attaches an arbitrary settings payload, announced once via a
    /// `SettingsAnnounced` event when the service is registered.
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Service name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Optional type tag.
    pub fn kind(&self) -> Option<&Arc<str>> {
        self.kind.as_ref()
    }

    /// The component implementation.
    pub fn hooks(&self) -> &HooksRef {
        &self.hooks
    }

    /// Declared dependency names.
    pub fn depends_on(&self) -> &[Arc<str>] {
        &self.depends_on
    }

    /// Restart delay for non-quick recovery attempts.
    pub fn fail_recovery_interval(&self) -> Duration {
        self.fail_recovery_interval
    }

    /// Health-check period while `Ready`.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Settings payload, if any.
    pub fn settings(&self) -> Option<&serde_json::Value> {
        self.settings.as_ref()
    }
}
