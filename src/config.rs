//! # Global node configuration.
//!
//! [`NodeConfig`] defines node-wide behavior: event bus capacity, default
//! recovery/check intervals inherited by service specs, the slow-hook
//! warning threshold, and the optional dispose grace period.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use servisor::NodeConfig;
//!
//! let mut cfg = NodeConfig::default();
//! cfg.fail_recovery_interval = Duration::from_secs(10);
//! cfg.dispose_grace = Some(Duration::from_secs(30));
//!
//! assert_eq!(cfg.check_interval, Duration::from_secs(60));
//! ```

use std::time::Duration;

/// Global configuration for the node supervisor and its services.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
    /// Default delay before a non-quick restart attempt
    /// (inherited by [`ServiceSpec::with_defaults`](crate::ServiceSpec::with_defaults)).
    pub fail_recovery_interval: Duration,
    /// Default period of the health-check timer while `Ready`.
    pub check_interval: Duration,
    /// How long a single hook invocation may run before periodic
    /// `HookTooSlow` warnings are emitted.
    pub slow_hook_threshold: Duration,
    /// Upper bound on [`Node::dispose`](crate::Node::dispose). `None`
    /// (default) waits indefinitely, matching a dispose hook that never
    /// settles with a shutdown that never completes.
    pub dispose_grace: Option<Duration>,
}

impl Default for NodeConfig {
    /// Provides a default configuration:
    /// - `bus_capacity = 1024`
    /// - `fail_recovery_interval = 60s`
    /// - `check_interval = 60s`
    /// - `slow_hook_threshold = 20s`
    /// - `dispose_grace = None` (unbounded)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            fail_recovery_interval: Duration::from_secs(60),
            check_interval: Duration::from_secs(60),
            slow_hook_threshold: Duration::from_secs(20),
            dispose_grace: None,
        }
    }
}
