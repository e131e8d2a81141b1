//! # Dependency readiness tracker.
//!
//! Maintains the per-service view of which declared dependencies are
//! currently `Ready`, updated incrementally from `StateChanged` broadcasts.
//!
//! ## Architecture
//! ```text
//! Bus ──► service actor ──► DependencyTracker::observe(name, state)
//!                                   │
//!                                   ▼
//!                      HashMap<name, {ready, failed}>
//!                      + ready_count / failed_count
//! ```
//!
//! ## Rules
//! - Updates are **edge-triggered and idempotent**: a second "became ready"
//!   notification for an already-ready dependency changes nothing, so
//!   duplicated or re-ordered broadcast delivery cannot double-count.
//! - Counters move only when a flag actually flips; `all_ready()` and
//!   `any_failed()` are O(1).
//! - After a broadcast lag the owning actor calls [`DependencyTracker::resync`]
//!   with authoritative states read from the dependencies' status channels.

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::ServiceState;

#[derive(Debug, Clone, Copy, Default)]
struct DepFlags {
    ready: bool,
    failed: bool,
}

/// Incremental readiness view over one service's declared dependencies.
#[derive(Debug)]
pub(crate) struct DependencyTracker {
    deps: HashMap<Arc<str>, DepFlags>,
    ready_count: usize,
    failed_count: usize,
}

impl DependencyTracker {
    /// Builds a tracker seeded with the dependencies' states at registration.
    pub fn new(seed: impl IntoIterator<Item = (Arc<str>, ServiceState)>) -> Self {
        let mut tracker = Self {
            deps: HashMap::new(),
            ready_count: 0,
            failed_count: 0,
        };
        for (name, state) in seed {
            tracker.deps.insert(name.clone(), DepFlags::default());
            tracker.observe(&name, state);
        }
        tracker
    }

    /// Applies one observed dependency state. Returns `true` when the
    /// aggregate view (`all_ready` / `any_failed`) may have changed.
    ///
    /// States of services not in the declared set are ignored.
    pub fn observe(&mut self, name: &str, state: ServiceState) -> bool {
        let Some(flags) = self.deps.get_mut(name) else {
            return false;
        };

        let ready = state.is_ready();
        let failed = state.is_failed();
        let mut changed = false;

        if ready != flags.ready {
            flags.ready = ready;
            if ready {
                self.ready_count += 1;
            } else {
                self.ready_count -= 1;
            }
            changed = true;
        }
        if failed != flags.failed {
            flags.failed = failed;
            if failed {
                self.failed_count += 1;
            } else {
                self.failed_count -= 1;
            }
            changed = true;
        }
        changed
    }

    /// Re-applies authoritative states for every dependency. Used after a
    /// broadcast lag, when intermediate notifications may have been dropped.
    pub fn resync<'a>(&mut self, states: impl IntoIterator<Item = (&'a str, ServiceState)>) {
        for (name, state) in states {
            self.observe(name, state);
        }
    }

    /// True when every declared dependency is currently `Ready`.
    pub fn all_ready(&self) -> bool {
        self.ready_count == self.deps.len()
    }

    /// True when at least one dependency is failed (or itself stuck behind a
    /// failed dependency).
    pub fn any_failed(&self) -> bool {
        self.failed_count > 0
    }

    /// True when `name` is one of the tracked dependencies.
    pub fn tracks(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(names: &[&str]) -> DependencyTracker {
        DependencyTracker::new(
            names
                .iter()
                .map(|n| (Arc::from(*n), ServiceState::NotInitialized)),
        )
    }

    #[test]
    fn test_empty_set_is_always_ready() {
        let t = tracker(&[]);
        assert!(t.all_ready());
        assert!(!t.any_failed());
    }

    #[test]
    fn test_all_ready_requires_every_dependency() {
        let mut t = tracker(&["a", "b"]);
        assert!(!t.all_ready());

        t.observe("a", ServiceState::Ready);
        assert!(!t.all_ready());

        t.observe("b", ServiceState::Ready);
        assert!(t.all_ready());

        t.observe("a", ServiceState::Stopping);
        assert!(!t.all_ready());
    }

    #[test]
    fn test_duplicate_ready_notifications_are_idempotent() {
        let mut t = tracker(&["a"]);

        assert!(t.observe("a", ServiceState::Ready));
        assert!(!t.observe("a", ServiceState::Ready));
        assert!(t.all_ready());

        // Losing readiness once, regardless of how many ready events came in.
        assert!(t.observe("a", ServiceState::Stopping));
        assert!(!t.all_ready());
        assert!(!t.observe("a", ServiceState::Stopped));
    }

    #[test]
    fn test_failed_dependency_flags_and_recovers() {
        let mut t = tracker(&["a"]);

        t.observe("a", ServiceState::Failed);
        assert!(t.any_failed());
        assert!(!t.all_ready());

        // Recovery path: Failed -> Stopped -> Starting -> Ready.
        t.observe("a", ServiceState::Stopped);
        assert!(!t.any_failed());
        t.observe("a", ServiceState::Ready);
        assert!(t.all_ready());
    }

    #[test]
    fn test_transitively_stuck_dependency_counts_as_failed() {
        let mut t = tracker(&["a"]);
        t.observe("a", ServiceState::WaitingFailedDependency);
        assert!(t.any_failed());
    }

    #[test]
    fn test_untracked_services_are_ignored() {
        let mut t = tracker(&["a"]);
        assert!(!t.observe("other", ServiceState::Ready));
        assert!(!t.all_ready());
    }

    #[test]
    fn test_resync_recovers_missed_transitions() {
        let mut t = tracker(&["a", "b"]);
        t.observe("a", ServiceState::Ready);

        // Suppose we missed b going Ready and a going Failed.
        t.resync([
            ("a", ServiceState::Failed),
            ("b", ServiceState::Ready),
        ]);
        assert!(!t.all_ready());
        assert!(t.any_failed());
    }
}
