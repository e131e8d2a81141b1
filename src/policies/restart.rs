//! # Restart policy for failed services.
//!
//! When a service lands in `Failed`, the policy maps the consecutive-failure
//! attempt counter to a [`RestartDecision`]: how long to wait before moving
//! back to `Stopped`, and whether the attempt counts as a *quick restart*.
//!
//! ## Default schedule
//! ```text
//! attempt 0 → { delay: 0,                      quick: true  }
//! attempt 1 → { delay: 0,                      quick: true  }
//! attempt ≥2 → { delay: fail_recovery_interval, quick: false }
//! ```
//!
//! ## Rules
//! - The attempt counter resets to 0 on reaching `Ready`.
//! - The quick flag is **sticky-false** within one failure episode: once any
//!   restart was non-quick, later restarts in the same episode stay non-quick
//!   even if the policy would say otherwise. This guards against flapping
//!   services re-entering the quick window without ever stabilizing.
//! - While a quick restart is in flight, [`MethodGuard`](crate::MethodGuard)
//!   treats pending calls as retryable instead of failing them outright.
//!
//! Override per service via
//! [`ServiceHooks::restart_logic`](crate::ServiceHooks::restart_logic).

use std::time::Duration;

/// Number of immediate retry attempts before delays kick in.
pub const QUICK_RESTART_ATTEMPTS: u32 = 2;

/// Outcome of the restart policy for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    /// How long to stay in `Failed` before moving to `Stopped`.
    pub delay: Duration,
    /// Whether this restart is part of the quick window.
    pub quick: bool,
}

/// Default restart schedule: two immediate quick attempts, then
/// `fail_recovery_interval` delays.
pub fn default_restart(attempt: u32, fail_recovery_interval: Duration) -> RestartDecision {
    if attempt < QUICK_RESTART_ATTEMPTS {
        RestartDecision {
            delay: Duration::ZERO,
            quick: true,
        }
    } else {
        RestartDecision {
            delay: fail_recovery_interval,
            quick: false,
        }
    }
}

/// Per-episode restart bookkeeping owned by the service actor.
///
/// Tracks the consecutive-failure counter and enforces the sticky-false
/// quick flag on top of whatever policy produced the raw decision.
#[derive(Debug, Clone)]
pub struct RestartState {
    attempts: u32,
    quick_allowed: bool,
}

impl RestartState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            quick_allowed: true,
        }
    }

    /// Consecutive failures in the current episode.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Applies a raw policy decision for the current failure, advances the
    /// attempt counter and enforces stickiness.
    pub fn apply(&mut self, mut decision: RestartDecision) -> RestartDecision {
        self.attempts += 1;
        if !self.quick_allowed {
            decision.quick = false;
        }
        if !decision.quick {
            self.quick_allowed = false;
        }
        decision
    }

    /// Previews what stickiness would do to a raw decision for the current
    /// failure, without advancing the counter. Used to raise the
    /// quick-restart flag eagerly when a failure is first recorded.
    pub fn peek(&self, mut decision: RestartDecision) -> RestartDecision {
        if !self.quick_allowed {
            decision.quick = false;
        }
        decision
    }

    /// Resets the episode; called on reaching `Ready`.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.quick_allowed = true;
    }
}

impl Default for RestartState {
    fn default() -> Self {
        Self::new()
    }
}
