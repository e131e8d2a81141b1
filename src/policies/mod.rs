//! Restart policy: when and how fast a failed service is brought back.
//!
//! ## Contents
//! - [`RestartDecision`] delay + quick flag for one failure
//! - [`default_restart`] the two-quick-then-interval schedule
//! - [`RestartState`] per-episode counter with sticky-false quick flag
//!
//! ## Quick wiring
//! ```text
//! Failed entered ─► hooks.restart_logic(attempts, fail_recovery_interval)
//!                ─► RestartState::apply(raw)   (stickiness, counter)
//!                ─► sleep(decision.delay) ─► Stopped
//! ```

mod restart;

pub use restart::{default_restart, RestartDecision, RestartState, QUICK_RESTART_ATTEMPTS};
