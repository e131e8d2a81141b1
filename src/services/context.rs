//! # Per-call correlation context.
//!
//! Every hook invocation and every guarded method call is tagged with a
//! [`CallContext`]: an opaque correlation id threaded through events and
//! errors so a single logical operation can be traced across log lines.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Process-wide counter backing generated context ids.
static CONTEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque correlation id for one logical call.
///
/// Cheap to clone (`Arc`-backed). A fresh id is generated per hook invocation
/// by the service actor; callers of guarded methods usually carry their own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext(Arc<str>);

impl CallContext {
    /// Generates a fresh process-unique context id.
    pub fn new() -> Self {
        let n = CONTEXT_SEQ.fetch_add(1, AtomicOrdering::Relaxed);
        Self(format!("ctx-{n}").into())
    }

    /// Wraps an externally supplied correlation id.
    pub fn from_id(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn id(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CallContext::new();
        let b = CallContext::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_external_id_round_trips() {
        let ctx = CallContext::from_id("req-42");
        assert_eq!(ctx.id(), "req-42");
    }
}
