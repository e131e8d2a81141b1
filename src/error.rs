//! Error types used by the supervisor runtime and service implementations.
//!
//! This module defines four error families:
//!
//! - [`ConfigError`] — invalid registration input; raised before a service
//!   actor exists, always fatal to the `register` call.
//! - [`HookError`] — a lifecycle hook rejected; absorbed into the state
//!   machine as the failure reason, never rethrown to the transition
//!   requester.
//! - [`CallError`] — a guarded public method could not run or its
//!   implementation failed; always surfaced to the caller.
//! - [`NodeError`] — node-level failures such as an exceeded dispose grace.
//!
//! All types provide `as_label()` helpers for logs/metrics.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::services::ServiceState;

/// Boxed error produced by a guarded method implementation.
pub type OpError = Box<dyn std::error::Error + Send + Sync>;

/// # Errors raised at service registration time.
///
/// These are programmer/configuration mistakes; nothing is registered when
/// one is returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A service with the same name is already registered.
    #[error("service '{name}' is already registered")]
    DuplicateName {
        /// The offending service name.
        name: Arc<str>,
    },

    /// The service name is empty.
    #[error("service name must not be empty")]
    EmptyName,

    /// A declared dependency does not name an already-registered service.
    #[error("service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency {
        /// The service being registered.
        service: Arc<str>,
        /// The missing dependency name.
        dependency: Arc<str>,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use servisor::ConfigError;
    ///
    /// let err = ConfigError::EmptyName;
    /// assert_eq!(err.as_label(), "config_empty_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::DuplicateName { .. } => "config_duplicate_name",
            ConfigError::EmptyName => "config_empty_name",
            ConfigError::UnknownDependency { .. } => "config_unknown_dependency",
        }
    }
}

/// # Error produced by a lifecycle hook.
///
/// Carries the message describing why the hook rejected. The state machine
/// captures it as the service's failure reason and reports it exactly once;
/// it is never rethrown to whoever requested the transition.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HookError {
    message: Arc<str>,
}

impl HookError {
    /// Creates a hook error from a message.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a hook error from any error value.
    pub fn from_err(error: impl std::error::Error) -> Self {
        Self {
            message: error.to_string().into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &Arc<str> {
        &self.message
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// # Errors surfaced to callers of guarded methods and service handles.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallError {
    /// The method requires a call context and none was supplied.
    #[error("method '{method}' requires a call context")]
    MissingContext {
        /// The guarded method name.
        method: Arc<str>,
    },

    /// The method was invoked while the service was not `Ready`.
    ///
    /// `cause` carries the failure that made the service non-ready, when the
    /// non-readiness is itself the consequence of an error.
    #[error("method '{method}' invalid in state '{state}'{}", fmt_cause(.cause))]
    InvalidState {
        /// The guarded method name (or `critical_failure` for the handle op).
        method: Arc<str>,
        /// The state observed at call time.
        state: ServiceState,
        /// The failure reason behind the non-readiness, if any.
        cause: Option<Arc<str>>,
    },

    /// The wrapped implementation failed; rethrown unchanged after
    /// classification and reporting.
    #[error(transparent)]
    Operation(OpError),
}

impl CallError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallError::MissingContext { .. } => "call_missing_context",
            CallError::InvalidState { .. } => "call_invalid_state",
            CallError::Operation(_) => "call_operation_failed",
        }
    }

    /// The underlying operation error, if this is an `Operation` variant.
    pub fn into_operation(self) -> Option<OpError> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

fn fmt_cause(cause: &Option<Arc<str>>) -> String {
    match cause {
        Some(c) => format!(": {c}"),
        None => String::new(),
    }
}

/// # Errors produced by the node supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NodeError {
    /// Dispose grace period was exceeded; some services never reached
    /// `Disposed`.
    #[error("dispose grace {grace:?} exceeded; stuck: {stuck:?}")]
    DisposeGraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of services that did not dispose in time.
        stuck: Vec<Arc<str>>,
    },
}

impl NodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeError::DisposeGraceExceeded { .. } => "node_dispose_grace_exceeded",
        }
    }
}
