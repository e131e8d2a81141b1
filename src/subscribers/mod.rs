//! Event subscribers: trait, fan-out set, and the built-in log writer.
//!
//! ## Contents
//! - [`Subscribe`] the subscriber contract (bounded queue, isolated worker)
//! - [`SubscriberSet`] non-blocking fan-out used by the node listener
//! - [`LogWriter`] tracing-backed reference subscriber (feature `logging`)

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
