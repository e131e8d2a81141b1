//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by service actors, method
//! guards and the node supervisor.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Severity`] event classification and payload
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: service actors (state changes, errors, slow hooks,
//!   restarts), `MethodGuard` (call measurements), `Node` (settings,
//!   aggregate startup/disposal).
//! - **Consumers**: dependent service actors (dependency tracking), the node
//!   startup monitor, and whatever is attached via
//!   [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Severity};
