//! Runtime state for agents and their in-flight sessions.
//!
//! The [`StateStore`] is the single writer for agent and session records.
//! Every mutation happens under one store-wide exclusive section and is
//! followed — strictly after the state change — by the matching events on
//! the bus, so a subscriber that reacts to an event by reading current
//! state never observes a stale status.
//!
//! # Main types
//!
//! - [`StateStore`] — Process-wide store for agent runtime state and sessions.
//! - [`AgentRuntimeState`] / [`AgentStatus`] — Mutable per-agent record.
//! - [`Session`] / [`SessionStatus`] — One in-flight unit of work.
//! - [`StateUpdate`] / [`SessionUpdate`] — Partial-update payloads.

/// Session records and aggregates.
pub mod session;
/// The agent state store.
pub mod store;

pub use session::{Session, SessionCounts, SessionStatus, SessionUpdate};
pub use store::{AgentRuntimeState, AgentStatus, StateStore, StateUpdate};
