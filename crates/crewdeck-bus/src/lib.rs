//! In-process publish/subscribe hub for dashboard events.
//!
//! The bus is a process-wide singleton constructed once and passed by
//! `Arc` handle to every producer and to the streaming transport. It keeps
//! a bounded ring buffer of recent events per topic so that a viewer
//! connecting late can replay what it missed.
//!
//! # Main types
//!
//! - [`EventBus`] — The hub: subscribe, publish, replay.
//! - [`Event`] — An immutable `{topic, data, timestamp}` record.
//! - [`Topic`] — The closed set of event categories.
//! - [`TopicFilter`] — A connection's topic interest set (empty == all).

/// Event and topic types.
pub mod event;

mod bus;

pub use bus::{DeliveryError, EventBus, SubscriptionId};
pub use event::{Event, Topic, TopicFilter};
