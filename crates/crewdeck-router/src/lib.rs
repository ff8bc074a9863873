//! Keyword-based task routing.
//!
//! Classifies a free-text task description into a category, detects which
//! kinds of work it needs, and recommends the best-fit agent together with
//! an execution plan. Classification is a pure function of the text; the
//! router only adds a read-only availability snapshot on top — it never
//! mutates anything.
//!
//! # Main types
//!
//! - [`TaskRouter`] — Analyzes descriptions against the live state store.
//! - [`RoutingDecision`] — Recommended agent, confidence, and plan.
//! - [`classify`] — The pure text-classification step.
//! - [`TaskCategory`] / [`Need`] — The static rule tables.

/// Static category and need tables.
pub mod category;
/// Classification and the routing decision.
pub mod router;

pub use category::{categories, Complexity, Need, TaskCategory};
pub use router::{
    classify, Classification, ExecutionMode, RoutingDecision, Subtask, TaskRouter,
};
