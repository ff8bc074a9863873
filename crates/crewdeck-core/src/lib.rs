//! Core types and error definitions for the Crewdeck orchestration core.
//!
//! This crate provides the foundational types shared across all Crewdeck
//! crates: the unified error enum, the fixed agent roster, and the registry
//! that every other component uses as the authority for agent validity.
//!
//! # Main types
//!
//! - [`CrewdeckError`] — Unified error enum for all Crewdeck subsystems.
//! - [`CrewdeckResult`] — Convenience alias for `Result<T, CrewdeckError>`.
//! - [`AgentId`] — Closed set of worker agent identifiers.
//! - [`Agent`] — Immutable descriptor for a roster entry.
//! - [`Registry`] — Read-only lookup over the static roster.

/// Static agent roster and registry.
pub mod agent;

pub use agent::{Agent, AgentId, Registry};

// --- Error types ---

/// Top-level error type for the Crewdeck orchestration core.
///
/// Each variant corresponds to a failure class the request layer needs to
/// distinguish when mapping to a response.
#[derive(Debug, thiserror::Error)]
pub enum CrewdeckError {
    /// Bad, missing, or out-of-range input, with a field-level reason.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A lookup for an agent or session that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An action that is not valid for the entity's current status.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// A failure reported by the external process launcher.
    #[error("Launcher error: {0}")]
    Launcher(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CrewdeckError`].
pub type CrewdeckResult<T> = Result<T, CrewdeckError>;
