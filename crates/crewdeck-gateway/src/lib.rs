//! HTTP surface and streaming transport for the orchestration core.
//!
//! Exposes the dispatch, analysis, state, and lifecycle-action endpoints,
//! plus the server-push event stream every dashboard viewer hangs off.
//! The external worker-process spawner is reached only through the narrow
//! [`Launcher`] seam.

/// Error-to-response mapping.
pub mod error;
/// The external process-launcher contract.
pub mod launcher;
/// Router construction and request handlers.
pub mod server;
/// The per-viewer SSE stream.
pub mod stream;

pub use error::{ApiError, ApiResult};
pub use launcher::{Launcher, NullLauncher};
pub use server::{GatewayConfig, GatewayServer};
