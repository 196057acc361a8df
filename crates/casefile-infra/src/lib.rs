//! Casefile Infrastructure Library
//!
//! Shared process-level setup used by every pipeline entry point. Today that is
//! telemetry initialisation.

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
