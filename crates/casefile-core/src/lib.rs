//! Casefile Core Library
//!
//! This crate provides the domain models, error types, configuration and constants
//! shared by every stage of the bulk upload pipeline: manifest ingest, per-patient
//! transfer into permanent storage, and report generation.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in casefile-storage
