//! Casefile Storage Library
//!
//! This crate provides the object store abstraction used by the pipeline and its
//! implementations for S3 and the local filesystem.
//!
//! # Buckets and keys
//!
//! Every operation names its bucket explicitly: the pipeline moves objects between
//! a staging store and a permanent store, so a single-bucket handle is not enough.
//! Keys must not contain `..` or a leading `/`. Key layouts for permanent documents,
//! archived manifests and reports live in the `keys` module so every caller agrees.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use casefile_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
