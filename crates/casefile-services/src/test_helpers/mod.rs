//! Test helpers for service tests
//!
//! In-memory repositories and queue, a fault-injecting storage wrapper and
//! fixtures, so the pipeline can be exercised without Postgres or AWS. Object
//! storage itself is the real local backend on a temporary directory.

pub mod failing_storage;
pub mod fixtures;
pub mod mock_queue;
pub mod mock_repositories;

pub use failing_storage::FailingStorage;
pub use fixtures::*;
pub use mock_queue::MockQueue;
pub use mock_repositories::{
    FixedPatientDirectory, MockDocumentReferenceRepository, MockUploadReportRepository,
};
