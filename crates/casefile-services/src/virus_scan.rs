//! Virus-scan admission gate
//!
//! The antivirus scanner runs outside the pipeline and writes its verdict onto
//! each staged object as a tag. Before anything of a patient's set is moved,
//! every object's tag is read; the set is admitted only if every verdict is
//! `Clean`.

use std::sync::Arc;
use std::time::Instant;

use casefile_core::constants::VIRUS_SCAN_TAG_KEY;
use casefile_core::models::{FileMetadata, VirusScanVerdict};
use casefile_core::AppError;
use casefile_storage::{Storage, StorageError};
use thiserror::Error;

/// Why a set was refused. The display text is the audit failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VirusScanRejection {
    #[error("Virus scan detected infected content in {key} ({verdict})")]
    Infected { key: String, verdict: String },

    #[error("Virus scan failed for {key} ({verdict})")]
    ScanFailed { key: String, verdict: String },

    #[error("Virus scan result not available for {key}")]
    VerdictAbsent { key: String },

    #[error("File not found in staging store: {key}")]
    ObjectMissing { key: String },

    #[error("Staging key not accepted by the store: {key}")]
    InvalidKey { key: String },
}

impl VirusScanRejection {
    /// Only a missing verdict can change by waiting.
    pub fn is_transient(&self) -> bool {
        matches!(self, VirusScanRejection::VerdictAbsent { .. })
    }

    /// Lower ranks are reported first when a set has several rejections.
    fn rank(&self) -> u8 {
        match self {
            VirusScanRejection::Infected { .. } => 0,
            VirusScanRejection::ObjectMissing { .. } => 1,
            VirusScanRejection::InvalidKey { .. } => 2,
            VirusScanRejection::ScanFailed { .. } => 3,
            VirusScanRejection::VerdictAbsent { .. } => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Rejected(#[from] VirusScanRejection),

    #[error("Failed to read scan verdict: {0}")]
    Storage(StorageError),
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Rejected(rejection) => AppError::InvalidInput(rejection.to_string()),
            GateError::Storage(e) => AppError::Storage(e.to_string()),
        }
    }
}

/// Classifies one object's tag read.
fn classify(key: &str, tag: Result<Option<String>, StorageError>) -> Result<Option<VirusScanRejection>, StorageError> {
    let value = match tag {
        Ok(Some(value)) => value,
        Ok(None) => {
            return Ok(Some(VirusScanRejection::VerdictAbsent {
                key: key.to_string(),
            }))
        }
        Err(e) if e.is_not_found() => {
            return Ok(Some(VirusScanRejection::ObjectMissing {
                key: key.to_string(),
            }))
        }
        Err(StorageError::InvalidKey(reason)) => {
            tracing::warn!(key = %key, reason = %reason, "Staging key rejected by the store");
            return Ok(Some(VirusScanRejection::InvalidKey {
                key: key.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    // `FromStr` for verdicts cannot fail
    let verdict: VirusScanVerdict = value.parse().unwrap_or(VirusScanVerdict::Other(value));
    Ok(if verdict.is_clean() {
        None
    } else if verdict.is_infected() {
        Some(VirusScanRejection::Infected {
            key: key.to_string(),
            verdict: verdict.to_string(),
        })
    } else {
        Some(VirusScanRejection::ScanFailed {
            key: key.to_string(),
            verdict: verdict.to_string(),
        })
    })
}

#[derive(Clone)]
pub struct VirusScanGate {
    storage: Arc<dyn Storage>,
    staging_bucket: String,
}

impl VirusScanGate {
    pub fn new(storage: Arc<dyn Storage>, staging_bucket: impl Into<String>) -> Self {
        Self {
            storage,
            staging_bucket: staging_bucket.into(),
        }
    }

    /// Reads every verdict of the set, then admits it or returns the most
    /// serious rejection found. Storage failures other than a missing object or
    /// an unusable key are returned as `GateError::Storage`.
    #[tracing::instrument(skip(self, files), fields(gate.files = files.len()))]
    pub async fn admit(&self, files: &[FileMetadata]) -> Result<(), GateError> {
        let start = Instant::now();
        let mut worst: Option<VirusScanRejection> = None;

        for file in files {
            let key = file.staging_key();
            let tag = self
                .storage
                .get_tag(&self.staging_bucket, key, VIRUS_SCAN_TAG_KEY)
                .await;

            if let Some(rejection) = classify(key, tag).map_err(GateError::Storage)? {
                tracing::debug!(key = %key, rejection = %rejection, "Object not admitted");
                if worst.as_ref().map_or(true, |w| rejection.rank() < w.rank()) {
                    worst = Some(rejection);
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        match worst {
            None => {
                tracing::debug!(duration_ms = duration_ms, "Every object in the set is clean");
                Ok(())
            }
            Some(rejection) => {
                tracing::warn!(
                    duration_ms = duration_ms,
                    rejection = %rejection,
                    "Set refused by virus scan gate"
                );
                Err(GateError::Rejected(rejection))
            }
        }
    }
}
