//! Per-patient bulk upload handler
//!
//! Consumes one dispatched `StagingMetadata`. Patient-scoped failures end in a
//! `failed` audit row and an acknowledged message; infrastructure errors are
//! returned so the message is redelivered. A set whose documents are all
//! committed already skips the scan gate, so a redelivery after a commit
//! whose audit write failed still ends in a `complete` row.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use casefile_core::constants::NHS_NUMBER_ATTRIBUTE;
use casefile_core::models::{StagingMetadata, UploadReportEntry};
use casefile_core::AppError;
use casefile_db::UploadReportRepositoryTrait;
use casefile_processing::validate_file_set;
use casefile_worker::{HandlerOutcome, MessageHandler, ReceivedMessage};
use chrono::Utc;

use crate::patient_directory::PatientDirectory;
use crate::transaction::TransactionalMover;
use crate::virus_scan::{GateError, VirusScanGate};

#[derive(Clone)]
pub struct BulkUploadHandler {
    reports: Arc<dyn UploadReportRepositoryTrait>,
    directory: Arc<dyn PatientDirectory>,
    gate: VirusScanGate,
    mover: TransactionalMover,
    virus_scan_max_attempts: u32,
}

impl BulkUploadHandler {
    pub fn new(
        reports: Arc<dyn UploadReportRepositoryTrait>,
        directory: Arc<dyn PatientDirectory>,
        gate: VirusScanGate,
        mover: TransactionalMover,
        virus_scan_max_attempts: u32,
    ) -> Self {
        Self {
            reports,
            directory,
            gate,
            mover,
            virus_scan_max_attempts,
        }
    }

    /// Runs one patient through validation, practice lookup, the scan gate and
    /// the move. `receive_count` is how many times this set has been delivered.
    #[tracing::instrument(skip(self, staging), fields(nhs_number = %staging.nhs_number, files = staging.files.len()))]
    pub async fn handle(
        &self,
        staging: &StagingMetadata,
        receive_count: u32,
    ) -> Result<HandlerOutcome, AppError> {
        let uploader_ods_code = staging.uploader_ods_code();

        if let Err(e) = validate_file_set(&staging.nhs_number, &staging.files) {
            tracing::warn!(error = %e, "File set failed validation");
            self.record_failure(staging, None, e.to_string()).await?;
            return Ok(HandlerOutcome::Ack);
        }

        let pds_ods_code = self
            .directory
            .current_gp_ods(&staging.nhs_number, uploader_ods_code)
            .await?;

        if self.mover.is_committed(staging).await? {
            tracing::info!("Set already committed, skipping scan gate");
        } else {
            match self.gate.admit(&staging.files).await {
                Ok(()) => {}
                Err(GateError::Storage(e)) => return Err(AppError::Storage(e.to_string())),
                Err(GateError::Rejected(rejection)) => {
                    if rejection.is_transient() && receive_count < self.virus_scan_max_attempts {
                        tracing::info!(
                            receive_count = receive_count,
                            max_attempts = self.virus_scan_max_attempts,
                            "Scan verdict not yet available, leaving set for redelivery"
                        );
                        return Ok(HandlerOutcome::Retry);
                    }
                    self.record_failure(staging, Some(&pds_ods_code), rejection.to_string())
                        .await?;
                    return Ok(HandlerOutcome::Ack);
                }
            }
        }

        match self.mover.transfer(staging, &pds_ods_code).await {
            Ok(references) => {
                let entry = UploadReportEntry::complete(staging, &pds_ods_code, Utc::now());
                self.reports.append(&entry).await?;
                tracing::info!(
                    documents = references.len(),
                    pds_ods_code = %pds_ods_code,
                    "Patient upload complete"
                );
            }
            Err(e) => {
                self.record_failure(staging, Some(&pds_ods_code), e.to_string())
                    .await?;
            }
        }
        Ok(HandlerOutcome::Ack)
    }

    async fn record_failure(
        &self,
        staging: &StagingMetadata,
        pds_ods_code: Option<&str>,
        reason: String,
    ) -> Result<(), AppError> {
        let entry = UploadReportEntry::failed(
            &staging.nhs_number,
            &staging.files,
            staging.uploader_ods_code(),
            pds_ods_code,
            reason,
            Utc::now(),
        );
        self.reports.append(&entry).await
    }
}

#[async_trait]
impl MessageHandler for BulkUploadHandler {
    async fn handle_message(self: Arc<Self>, message: &ReceivedMessage) -> anyhow::Result<HandlerOutcome> {
        let staging: StagingMetadata = serde_json::from_str(&message.body)
            .map_err(AppError::from)
            .context("Message body is not staging metadata")?;

        if let Some(tagged) = message.attribute(NHS_NUMBER_ATTRIBUTE) {
            if tagged != staging.nhs_number {
                tracing::warn!(
                    tagged = %tagged,
                    nhs_number = %staging.nhs_number,
                    "Message attribute does not match body"
                );
            }
        }

        Ok(self.handle(&staging, message.receive_count).await?)
    }
}
