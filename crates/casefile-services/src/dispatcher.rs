//! Fan-out dispatcher
//!
//! One ordered-queue message per patient. All messages of one run share a
//! message group id, so they are delivered in send order; nothing orders
//! messages across runs. The deduplication id is derived from the message
//! body, so resending the same patient set after an aborted run is dropped by
//! the queue while its deduplication window is open.

use std::sync::Arc;

use casefile_core::constants::{DEDUPLICATION_ID_NAMESPACE, MESSAGE_GROUP_PREFIX, NHS_NUMBER_ATTRIBUTE};
use casefile_core::models::StagingMetadata;
use casefile_core::AppError;
use casefile_worker::{OutgoingMessage, QueueError, QueueSender};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to serialize staging metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to dispatch patient {nhs_number}: {error}")]
    Queue {
        nhs_number: String,
        #[source]
        error: QueueError,
    },
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Serialize(e) => AppError::Internal(e.to_string()),
            DispatchError::Queue { .. } => AppError::Queue(err.to_string()),
        }
    }
}

/// Result of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub group_id: String,
    pub messages_sent: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<dyn QueueSender>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn QueueSender>) -> Self {
        Self { sender }
    }

    pub fn new_group_id() -> String {
        format!("{}{}", MESSAGE_GROUP_PREFIX, Uuid::new_v4())
    }

    pub fn deduplication_id(body: &str) -> String {
        Uuid::new_v5(&DEDUPLICATION_ID_NAMESPACE, body.as_bytes()).to_string()
    }

    /// Sends one message per patient under a fresh group id. Stops at the first
    /// failed send.
    #[tracing::instrument(skip(self, patients), fields(patients = patients.len()))]
    pub async fn dispatch(&self, patients: &[StagingMetadata]) -> Result<DispatchReceipt, DispatchError> {
        let group_id = Self::new_group_id();

        for staging in patients {
            let body = serde_json::to_string(staging)?;
            let deduplication_id = Self::deduplication_id(&body);
            let message = OutgoingMessage::new(body, group_id.clone(), deduplication_id)
                .with_attribute(NHS_NUMBER_ATTRIBUTE, staging.nhs_number.clone());

            let message_id = self
                .sender
                .send(message)
                .await
                .map_err(|error| DispatchError::Queue {
                    nhs_number: staging.nhs_number.clone(),
                    error,
                })?;

            tracing::debug!(
                nhs_number = %staging.nhs_number,
                group_id = %group_id,
                message_id = %message_id,
                files = staging.files.len(),
                "Patient dispatched"
            );
        }

        tracing::info!(group_id = %group_id, messages_sent = patients.len(), "Dispatch run complete");
        Ok(DispatchReceipt {
            group_id,
            messages_sent: patients.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{file_metadata, lloyd_george_path, MockQueue};

    fn patient(nhs: &str) -> StagingMetadata {
        StagingMetadata::new(
            nhs,
            vec![file_metadata(&lloyd_george_path(1, 1, "Jane Smith", nhs), nhs, "Y12345")],
        )
    }

    #[tokio::test]
    async fn one_message_per_patient_sharing_a_group() {
        let queue = Arc::new(MockQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());

        let receipt = dispatcher
            .dispatch(&[patient("1234567890"), patient("9876543210")])
            .await
            .unwrap();

        let sent = queue.sent();
        assert_eq!(receipt.messages_sent, 2);
        assert!(receipt.group_id.starts_with("bulk_upload_"));
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.group_id == receipt.group_id));
        assert_ne!(sent[0].deduplication_id, sent[1].deduplication_id);
        assert_eq!(sent[0].attributes[NHS_NUMBER_ATTRIBUTE], "1234567890");

        let body: StagingMetadata = serde_json::from_str(&sent[1].body).unwrap();
        assert_eq!(body, patient("9876543210"));
    }

    #[tokio::test]
    async fn each_run_gets_its_own_group() {
        let queue = Arc::new(MockQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let first = dispatcher.dispatch(&[patient("1234567890")]).await.unwrap();
        let second = dispatcher.dispatch(&[patient("1234567890")]).await.unwrap();
        assert_ne!(first.group_id, second.group_id);
    }

    #[tokio::test]
    async fn resent_patient_keeps_its_deduplication_id() {
        let queue = Arc::new(MockQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        dispatcher.dispatch(&[patient("1234567890")]).await.unwrap();
        dispatcher
            .dispatch(&[patient("1234567890"), patient("9876543210")])
            .await
            .unwrap();

        let sent = queue.sent();
        assert_eq!(sent[0].deduplication_id, sent[1].deduplication_id);
        assert_ne!(sent[1].deduplication_id, sent[2].deduplication_id);
    }

    #[tokio::test]
    async fn send_failure_names_the_patient() {
        let queue = Arc::new(MockQueue::failing_after(1));
        let dispatcher = Dispatcher::new(queue.clone());
        let err = dispatcher
            .dispatch(&[patient("1234567890"), patient("9876543210")])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Queue { ref nhs_number, .. } if nhs_number == "9876543210"));
        assert_eq!(queue.sent().len(), 1);
    }
}
