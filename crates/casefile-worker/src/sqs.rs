use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_sqs::types::{Message, MessageAttributeValue, MessageSystemAttributeName};
use aws_sdk_sqs::Client;

use crate::error::QueueError;
use crate::message::{OutgoingMessage, QueueReceiver, QueueSender, ReceivedMessage};

/// SQS has a hard ceiling of ten messages per receive call.
const MAX_RECEIVE_BATCH: i32 = 10;

/// FIFO queue client bound to one queue URL.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Create a new SqsQueue
    ///
    /// # Arguments
    /// * `region` - AWS region; falls back to the default provider chain when absent
    /// * `endpoint_url` - Optional custom endpoint (e.g. "http://localhost:4566" for LocalStack)
    /// * `queue_url` - URL of the FIFO queue
    pub async fn new(
        region: Option<String>,
        endpoint_url: Option<String>,
        queue_url: String,
    ) -> Result<Self, QueueError> {
        if queue_url.trim().is_empty() {
            return Err(QueueError::Config("Queue URL is empty".to_string()));
        }

        let region_provider =
            RegionProviderChain::first_try(region.map(aws_config::Region::new)).or_default_provider();

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config)
            .load()
            .await;

        let client = match endpoint_url {
            Some(endpoint) => {
                let sqs_config = aws_sdk_sqs::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .build();
                Client::from_conf(sqs_config)
            }
            None => Client::new(&config),
        };

        Ok(Self { client, queue_url })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    fn to_received(message: &Message) -> Option<ReceivedMessage> {
        let receipt_handle = message.receipt_handle()?.to_string();

        let receive_count = message
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        let attributes: HashMap<String, String> = message
            .message_attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .string_value()
                            .map(|v| (name.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(ReceivedMessage {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle,
            body: message.body().unwrap_or_default().to_string(),
            receive_count,
            attributes,
        })
    }
}

#[async_trait]
impl QueueSender for SqsQueue {
    #[tracing::instrument(skip(self, message), fields(queue.group_id = %message.group_id))]
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.body)
            .message_group_id(message.group_id)
            .message_deduplication_id(message.deduplication_id);

        for (name, value) in message.attributes {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| QueueError::InvalidMessage(e.to_string()))?;
            request = request.message_attributes(name, attribute);
        }

        let output = request.send().await.map_err(|e| {
            tracing::error!(error = %e, queue_url = %self.queue_url, "SQS send_message failed");
            QueueError::Send(e.to_string())
        })?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl QueueReceiver for SqsQueue {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, MAX_RECEIVE_BATCH))
            .wait_time_seconds(wait_time_seconds)
            .visibility_timeout(visibility_timeout_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|message| {
                let received = Self::to_received(message);
                if received.is_none() {
                    tracing::warn!(
                        message_id = ?message.message_id(),
                        "Received message without receipt handle, skipping"
                    );
                }
                received
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.to_string()))?;
        Ok(())
    }
}
