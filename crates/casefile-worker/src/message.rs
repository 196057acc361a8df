//! Queue message types and the transport traits

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::QueueError;

/// A message to publish onto an ordered queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    /// Messages sharing a group id are delivered in send order.
    pub group_id: String,
    pub deduplication_id: String,
    /// String attributes delivered alongside the body.
    pub attributes: BTreeMap<String, String>,
}

impl OutgoingMessage {
    pub fn new(
        body: impl Into<String>,
        group_id: impl Into<String>,
        deduplication_id: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            group_id: group_id.into(),
            deduplication_id: deduplication_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A message taken off the queue. It stays invisible to other consumers until
/// its visibility timeout lapses or it is deleted through `receipt_handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// How many times this message has been received, this delivery included.
    pub receive_count: u32,
    pub attributes: HashMap<String, String>,
}

impl ReceivedMessage {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Publishes messages onto an ordered queue.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Send one message; returns the queue-assigned message id.
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError>;
}

/// Receives and acknowledges messages.
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// Long-poll for up to `max_messages` messages.
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge a message so it is not delivered again.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
