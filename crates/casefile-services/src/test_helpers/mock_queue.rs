//! In-memory ordered queue

use async_trait::async_trait;
use casefile_worker::{OutgoingMessage, QueueError, QueueSender};
use std::sync::{Arc, Mutex};

/// Records every sent message; optionally fails once `fail_after` messages were accepted.
#[derive(Clone, Default)]
pub struct MockQueue {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    fail_after: Option<usize>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(accepted: usize) -> Self {
        Self {
            fail_after: Some(accepted),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueSender for MockQueue {
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(QueueError::Send("queue unavailable".to_string()));
        }
        sent.push(message);
        Ok(format!("message-{}", sent.len()))
    }
}
