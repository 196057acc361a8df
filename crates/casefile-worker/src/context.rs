//! Message handler trait
//!
//! The services layer implements this for the per-patient bulk upload handler.
//! The consumer holds a weak reference and calls `handle_message` for every
//! message it receives.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::message::ReceivedMessage;

/// What the consumer does with a message once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Work is finished (successfully or with a recorded failure): delete the message.
    Ack,
    /// Leave the message for redelivery after its visibility timeout.
    Retry,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one delivery. An `Err` leaves the message for redelivery unless it
    /// carries an unrecoverable `AppError`.
    async fn handle_message(self: Arc<Self>, message: &ReceivedMessage) -> Result<HandlerOutcome>;
}

/// Placeholder handler used before the real one exists. Handling always errors.
struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn handle_message(self: Arc<Self>, _message: &ReceivedMessage) -> Result<HandlerOutcome> {
        Err(anyhow!("NoopHandler: no message handler available"))
    }
}

/// Returns a weak reference to a no-op handler.
pub fn empty_handler_weak() -> Weak<dyn MessageHandler> {
    let n: Arc<dyn MessageHandler> = Arc::new(NoopHandler);
    Arc::downgrade(&n)
}
