//! Casefile Worker
//!
//! Transport for the per-patient fan-out: a sender that publishes one message per
//! patient onto an ordered queue, and a consumer pool that receives those
//! messages and hands each to a [`MessageHandler`].

pub mod consumer;
pub mod context;
pub mod error;
pub mod message;
pub mod sqs;

pub use consumer::{QueueConsumer, QueueConsumerConfig};
pub use context::{HandlerOutcome, MessageHandler};
pub use error::QueueError;
pub use message::{OutgoingMessage, QueueReceiver, QueueSender, ReceivedMessage};
pub use sqs::SqsQueue;
