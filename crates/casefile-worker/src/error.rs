use casefile_core::AppError;
use thiserror::Error;

/// Ordered queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to receive messages: {0}")]
    Receive(String),

    #[error("Failed to delete message: {0}")]
    Delete(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Queue configuration error: {0}")]
    Config(String),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Config(message) => AppError::Configuration(message),
            QueueError::InvalidMessage(message) => AppError::InvalidInput(message),
            other => AppError::Queue(other.to_string()),
        }
    }
}
