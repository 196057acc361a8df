//! Queue consumer: worker pool, long polling, acknowledgement.
//!
//! Shutdown: [`QueueConsumer::shutdown`] signals the pool to stop receiving; it
//! does not wait for in-flight handlers. Messages received but not acknowledged
//! become visible again after their visibility timeout.

use anyhow::Result;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use casefile_core::{AppError, Config, ErrorMetadata};

use crate::context::{HandlerOutcome, MessageHandler};
use crate::message::{QueueReceiver, ReceivedMessage};

#[derive(Clone, Debug)]
pub struct QueueConsumerConfig {
    pub max_workers: usize,
    pub wait_time_seconds: i32,
    pub visibility_timeout_seconds: i32,
    /// Pause after a failed receive or while every worker is busy.
    pub backoff_ms: u64,
}

impl Default for QueueConsumerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 300,
            backoff_ms: 1000,
        }
    }
}

impl QueueConsumerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.queue_max_workers(),
            wait_time_seconds: config.queue_wait_time_seconds(),
            visibility_timeout_seconds: config.queue_visibility_timeout_seconds(),
            ..Self::default()
        }
    }
}

pub struct QueueConsumer {
    config: QueueConsumerConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl QueueConsumer {
    /// Start the worker pool. Each received message is handled on its own task,
    /// at most `max_workers` at a time.
    pub fn new(
        receiver: Arc<dyn QueueReceiver>,
        config: QueueConsumerConfig,
        handler: Weak<dyn MessageHandler>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let config_clone = config.clone();
        tokio::spawn(async move {
            Self::worker_pool(receiver, config_clone, handler, shutdown_rx).await;
        });

        Self {
            config,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &QueueConsumerConfig {
        &self.config
    }

    async fn worker_pool(
        receiver: Arc<dyn QueueReceiver>,
        config: QueueConsumerConfig,
        handler: Weak<dyn MessageHandler>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            wait_time_seconds = config.wait_time_seconds,
            visibility_timeout_seconds = config.visibility_timeout_seconds,
            "Queue consumer worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Queue consumer worker pool shutting down");
                    break;
                }
                _ = Self::receive_and_dispatch(&receiver, &config, &semaphore, &handler) => {}
            }
        }

        tracing::info!("Queue consumer worker pool stopped");
    }

    async fn receive_and_dispatch(
        receiver: &Arc<dyn QueueReceiver>,
        config: &QueueConsumerConfig,
        semaphore: &Arc<Semaphore>,
        handler: &Weak<dyn MessageHandler>,
    ) {
        let available = semaphore.available_permits();
        if available == 0 {
            tracing::trace!("No workers available, waiting before receive");
            sleep(Duration::from_millis(config.backoff_ms)).await;
            return;
        }

        let messages = match receiver
            .receive(
                available as i32,
                config.wait_time_seconds,
                config.visibility_timeout_seconds,
            )
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(error = %e, "Failed to receive messages from queue");
                sleep(Duration::from_millis(config.backoff_ms)).await;
                return;
            }
        };

        for message in messages {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(
                        message_id = %message.message_id,
                        "No worker free for received message, leaving it for redelivery"
                    );
                    continue;
                }
            };

            let receiver = receiver.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = Self::process_message(message, receiver, handler).await {
                    tracing::error!(error = %e, "Message processing failed");
                }
            });
        }
    }

    #[tracing::instrument(
        skip(message, receiver, handler),
        fields(message.id = %message.message_id, message.receive_count = message.receive_count)
    )]
    async fn process_message(
        message: ReceivedMessage,
        receiver: Arc<dyn QueueReceiver>,
        handler: Weak<dyn MessageHandler>,
    ) -> Result<()> {
        let handler = handler
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("MessageHandler was dropped, cannot process message"))?;

        let start = Instant::now();
        let result = handler.handle_message(&message).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(HandlerOutcome::Ack) => {
                receiver.delete(&message.receipt_handle).await?;
                tracing::info!(duration_ms = duration_ms, "Message handled and acknowledged");
                Ok(())
            }
            Ok(HandlerOutcome::Retry) => {
                tracing::info!(
                    duration_ms = duration_ms,
                    "Message left for redelivery"
                );
                Ok(())
            }
            Err(e) => {
                let is_unrecoverable = e
                    .downcast_ref::<AppError>()
                    .map(|app_error| !app_error.is_recoverable())
                    .unwrap_or(false);

                tracing::error!(
                    error = %e,
                    duration_ms = duration_ms,
                    unrecoverable = is_unrecoverable,
                    "Message handling failed"
                );

                // Redelivery cannot fix an unrecoverable error
                if is_unrecoverable {
                    receiver.delete(&message.receipt_handle).await?;
                    tracing::error!("Message failed with unrecoverable error, acknowledged without retry");
                }
                Ok(())
            }
        }
    }

    /// Signals the worker pool to stop receiving. Returns immediately; in-flight
    /// handlers keep running until they finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating queue consumer shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
