//! NATS-backed [`AsyncQueue`]. Unlike a best-effort telemetry sink, a
//! publish failure here must reach the caller: the client is waiting on a
//! 202, and a silently dropped invocation is a lost request, not a lost
//! metric.

use async_trait::async_trait;

use crate::error::api::ApiError;
use crate::queue::{AsyncQueue, QueueMessage};

#[derive(Clone)]
pub struct NatsQueue {
    client: async_nats::Client,
    subject: String,
}

impl NatsQueue {
    /// Connects to `address:port` and publishes to `subject` (the
    /// configured `faas_nats_channel`).
    pub async fn connect(
        address: &str,
        port: u16,
        subject: impl Into<String>,
    ) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(format!("{address}:{port}")).await?;
        Ok(Self {
            client,
            subject: subject.into(),
        })
    }

    #[must_use]
    pub fn from_client(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl AsyncQueue for NatsQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), ApiError> {
        let payload = serde_json::to_vec(&message)
            .map_err(|error| ApiError::EnqueueFailed(error.to_string()))?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|error| ApiError::EnqueueFailed(error.to_string()))?;

        self.client
            .flush()
            .await
            .map_err(|error| ApiError::EnqueueFailed(error.to_string()))
    }
}
