use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::kernel::event::BehaviorEvent;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("collector rejected batch with status {status}")]
    Rejected { status: u16 },
    #[error("delivery unavailable: {0}")]
    Unavailable(String),
}

/// Sink for a batch of events. Any `Err` counts as a failed delivery.
pub trait Transport: Send + Sync + 'static {
    fn deliver(
        &self,
        batch: &[BehaviorEvent],
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Serialize)]
struct BatchBody<'a> {
    events: &'a [BehaviorEvent],
}

/// POSTs `{"events": [...]}` to the ingestion endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// Reuse a client that already carries the session cookie/credentials.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Transport for HttpTransport {
    async fn deliver(&self, batch: &[BehaviorEvent]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&BatchBody { events: batch })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
