//! Webhook delivery of the assembled payload.

use std::time::Duration;

use tracing::{debug, error, info, warn};
use url::Url;

use super::{DeliveryError, DeliveryOutcome, TransportError, WebhookTransport};
use crate::config::EndpointSettings;
use crate::payload::Payload;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// A validated webhook destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    url: Url,
}

impl DeliveryTarget {
    /// Check that the endpoint kind names an API/webhook endpoint and that
    /// the URL is an absolute http(s) URL.
    pub fn from_settings(endpoint: &EndpointSettings) -> Result<Self, DeliveryError> {
        let missing = |reason: &str| DeliveryError::ConfigurationMissing {
            reason: reason.to_string(),
        };

        let kind = endpoint
            .kind
            .as_deref()
            .ok_or_else(|| missing("ENDPOINT_TYPE is not set"))?;
        let raw_url = endpoint
            .url
            .as_deref()
            .ok_or_else(|| missing("ENDPOINT_URL is not set"))?;

        if !is_webhook_kind(kind) {
            return Err(missing(&format!("unsupported ENDPOINT_TYPE '{}'", kind)));
        }

        let url = Url::parse(raw_url)
            .map_err(|e| missing(&format!("invalid ENDPOINT_URL '{}': {}", raw_url, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(missing(&format!(
                "ENDPOINT_URL must be http(s), got '{}'",
                url.scheme()
            )));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn is_webhook_kind(kind: &str) -> bool {
    let kind = kind.to_ascii_uppercase();
    kind.contains("API") || kind == "WEBHOOK"
}

/// Sends a payload to the configured webhook.
pub struct DeliveryDispatcher<'a> {
    transport: &'a dyn WebhookTransport,
    endpoint: &'a EndpointSettings,
    max_attempts: u32,
}

impl<'a> DeliveryDispatcher<'a> {
    pub fn new(
        transport: &'a dyn WebhookTransport,
        endpoint: &'a EndpointSettings,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            endpoint,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Validate the endpoint, serialize and POST the payload.
    ///
    /// No request is made when the endpoint settings fail validation. Any
    /// HTTP answer counts as delivered; only transport errors fail.
    pub async fn deliver(&self, payload: &Payload) -> Result<DeliveryOutcome, DeliveryError> {
        let target = DeliveryTarget::from_settings(self.endpoint).inspect_err(|err| {
            error!("{}", err);
        })?;
        let body = payload.to_json()?;
        debug!(url = %target.url(), "HTTP POST request body - {}", body);

        let response = self.post_with_retry(target.url(), &body).await?;
        debug!(status = response.status, "HTTP API response - {}", response.body);

        if response.is_success() {
            info!(status = response.status, "Payload delivered");
        } else {
            warn!(status = response.status, "Endpoint answered with a non-success status");
        }
        Ok(DeliveryOutcome {
            http_status: response.status,
            body: response.body,
        })
    }

    async fn post_with_retry(
        &self,
        url: &Url,
        body: &str,
    ) -> Result<super::HttpResponse, DeliveryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.post_json(url, body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, "Delivery attempt failed, retrying: {}", err);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => return Err(self.give_up(attempt, err)),
            }
        }
    }

    fn give_up(&self, attempts: u32, err: TransportError) -> DeliveryError {
        error!(attempts, "Delivery failed: {}", err);
        if err.is_retryable() && attempts > 1 {
            DeliveryError::RetriesExhausted {
                attempts,
                source: err,
            }
        } else {
            DeliveryError::Transport(err)
        }
    }
}
