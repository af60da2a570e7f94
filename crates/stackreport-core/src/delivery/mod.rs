//! Payload delivery and lifecycle status reporting.
//!
//! This module provides:
//!
//! - [`WebhookTransport`]: outbound HTTP seam, with a reqwest implementation in [`webhook`]
//! - [`DeliveryDispatcher`]: gated, bounded-retry webhook delivery
//! - [`StatusReporter`]: the single success/failure signal back to CloudFormation

pub mod dispatcher;
pub mod status;
pub mod webhook;

use async_trait::async_trait;
use url::Url;

pub use dispatcher::{DeliveryDispatcher, DeliveryTarget};
pub use status::{CloudFormationResponder, ReportError, ResponseStatus, StatusReport, StatusReporter};
pub use webhook::ReqwestTransport;

/// Status and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST a JSON document and return whatever the endpoint answered.
    async fn post_json(&self, url: &Url, body: &str) -> Result<HttpResponse, TransportError>;
}

/// Whatever the endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub http_status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery endpoint not configured: {reason}")]
    ConfigurationMissing { reason: String },

    #[error("delivery failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
