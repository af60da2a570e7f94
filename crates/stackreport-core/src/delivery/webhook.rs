//! reqwest-backed webhook transport.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{HttpResponse, TransportError, WebhookTransport};

pub const USER_AGENT: &str = concat!("stackreport/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post_json(&self, url: &Url, body: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
