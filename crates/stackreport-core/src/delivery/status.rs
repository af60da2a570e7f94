//! Custom resource status reports.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::TransportError;
use crate::event::ResponseTarget;

/// Response documents above 4 KiB are rejected by CloudFormation.
const MAX_REASON_CHARS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// The terminal report of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub data: Map<String, Value>,
}

impl StatusReport {
    pub fn success(physical_resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: reason.into(),
            physical_resource_id: physical_resource_id.into(),
            data: Map::new(),
        }
    }

    pub fn failed(physical_resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            reason: reason.into(),
            physical_resource_id: physical_resource_id.into(),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("response URL rejected status report with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize status report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, target: &ResponseTarget, report: &StatusReport)
    -> Result<(), ReportError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseDocument<'a> {
    status: ResponseStatus,
    reason: String,
    physical_resource_id: &'a str,
    stack_id: &'a str,
    request_id: &'a str,
    logical_resource_id: &'a str,
    no_echo: bool,
    data: &'a Map<String, Value>,
}

/// Build the JSON document CloudFormation expects at the response URL.
pub fn response_document(
    target: &ResponseTarget,
    report: &StatusReport,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ResponseDocument {
        status: report.status,
        reason: truncate(&report.reason, MAX_REASON_CHARS),
        physical_resource_id: &report.physical_resource_id,
        stack_id: &target.stack_id,
        request_id: &target.request_id,
        logical_resource_id: &target.logical_resource_id,
        no_echo: false,
        data: &report.data,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// PUTs status reports to the pre-signed response URL of the event.
#[derive(Debug, Clone)]
pub struct CloudFormationResponder {
    client: reqwest::Client,
}

impl CloudFormationResponder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusReporter for CloudFormationResponder {
    async fn report(
        &self,
        target: &ResponseTarget,
        report: &StatusReport,
    ) -> Result<(), ReportError> {
        let body = response_document(target, report)?;
        debug!("Response body - {}", body);

        // The URL is pre-signed without a content type.
        let response = self
            .client
            .put(target.response_url.as_str())
            .header(CONTENT_TYPE, HeaderValue::from_static(""))
            .body(body)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = ?report.status, "Status report sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> ResponseTarget {
        ResponseTarget::from_raw(&json!({
            "RequestType": "Create",
            "RequestId": "req-1",
            "ResponseURL": "https://example.com/response",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/demo/abc",
            "LogicalResourceId": "Reporter"
        }))
        .unwrap()
    }

    #[test]
    fn document_carries_event_identifiers() {
        let report = StatusReport::success("log-stream", "ok").with_data("statusCode", 200);
        let doc: Value = serde_json::from_str(&response_document(&target(), &report).unwrap()).unwrap();

        assert_eq!(doc["Status"], "SUCCESS");
        assert_eq!(doc["RequestId"], "req-1");
        assert_eq!(doc["LogicalResourceId"], "Reporter");
        assert_eq!(doc["PhysicalResourceId"], "log-stream");
        assert_eq!(doc["NoEcho"], false);
        assert_eq!(doc["Data"]["statusCode"], 200);
    }

    #[test]
    fn long_reasons_are_truncated() {
        let report = StatusReport::failed("id", "é".repeat(2000));
        let doc: Value = serde_json::from_str(&response_document(&target(), &report).unwrap()).unwrap();

        assert_eq!(doc["Status"], "FAILED");
        assert_eq!(doc["Reason"].as_str().unwrap().chars().count(), MAX_REASON_CHARS);
    }
}
