//! CloudFormation custom-resource lifecycle events.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle phase that triggered the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
        }
    }

    /// Create and Update wait for nested stacks and may file a tracker issue.
    pub fn is_provisioning(&self) -> bool {
        matches!(self, RequestType::Create | RequestType::Update)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(RequestType::Create),
            "Update" => Ok(RequestType::Update),
            "Delete" => Ok(RequestType::Delete),
            other => Err(EventError::UnknownRequestType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed custom resource request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown request type '{0}'")]
    UnknownRequestType(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRequest {
    request_type: String,
    request_id: String,
    #[serde(rename = "ResponseURL")]
    response_url: String,
    stack_id: String,
    logical_resource_id: String,
    #[serde(default)]
    physical_resource_id: Option<String>,
}

/// Where a status report goes and the identifiers it echoes back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseTarget {
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
}

impl ResponseTarget {
    /// Best-effort read of the reply fields of a request that could not be
    /// parsed as a [`LifecycleEvent`]. `None` without a response URL.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let target: Self = serde_json::from_value(raw.clone()).ok()?;
        (!target.response_url.is_empty()).then_some(target)
    }
}

/// One custom-resource request, as delivered by the orchestrator.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    kind: RequestType,
    target: ResponseTarget,
    raw: Value,
}

impl LifecycleEvent {
    pub fn from_value(raw: Value) -> Result<Self, EventError> {
        let request: RawRequest = serde_json::from_value(raw.clone())?;
        Ok(Self {
            kind: request.request_type.parse()?,
            target: ResponseTarget {
                response_url: request.response_url,
                stack_id: request.stack_id,
                request_id: request.request_id,
                logical_resource_id: request.logical_resource_id,
                physical_resource_id: request.physical_resource_id,
            },
            raw,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn kind(&self) -> RequestType {
        self.kind
    }

    pub fn target(&self) -> &ResponseTarget {
        &self.target
    }

    /// The orchestrator's request id.
    pub fn correlation_id(&self) -> &str {
        &self.target.request_id
    }

    /// Pre-signed URL the status report is sent to.
    pub fn response_url(&self) -> &str {
        &self.target.response_url
    }

    pub fn stack_id(&self) -> &str {
        &self.target.stack_id
    }

    pub fn logical_resource_id(&self) -> &str {
        &self.target.logical_resource_id
    }

    pub fn physical_resource_id(&self) -> Option<&str> {
        self.target.physical_resource_id.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
