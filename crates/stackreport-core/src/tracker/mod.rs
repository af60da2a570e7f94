//! Issue tracker integration.

pub mod jira;

use async_trait::async_trait;

use crate::delivery::TransportError;
use crate::payload::Payload;

pub use jira::JiraClient;

pub const DEFAULT_ISSUE_TYPE: &str = "Task";

/// Issue content to create or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub labels: Vec<String>,
}

impl IssueDraft {
    /// One issue per stack and account; the description carries the payload.
    pub fn from_payload(payload: &Payload, labels: &[String]) -> serde_json::Result<Self> {
        Ok(Self {
            summary: format!(
                "Deployment report: {} ({})",
                stack_name(payload.stack_id()),
                payload.account_id()
            ),
            description: format!("{{code:json}}\n{}\n{{code}}", payload.to_json_pretty()?),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            labels: labels.to_vec(),
        })
    }
}

/// Name segment of a stack ARN, or the id itself when it is not an ARN.
pub fn stack_name(stack_id: &str) -> &str {
    stack_id
        .split_once(":stack/")
        .and_then(|(_, rest)| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(stack_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { key: String },
    Updated { key: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("project {0} does not exist")]
    ProjectNotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("tracker returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected tracker response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Update the issue with the same summary, or create one.
    async fn upsert_issue(&self, draft: &IssueDraft) -> Result<UpsertOutcome, TrackerError>;
}
