//! Jira Cloud REST client.
//!
//! Only the calls needed for an upsert: project lookup, issue search by
//! summary, issue create and issue update.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::{IssueDraft, IssueTracker, TrackerError, UpsertOutcome};
use crate::config::TrackerSettings;
use crate::delivery::TransportError;

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    issues: Vec<IssueRef>,
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    settings: TrackerSettings,
}

impl JiraClient {
    pub fn new(client: reqwest::Client, settings: TrackerSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self, path: &str) -> Result<Url, TrackerError> {
        self.settings
            .cloud_url
            .join(path)
            .map_err(|e| TrackerError::Decode(format!("invalid Jira URL for {}: {}", path, e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, TrackerError> {
        let response = request
            .basic_auth(&self.settings.auth_email, Some(&self.settings.api_token))
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;
        if !status.is_success() {
            return Err(TrackerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| TrackerError::Decode(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Result<T, TrackerError> {
        let value = value.ok_or_else(|| TrackerError::Decode("empty response".to_string()))?;
        serde_json::from_value(value).map_err(|e| TrackerError::Decode(e.to_string()))
    }

    /// Id of the configured project.
    pub async fn project_id(&self) -> Result<String, TrackerError> {
        let key = &self.settings.project_key;
        let url = self.endpoint(&format!("rest/api/2/project/{}", key))?;
        match self.send(self.client.get(url)).await {
            Ok(value) => Ok(Self::decode::<Project>(value)?.id),
            Err(TrackerError::Rejected { status: 404, .. }) => {
                Err(TrackerError::ProjectNotFound(key.clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// Key of an existing issue with exactly this summary.
    pub async fn find_issue(&self, summary: &str) -> Result<Option<String>, TrackerError> {
        let jql = format!(
            "project = \"{}\" AND summary ~ \"{}\" ORDER BY created DESC",
            escape_jql(&self.settings.project_key),
            escape_jql(summary)
        );
        let url = self.endpoint("rest/api/2/search/jql")?;
        let request = self.client.post(url).json(&json!({
            "jql": jql,
            "fields": ["summary"],
            "maxResults": 50,
        }));
        let results: SearchResults = Self::decode(self.send(request).await?)?;

        Ok(results
            .issues
            .into_iter()
            .find(|issue| issue.fields.summary == summary)
            .map(|issue| issue.key))
    }

    async fn create_issue(&self, project_id: &str, draft: &IssueDraft) -> Result<String, TrackerError> {
        let url = self.endpoint("rest/api/2/issue")?;
        let request = self.client.post(url).json(&json!({
            "fields": {
                "project": { "id": project_id },
                "summary": draft.summary,
                "description": draft.description,
                "issuetype": { "name": draft.issue_type },
                "labels": draft.labels,
            }
        }));
        let created: IssueRef = Self::decode(self.send(request).await?)?;
        Ok(created.key)
    }

    async fn update_issue(&self, key: &str, draft: &IssueDraft) -> Result<(), TrackerError> {
        let url = self.endpoint(&format!("rest/api/2/issue/{}", key))?;
        let request = self.client.put(url).json(&json!({
            "fields": {
                "description": draft.description,
                "labels": draft.labels,
            }
        }));
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn upsert_issue(&self, draft: &IssueDraft) -> Result<UpsertOutcome, TrackerError> {
        let project_id = self.project_id().await?;
        debug!(project = %self.settings.project_key, "Jira issue summary: {}", draft.summary);

        match self.find_issue(&draft.summary).await? {
            Some(key) => {
                self.update_issue(&key, draft).await?;
                info!(%key, "Updated Jira issue");
                Ok(UpsertOutcome::Updated { key })
            }
            None => {
                let key = self.create_issue(&project_id, draft).await?;
                info!(%key, "Created Jira issue");
                Ok(UpsertOutcome::Created { key })
            }
        }
    }
}

fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
