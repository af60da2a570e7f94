//! Application context for unified dependency injection.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::api::{ContactApi, CostApi, OrganizationApi, ResourceApi};
use crate::aws::AwsClients;
use crate::config::Config;
use crate::delivery::webhook::http_client;
use crate::delivery::{CloudFormationResponder, ReqwestTransport, StatusReporter, WebhookTransport};
use crate::tracker::{IssueTracker, JiraClient};

/// Configuration plus every external client of one process.
///
/// The entry point builds this once and hands it to each invocation.
#[derive(Clone)]
pub struct AppContext {
    config: Config,
    resources: Arc<dyn ResourceApi>,
    contacts: Arc<dyn ContactApi>,
    organizations: Arc<dyn OrganizationApi>,
    cost: Arc<dyn CostApi>,
    webhook: Arc<dyn WebhookTransport>,
    status: Arc<dyn StatusReporter>,
    tracker: Option<Arc<dyn IssueTracker>>,
    today: Option<NaiveDate>,
}

impl AppContext {
    /// Create a context with explicit clients and no tracker.
    pub fn new(
        config: Config,
        resources: Arc<dyn ResourceApi>,
        contacts: Arc<dyn ContactApi>,
        organizations: Arc<dyn OrganizationApi>,
        cost: Arc<dyn CostApi>,
        webhook: Arc<dyn WebhookTransport>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            config,
            resources,
            contacts,
            organizations,
            cost,
            webhook,
            status,
            tracker: None,
            today: None,
        }
    }

    /// Wire the AWS SDK clients, the reqwest transport, the CloudFormation
    /// responder and, when enabled, the Jira client.
    pub fn from_aws(config: Config, aws: AwsClients) -> anyhow::Result<Self> {
        let client = http_client(config.delivery.timeout)?;
        let tracker = config
            .tracker
            .clone()
            .map(|settings| Arc::new(JiraClient::new(client.clone(), settings)) as Arc<dyn IssueTracker>);

        let mut ctx = Self::new(
            config,
            Arc::new(aws.resources),
            Arc::new(aws.contacts),
            Arc::new(aws.organizations),
            Arc::new(aws.cost),
            Arc::new(ReqwestTransport::new(client.clone())),
            Arc::new(CloudFormationResponder::new(client)),
        );
        ctx.tracker = tracker;
        Ok(ctx)
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    #[must_use]
    pub fn with_status_reporter(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    /// Pin the date the cost window is computed from (for testing).
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resources(&self) -> &dyn ResourceApi {
        self.resources.as_ref()
    }

    pub fn contacts(&self) -> &dyn ContactApi {
        self.contacts.as_ref()
    }

    pub fn organizations(&self) -> &dyn OrganizationApi {
        self.organizations.as_ref()
    }

    pub fn cost(&self) -> &dyn CostApi {
        self.cost.as_ref()
    }

    pub fn webhook(&self) -> &dyn WebhookTransport {
        self.webhook.as_ref()
    }

    pub fn status_reporter(&self) -> &dyn StatusReporter {
        self.status.as_ref()
    }

    pub fn tracker(&self) -> Option<&dyn IssueTracker> {
        self.tracker.as_deref()
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}
