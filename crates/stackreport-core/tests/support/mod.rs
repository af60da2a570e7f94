//! In-memory fakes for the external seams.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use url::Url;

use stackreport_core::api::{
    ApiError, ContactApi, ContactCategory, CostAmount, CostApi, CostDimension, CostGroup,
    CostPeriod, CostQuery, OrganizationApi, ResourceApi,
};
use stackreport_core::config::{Config, EndpointSettings};
use stackreport_core::context::AppContext;
use stackreport_core::delivery::{
    HttpResponse, ReportError, StatusReport, StatusReporter, TransportError, WebhookTransport,
};
use stackreport_core::event::{LifecycleEvent, ResponseTarget};
use stackreport_core::readiness::{NESTED_STACK_RESOURCE_TYPE, SubDeployment};
use stackreport_core::tracker::{IssueDraft, IssueTracker, TrackerError, UpsertOutcome};

pub const PARENT_STACK: &str =
    "arn:aws:cloudformation:us-east-1:123456789012:stack/reporter/0a1b2c3d";

pub fn nested(id: &str, status: &str) -> SubDeployment {
    SubDeployment::new(id, NESTED_STACK_RESOURCE_TYPE, status)
}

pub fn bucket(id: &str) -> SubDeployment {
    SubDeployment::new(id, "AWS::S3::Bucket", "CREATE_COMPLETE")
}

pub fn event(request_type: &str) -> LifecycleEvent {
    LifecycleEvent::from_value(json!({
        "RequestType": request_type,
        "RequestId": "req-1",
        "ResponseURL": "https://cloudformation-custom-resource-response.example.com/presigned",
        "StackId": PARENT_STACK,
        "LogicalResourceId": "DeploymentReport",
        "ResourceType": "Custom::DeploymentReport",
    }))
    .unwrap()
}

/// Configuration with a valid webhook endpoint.
pub fn config() -> Config {
    Config {
        stack_id: PARENT_STACK.to_string(),
        region: "us-east-1".to_string(),
        account_id: "123456789012".to_string(),
        endpoint: EndpointSettings {
            kind: Some("API".to_string()),
            url: Some("https://hooks.example.com/deployments".to_string()),
        },
        ..Config::default()
    }
}

// =========================================================================
// Resources
// =========================================================================

/// Plays back one describe result per call; the last one repeats.
#[derive(Default)]
pub struct ScriptedResources {
    rounds: Mutex<VecDeque<Result<Vec<SubDeployment>, ApiError>>>,
    last: Mutex<Vec<SubDeployment>>,
    outputs: Mutex<HashMap<String, BTreeMap<String, String>>>,
    describe_calls: AtomicU32,
}

impl ScriptedResources {
    pub fn new(rounds: Vec<Vec<SubDeployment>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub fn failing(err: ApiError) -> Self {
        Self {
            rounds: Mutex::new(VecDeque::from([Err(err)])),
            ..Self::default()
        }
    }

    pub fn with_outputs(self, physical_id: &str, outputs: &[(&str, &str)]) -> Self {
        self.outputs.lock().unwrap().insert(
            physical_id.to_string(),
            outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn describe_calls(&self) -> u32 {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceApi for ScriptedResources {
    async fn describe_child_resources(
        &self,
        _parent_id: &str,
    ) -> Result<Vec<SubDeployment>, ApiError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        match self.rounds.lock().unwrap().pop_front() {
            Some(Ok(round)) => {
                *last = round.clone();
                Ok(round)
            }
            Some(Err(err)) => Err(err),
            None => Ok(last.clone()),
        }
    }

    async fn describe_outputs(
        &self,
        physical_id: &str,
    ) -> Result<BTreeMap<String, String>, ApiError> {
        self.outputs
            .lock()
            .unwrap()
            .get(physical_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(physical_id.to_string()))
    }
}

// =========================================================================
// Contacts and organizations
// =========================================================================

pub struct StaticContacts {
    emails: HashMap<ContactCategory, Result<Option<String>, ApiError>>,
}

impl StaticContacts {
    pub fn all(email: &str) -> Self {
        Self::each(email, email, email)
    }

    pub fn each(billing: &str, operations: &str, security: &str) -> Self {
        let emails = [
            (ContactCategory::Billing, billing),
            (ContactCategory::Operations, operations),
            (ContactCategory::Security, security),
        ]
        .into_iter()
        .map(|(category, email)| (category, Ok(Some(email.to_string()))))
        .collect();
        Self { emails }
    }

    pub fn without(mut self, category: ContactCategory) -> Self {
        self.emails.insert(category, Ok(None));
        self
    }

    pub fn failing(mut self, category: ContactCategory, err: ApiError) -> Self {
        self.emails.insert(category, Err(err));
        self
    }
}

#[async_trait]
impl ContactApi for StaticContacts {
    async fn alternate_contact_email(
        &self,
        category: ContactCategory,
    ) -> Result<Option<String>, ApiError> {
        self.emails.get(&category).cloned().unwrap_or(Ok(None))
    }
}

pub struct StaticOrganization(pub Result<Option<String>, ApiError>);

impl StaticOrganization {
    pub fn not_in_use() -> Self {
        Self(Err(ApiError::OrganizationsNotInUse))
    }

    pub fn member(email: &str) -> Self {
        Self(Ok(Some(email.to_string())))
    }
}

#[async_trait]
impl OrganizationApi for StaticOrganization {
    async fn account_email(&self, _account_id: &str) -> Result<Option<String>, ApiError> {
        self.0.clone()
    }
}

// =========================================================================
// Cost
// =========================================================================

/// Answers cost queries by group dimension and records every query.
#[derive(Default)]
pub struct StaticCost {
    pub by_region: Vec<(String, String)>,
    pub by_service: Vec<(String, String)>,
    pub monthly: Vec<(NaiveDate, String, bool)>,
    pub fail: bool,
    pub queries: Mutex<Vec<CostQuery>>,
}

impl StaticCost {
    pub fn regions(amounts: &[(&str, &str)]) -> Self {
        Self {
            by_region: pairs(amounts),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<CostQuery> {
        self.queries.lock().unwrap().clone()
    }
}

pub fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn usd(amount: &str) -> CostAmount {
    CostAmount {
        amount: amount.to_string(),
        unit: "USD".to_string(),
    }
}

#[async_trait]
impl CostApi for StaticCost {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(ApiError::service("costexplorer", "throttled"));
        }

        let grouped = |items: &[(String, String)]| {
            vec![CostPeriod {
                start: query.start,
                estimated: false,
                total: None,
                groups: items
                    .iter()
                    .map(|(key, amount)| CostGroup {
                        key: key.clone(),
                        amount: usd(amount),
                    })
                    .collect(),
            }]
        };

        Ok(match query.group_by {
            Some(CostDimension::Region) => grouped(&self.by_region),
            Some(CostDimension::Service) => grouped(&self.by_service),
            None => self
                .monthly
                .iter()
                .map(|(start, amount, estimated)| CostPeriod {
                    start: *start,
                    estimated: *estimated,
                    total: Some(usd(amount)),
                    groups: Vec::new(),
                })
                .collect(),
        })
    }
}

// =========================================================================
// Outbound HTTP, status reports and tracker
// =========================================================================

/// Returns scripted responses, then 200 "ok", and records every POST.
#[derive(Default)]
pub struct RecordingWebhook {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<(Url, String)>>,
}

impl RecordingWebhook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<(Url, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn post_json(&self, url: &Url, body: &str) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.clone(), body.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(response(200, "ok")))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<StatusReport>>,
    fail: bool,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(
        &self,
        _target: &ResponseTarget,
        report: &StatusReport,
    ) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(ReportError::Rejected {
                status: 403,
                body: "expired".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    drafts: Mutex<Vec<IssueDraft>>,
    fail: bool,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn drafts(&self) -> Vec<IssueDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn upsert_issue(&self, draft: &IssueDraft) -> Result<UpsertOutcome, TrackerError> {
        self.drafts.lock().unwrap().push(draft.clone());
        if self.fail {
            return Err(TrackerError::ProjectNotFound("OPS".to_string()));
        }
        Ok(UpsertOutcome::Created {
            key: "OPS-1".to_string(),
        })
    }
}

// =========================================================================
// Context
// =========================================================================

/// Every fake of one test, kept so assertions can inspect them afterwards.
pub struct Harness {
    pub resources: Arc<ScriptedResources>,
    pub contacts: Arc<StaticContacts>,
    pub organization: Arc<StaticOrganization>,
    pub cost: Arc<StaticCost>,
    pub webhook: Arc<RecordingWebhook>,
    pub reporter: Arc<RecordingReporter>,
    pub tracker: Option<Arc<RecordingTracker>>,
}

impl Harness {
    pub fn new(resources: ScriptedResources) -> Self {
        Self {
            resources: Arc::new(resources),
            contacts: Arc::new(StaticContacts::all("ops@example.com")),
            organization: Arc::new(StaticOrganization::not_in_use()),
            cost: Arc::new(StaticCost::default()),
            webhook: Arc::new(RecordingWebhook::new()),
            reporter: Arc::new(RecordingReporter::new()),
            tracker: None,
        }
    }

    pub fn context(&self, config: Config) -> AppContext {
        let ctx = AppContext::new(
            config,
            self.resources.clone(),
            self.contacts.clone(),
            self.organization.clone(),
            self.cost.clone(),
            self.webhook.clone(),
            self.reporter.clone(),
        )
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap());
        match &self.tracker {
            Some(tracker) => ctx.with_tracker(tracker.clone()),
            None => ctx,
        }
    }
}
