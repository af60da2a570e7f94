//! One custom-resource invocation, end to end.
//!
//! [`LifecycleController::handle`] runs the pipeline for a lifecycle event:
//!
//! 1. Create and Update wait for the nested stacks of the parent stack and
//!    read their outputs. Delete skips both.
//! 2. Organization membership, alternate contacts and the cost rollup are
//!    collected in sequence. Their failures only degrade the payload.
//! 3. The payload is assembled and delivered to the webhook.
//! 4. After a successful Create or Update delivery the tracker issue is
//!    upserted when a tracker is configured.
//!
//! Whatever happens in between, exactly one status report is sent.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::collectors::{
    CostExplorer, alternate_contact_domains, nested_stack_outputs, organization_membership,
};
use crate::context::AppContext;
use crate::delivery::{
    DeliveryDispatcher, DeliveryOutcome, ResponseStatus, StatusReport, StatusReporter,
};
use crate::error::{Error, Result};
use crate::event::{LifecycleEvent, ResponseTarget};
use crate::payload::{CollectedMetadata, LocalMetadata, Payload, assemble};
use crate::readiness::{PollPolicy, ReadinessPoller};
use crate::tracker::{IssueDraft, UpsertOutcome};

/// Time kept back from the invocation deadline for collection, delivery and
/// the status report.
pub const REPORT_RESERVE: Duration = Duration::from_secs(60);

/// What the invocation reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub status: ResponseStatus,
    pub reason: String,
    pub delivery: Option<DeliveryOutcome>,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// `{"statusCode": .., "body": ..}` as returned to the Lambda runtime.
    pub fn to_response(&self) -> serde_json::Value {
        match &self.delivery {
            Some(outcome) => serde_json::json!({
                "statusCode": outcome.http_status,
                "body": outcome.body,
            }),
            None => serde_json::json!({
                "statusCode": 500,
                "body": self.reason,
            }),
        }
    }
}

pub struct LifecycleController<'a> {
    ctx: &'a AppContext,
    remaining: Option<Duration>,
    default_physical_id: Option<String>,
}

impl<'a> LifecycleController<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self {
            ctx,
            remaining: None,
            default_physical_id: None,
        }
    }

    /// Time left before the host stops the invocation.
    #[must_use]
    pub fn with_remaining_time(mut self, remaining: Duration) -> Self {
        self.remaining = Some(remaining);
        self
    }

    /// Physical resource id reported when the event carries none.
    #[must_use]
    pub fn with_default_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.default_physical_id = Some(physical_id.into());
        self
    }

    /// Run the pipeline and send the one status report.
    ///
    /// Only a failing status report is returned as an error; pipeline
    /// failures end up in the reported reason.
    pub async fn handle(&self, event: &LifecycleEvent) -> Result<InvocationResult> {
        info!(
            request_type = %event.kind(),
            request_id = event.correlation_id(),
            "Handling lifecycle event"
        );

        let result = match self.run(event).await {
            Ok(outcome) => InvocationResult {
                status: ResponseStatus::Success,
                reason: format!("Payload delivered with HTTP {}", outcome.http_status),
                delivery: Some(outcome),
            },
            Err(err) => {
                error!("Invocation failed: {}", err);
                InvocationResult {
                    status: ResponseStatus::Failed,
                    reason: err.to_string(),
                    delivery: None,
                }
            }
        };

        self.report(event, &result).await?;
        Ok(result)
    }

    async fn run(&self, event: &LifecycleEvent) -> Result<DeliveryOutcome> {
        let config = self.ctx.config();
        let provisioning = event.kind().is_provisioning();
        let stack_id = self.parent_stack_id(event);

        let mut collected = CollectedMetadata::default();
        if provisioning {
            let nested = ReadinessPoller::new(self.ctx.resources(), self.poll_policy())
                .wait_for_nested_completion(stack_id)
                .await?;
            collected.nested_outputs =
                nested_stack_outputs(self.ctx.resources(), &nested.children).await;
        }

        collected.organization =
            organization_membership(self.ctx.organizations(), &config.account_id).await;
        collected.contact_domains = alternate_contact_domains(self.ctx.contacts())
            .await
            .inspect_err(|err| warn!("Alternate contacts unavailable: {}", err));
        collected.cost = CostExplorer::new(self.ctx.cost(), self.ctx.today())
            .rollup()
            .await;

        let local = LocalMetadata {
            stack_id,
            ..LocalMetadata::from(config)
        };
        let payload = assemble(event, &local, &collected)?;

        let outcome = DeliveryDispatcher::new(
            self.ctx.webhook(),
            &config.endpoint,
            config.delivery.max_attempts,
        )
        .deliver(&payload)
        .await?;

        if provisioning {
            self.file_issue(&payload).await;
        }
        Ok(outcome)
    }

    /// The configured stack id, or the stack that sent the event.
    fn parent_stack_id<'e>(&'e self, event: &'e LifecycleEvent) -> &'e str {
        let configured = self.ctx.config().stack_id.as_str();
        if configured.is_empty() {
            event.stack_id()
        } else {
            configured
        }
    }

    fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::from(self.ctx.config().poll);
        match self.remaining {
            Some(remaining) => policy.with_deadline(remaining.saturating_sub(REPORT_RESERVE)),
            None => policy,
        }
    }

    async fn file_issue(&self, payload: &Payload) {
        let Some(tracker) = self.ctx.tracker() else {
            return;
        };
        let labels = self
            .ctx
            .config()
            .tracker
            .as_ref()
            .map(|settings| settings.default_labels.as_slice())
            .unwrap_or_default();

        let draft = match IssueDraft::from_payload(payload, labels) {
            Ok(draft) => draft,
            Err(err) => {
                error!("Failed to render tracker issue: {}", err);
                return;
            }
        };
        match tracker.upsert_issue(&draft).await {
            Ok(UpsertOutcome::Created { key }) => info!(issue = %key, "Tracker issue created"),
            Ok(UpsertOutcome::Updated { key }) => info!(issue = %key, "Tracker issue updated"),
            Err(err) => error!("Tracker upsert failed: {}", err),
        }
    }

    async fn report(&self, event: &LifecycleEvent, result: &InvocationResult) -> Result<()> {
        let physical_id = self.physical_id(event);
        let report = match result.status {
            ResponseStatus::Success => StatusReport::success(physical_id, &result.reason),
            ResponseStatus::Failed => StatusReport::failed(physical_id, &result.reason),
        };
        self.ctx
            .status_reporter()
            .report(event.target(), &report)
            .await
            .inspect_err(|err| error!("Status report failed: {}", err))?;
        Ok(())
    }

    fn physical_id(&self, event: &LifecycleEvent) -> String {
        physical_id(event.target(), self.default_physical_id.as_deref())
    }
}

/// Report Failed for an invocation that could not start, such as one with
/// invalid configuration or a request that does not parse.
pub async fn reject(
    reporter: &dyn StatusReporter,
    target: &ResponseTarget,
    default_physical_id: Option<&str>,
    err: &Error,
) -> Result<InvocationResult> {
    error!("Rejecting lifecycle event: {}", err);
    let reason = err.to_string();
    let report = StatusReport::failed(physical_id(target, default_physical_id), &reason);
    reporter
        .report(target, &report)
        .await
        .inspect_err(|err| error!("Status report failed: {}", err))?;
    Ok(InvocationResult {
        status: ResponseStatus::Failed,
        reason,
        delivery: None,
    })
}

/// Keep the id CloudFormation already knows, so an update never turns into a
/// replacement.
fn physical_id(target: &ResponseTarget, default: Option<&str>) -> String {
    target
        .physical_resource_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .or(default.filter(|id| !id.is_empty()))
        .unwrap_or(&target.logical_resource_id)
        .to_string()
}
