//! Bounded wait for nested stack completion.
//!
//! Every round re-describes the parent stack, so status changes between
//! rounds are always observed. The loop ends in one of three terminal states:
//! all nested stacks complete, at least one nested stack failed, or the
//! [`PollPolicy`] budget ran out.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{DeploymentStatus, SubDeployment};
use crate::api::{ApiError, ResourceApi};
use crate::config::PollSettings;

/// Interval and budget of the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Maximum number of describe rounds.
    pub max_attempts: Option<u32>,
    /// Wall time after which no further sleep is started.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Tighten the deadline; an existing shorter deadline is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }
}

impl From<PollSettings> for PollPolicy {
    fn from(settings: PollSettings) -> Self {
        let mut policy = PollPolicy::new(settings.interval);
        if let Some(max) = settings.max_attempts {
            policy = policy.with_max_attempts(max);
        }
        if let Some(deadline) = settings.deadline {
            policy = policy.with_deadline(deadline);
        }
        policy
    }
}

/// Result of evaluating one describe round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Satisfied,
    StillWaiting { pending: Vec<SubDeployment> },
    PermanentlyFailed { failed: Vec<SubDeployment> },
}

/// Classify one round of nested stacks.
///
/// `expected` is the nested stack count seen at discovery; a round that lists
/// fewer nested stacks is never satisfied.
pub fn evaluate(nested: &[SubDeployment], expected: usize) -> PollState {
    let failed: Vec<SubDeployment> = nested
        .iter()
        .filter(|child| child.status == DeploymentStatus::Failed)
        .cloned()
        .collect();
    if !failed.is_empty() {
        return PollState::PermanentlyFailed { failed };
    }

    let pending: Vec<SubDeployment> = nested
        .iter()
        .filter(|child| child.status != DeploymentStatus::Complete)
        .cloned()
        .collect();
    if pending.is_empty() && nested.len() >= expected {
        PollState::Satisfied
    } else {
        PollState::StillWaiting { pending }
    }
}

/// Nested stacks that all reached completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedStacks {
    pub children: Vec<SubDeployment>,
    /// Describe rounds it took, the discovery round included.
    pub rounds: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("failed to describe resources of {parent_id}: {source}")]
    Describe {
        parent_id: String,
        #[source]
        source: ApiError,
    },

    #[error("nested stacks failed: {}", summarize(.failed))]
    PermanentlyFailed { failed: Vec<SubDeployment> },

    #[error("nested stacks still pending after {rounds} rounds ({elapsed:?}): {}", summarize(.pending))]
    Stalled {
        rounds: u32,
        elapsed: Duration,
        pending: Vec<SubDeployment>,
    },
}

fn summarize(children: &[SubDeployment]) -> String {
    children
        .iter()
        .map(|c| format!("{} ({})", c.physical_id, c.provider_status))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Waits for the nested stacks of a parent stack.
pub struct ReadinessPoller<'a> {
    api: &'a dyn ResourceApi,
    policy: PollPolicy,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(api: &'a dyn ResourceApi, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Block until every nested stack of `parent_id` is complete.
    pub async fn wait_for_nested_completion(
        &self,
        parent_id: &str,
    ) -> Result<NestedStacks, PollError> {
        let started = Instant::now();
        let mut rounds: u32 = 0;
        let mut expected: Option<usize> = None;

        loop {
            rounds += 1;
            let nested = self.describe_nested(parent_id).await?;
            let expected_count = *expected.get_or_insert_with(|| {
                info!(parent_id, nested = nested.len(), "Discovered nested stacks");
                nested.len()
            });

            match evaluate(&nested, expected_count) {
                PollState::Satisfied => {
                    info!(parent_id, rounds, "All nested stacks complete");
                    return Ok(NestedStacks {
                        children: nested,
                        rounds,
                    });
                }
                PollState::PermanentlyFailed { failed } => {
                    warn!(parent_id, failed = %summarize(&failed), "Nested stack failed");
                    return Err(PollError::PermanentlyFailed { failed });
                }
                PollState::StillWaiting { pending } => {
                    let elapsed = started.elapsed();
                    if self.budget_spent(rounds, elapsed) {
                        return Err(PollError::Stalled {
                            rounds,
                            elapsed,
                            pending,
                        });
                    }
                    debug!(
                        parent_id,
                        rounds,
                        pending = pending.len(),
                        "Retrying in {:?}",
                        self.policy.interval
                    );
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }

    async fn describe_nested(&self, parent_id: &str) -> Result<Vec<SubDeployment>, PollError> {
        let children = self
            .api
            .describe_child_resources(parent_id)
            .await
            .map_err(|source| PollError::Describe {
                parent_id: parent_id.to_string(),
                source,
            })?;
        debug!(parent_id, resources = children.len(), "Described stack resources");

        Ok(children
            .into_iter()
            .filter(SubDeployment::is_nested_stack)
            .collect())
    }

    fn budget_spent(&self, rounds: u32, elapsed: Duration) -> bool {
        if let Some(max) = self.policy.max_attempts
            && rounds >= max
        {
            return true;
        }
        if let Some(deadline) = self.policy.deadline
            && elapsed + self.policy.interval > deadline
        {
            return true;
        }
        false
    }
}
