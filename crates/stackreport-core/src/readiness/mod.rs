//! Nested stack readiness.
//!
//! Provides:
//!
//! - [`SubDeployment`]: one child resource of the parent stack
//! - [`DeploymentStatus`]: provider status folded into the states the poller cares about
//! - [`ReadinessPoller`]: waits until every nested stack is complete

pub mod poller;

use serde::Serialize;

pub use poller::{NestedStacks, PollError, PollPolicy, PollState, ReadinessPoller, evaluate};

/// Resource type CloudFormation uses for nested stacks.
pub const NESTED_STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentStatus {
    Pending,
    Complete,
    /// Failed or rolling back. Never becomes Complete without operator action.
    Failed,
    /// Anything the classifier does not recognise.
    Other,
}

impl DeploymentStatus {
    /// Classify a CloudFormation resource status such as `CREATE_COMPLETE`.
    pub fn from_provider(status: &str) -> Self {
        if status.contains("ROLLBACK") || status.ends_with("_FAILED") {
            DeploymentStatus::Failed
        } else if status.ends_with("_COMPLETE") {
            DeploymentStatus::Complete
        } else if status.ends_with("_IN_PROGRESS") {
            DeploymentStatus::Pending
        } else {
            DeploymentStatus::Other
        }
    }
}

/// A child resource of the parent stack, as seen on one describe round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubDeployment {
    pub physical_id: String,
    pub resource_kind: String,
    pub status: DeploymentStatus,
    /// Status string exactly as the provider reported it.
    pub provider_status: String,
}

impl SubDeployment {
    pub fn new(
        physical_id: impl Into<String>,
        resource_kind: impl Into<String>,
        provider_status: impl Into<String>,
    ) -> Self {
        let provider_status = provider_status.into();
        Self {
            physical_id: physical_id.into(),
            resource_kind: resource_kind.into(),
            status: DeploymentStatus::from_provider(&provider_status),
            provider_status,
        }
    }

    pub fn is_nested_stack(&self) -> bool {
        self.resource_kind == NESTED_STACK_RESOURCE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_statuses() {
        let cases = [
            ("CREATE_COMPLETE", DeploymentStatus::Complete),
            ("UPDATE_COMPLETE", DeploymentStatus::Complete),
            ("IMPORT_COMPLETE", DeploymentStatus::Complete),
            ("CREATE_IN_PROGRESS", DeploymentStatus::Pending),
            ("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS", DeploymentStatus::Pending),
            ("CREATE_FAILED", DeploymentStatus::Failed),
            ("ROLLBACK_IN_PROGRESS", DeploymentStatus::Failed),
            ("UPDATE_ROLLBACK_COMPLETE", DeploymentStatus::Failed),
            ("REVIEW_IN_PROGRESS", DeploymentStatus::Pending),
            ("", DeploymentStatus::Other),
        ];

        for (raw, expected) in cases {
            assert_eq!(DeploymentStatus::from_provider(raw), expected, "{raw}");
        }
    }

    #[test]
    fn recognises_nested_stacks() {
        let nested = SubDeployment::new("arn:child", NESTED_STACK_RESOURCE_TYPE, "CREATE_COMPLETE");
        let bucket = SubDeployment::new("my-bucket", "AWS::S3::Bucket", "CREATE_COMPLETE");

        assert!(nested.is_nested_stack());
        assert!(!bucket.is_nested_stack());
    }
}
