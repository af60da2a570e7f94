//! Stackreport Core Library
//!
//! Provides the domain logic of a CloudFormation custom resource that waits
//! for nested stacks, collects account metadata and reports the deployment
//! to a webhook and an optional issue tracker.

pub mod api;
pub mod aws;
pub mod collectors;
pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod payload;
pub mod readiness;
pub mod tracker;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{Config, ConfigError, EndpointSettings, TrackerSettings};

    // Invocation
    pub use crate::context::AppContext;
    pub use crate::error::{Error, Result};
    pub use crate::event::{LifecycleEvent, RequestType, ResponseTarget};
    pub use crate::lifecycle::{InvocationResult, LifecycleController};

    // External services
    pub use crate::api::{ApiError, ContactApi, CostApi, OrganizationApi, ResourceApi};
    pub use crate::aws::AwsClients;

    // Pipeline
    pub use crate::delivery::{
        DeliveryOutcome, ResponseStatus, StatusReport, StatusReporter, WebhookTransport,
    };
    pub use crate::payload::Payload;
    pub use crate::readiness::{DeploymentStatus, PollPolicy, SubDeployment};
    pub use crate::tracker::{IssueDraft, IssueTracker};
}
