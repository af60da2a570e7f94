//! AWS SDK adapters for the traits in [`crate::api`].
//!
//! The adapters only translate requests and responses; classification of the
//! answers happens in [`crate::collectors`] and [`crate::readiness`].

pub mod account;
pub mod cloudformation;
pub mod cost_explorer;
pub mod organizations;

use aws_config::{BehaviorVersion, SdkConfig};

pub use account::AccountContacts;
pub use cloudformation::CloudFormationResources;
pub use cost_explorer::CostExplorerApi;
pub use organizations::OrganizationsAccounts;

/// One SDK client per service, built from a single shared configuration.
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub resources: CloudFormationResources,
    pub contacts: AccountContacts,
    pub organizations: OrganizationsAccounts,
    pub cost: CostExplorerApi,
}

impl AwsClients {
    /// Resolve credentials and region from the environment.
    pub async fn load() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_config(&config)
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            resources: CloudFormationResources::new(aws_sdk_cloudformation::Client::new(config)),
            contacts: AccountContacts::new(aws_sdk_account::Client::new(config)),
            organizations: OrganizationsAccounts::new(aws_sdk_organizations::Client::new(config)),
            cost: CostExplorerApi::new(aws_sdk_costexplorer::Client::new(config)),
        }
    }
}
