//! Organizations account lookup.

use async_trait::async_trait;
use aws_sdk_organizations::error::DisplayErrorContext;
use tracing::debug;

use crate::api::{ApiError, OrganizationApi};

const SERVICE: &str = "organizations";

#[derive(Debug, Clone)]
pub struct OrganizationsAccounts {
    client: aws_sdk_organizations::Client,
}

impl OrganizationsAccounts {
    pub fn new(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrganizationApi for OrganizationsAccounts {
    async fn account_email(&self, account_id: &str) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .describe_account()
            .account_id(account_id)
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.as_service_error() {
                    Some(e) if e.is_aws_organizations_not_in_use_exception() => {
                        ApiError::OrganizationsNotInUse
                    }
                    Some(e) if e.is_access_denied_exception() => ApiError::AccessDenied(message),
                    Some(e) if e.is_account_not_found_exception() => ApiError::NotFound(message),
                    _ => ApiError::service(SERVICE, message),
                }
            })?;
        debug!("Describe account response - {:?}", output);

        Ok(output
            .account()
            .and_then(|account| Option::<&str>::from(account.email()))
            .filter(|email| !email.is_empty())
            .map(String::from))
    }
}
