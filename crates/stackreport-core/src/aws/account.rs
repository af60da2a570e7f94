//! Account alternate contacts.

use async_trait::async_trait;
use aws_sdk_account::error::DisplayErrorContext;
use aws_sdk_account::types::AlternateContactType;
use tracing::debug;

use crate::api::{ApiError, ContactApi, ContactCategory};

const SERVICE: &str = "account";

#[derive(Debug, Clone)]
pub struct AccountContacts {
    client: aws_sdk_account::Client,
}

impl AccountContacts {
    pub fn new(client: aws_sdk_account::Client) -> Self {
        Self { client }
    }
}

fn contact_type(category: ContactCategory) -> AlternateContactType {
    match category {
        ContactCategory::Billing => AlternateContactType::Billing,
        ContactCategory::Operations => AlternateContactType::Operations,
        ContactCategory::Security => AlternateContactType::Security,
    }
}

#[async_trait]
impl ContactApi for AccountContacts {
    async fn alternate_contact_email(
        &self,
        category: ContactCategory,
    ) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .get_alternate_contact()
            .alternate_contact_type(contact_type(category))
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.as_service_error() {
                    Some(e) if e.is_resource_not_found_exception() => ApiError::NotFound(message),
                    Some(e) if e.is_access_denied_exception() => ApiError::AccessDenied(message),
                    _ => ApiError::service(SERVICE, message),
                }
            })?;
        debug!(%category, "Alternate contact response - {:?}", output);

        Ok(output
            .alternate_contact()
            .and_then(|contact| Option::<&str>::from(contact.email_address()))
            .filter(|email| !email.is_empty())
            .map(String::from))
    }
}
