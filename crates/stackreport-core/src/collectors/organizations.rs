//! AWS Organizations membership.

use tracing::{debug, error};

use super::{CollectorError, email_domain};
use crate::api::{ApiError, OrganizationApi};

/// Detail reported for a member account whose lookup was denied.
pub const ACCESS_DENIED_DETAIL: &str = "Access Denied";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationMembership {
    /// Part of an organization under this email.
    Member { email: String },
    /// The describe call was denied. Only organization accounts answer that
    /// way, so this still counts as membership.
    AccessDenied,
    NotMember,
}

impl OrganizationMembership {
    pub fn is_member(&self) -> bool {
        !matches!(self, OrganizationMembership::NotMember)
    }

    /// Email, `"Access Denied"`, or an empty string.
    pub fn detail(&self) -> &str {
        match self {
            OrganizationMembership::Member { email } => email,
            OrganizationMembership::AccessDenied => ACCESS_DENIED_DETAIL,
            OrganizationMembership::NotMember => "",
        }
    }

    /// Domain of the organization email when it is a real address.
    pub fn email_domain(&self) -> Option<&str> {
        match self {
            OrganizationMembership::Member { email } => email_domain(email),
            _ => None,
        }
    }
}

pub async fn organization_membership(
    api: &dyn OrganizationApi,
    account_id: &str,
) -> Result<OrganizationMembership, CollectorError> {
    if account_id.is_empty() {
        debug!("No account id configured, skipping organizations lookup");
        return Ok(OrganizationMembership::NotMember);
    }

    match api.account_email(account_id).await {
        Ok(Some(email)) => Ok(OrganizationMembership::Member { email }),
        Ok(None) => Ok(OrganizationMembership::NotMember),
        Err(ApiError::OrganizationsNotInUse) => {
            debug!(account_id, "AWS Organizations not in use");
            Ok(OrganizationMembership::NotMember)
        }
        Err(err @ ApiError::AccessDenied(_)) => {
            error!(account_id, "Organizations lookup denied: {}", err);
            Ok(OrganizationMembership::AccessDenied)
        }
        Err(err) => {
            error!(account_id, "Organizations lookup failed: {}", err);
            Err(err.into())
        }
    }
}
