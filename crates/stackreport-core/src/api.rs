//! Read-only cloud APIs the reporter depends on.
//!
//! Each trait is a thin request/response seam. The AWS SDK adapters live in
//! [`crate::aws`]; tests substitute in-memory fakes.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::readiness::SubDeployment;

/// Failure reported by an external API adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("AWS Organizations is not in use for this account")]
    OrganizationsNotInUse,

    #[error("{service} request failed: {message}")]
    Service {
        service: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        ApiError::Service {
            service,
            message: message.into(),
        }
    }
}

/// Stack resource and output lookups.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Every resource of `parent_id`, nested stacks and otherwise.
    async fn describe_child_resources(&self, parent_id: &str)
    -> Result<Vec<SubDeployment>, ApiError>;

    /// Declared outputs of one stack, empty when it has none.
    async fn describe_outputs(&self, physical_id: &str)
    -> Result<BTreeMap<String, String>, ApiError>;
}

/// Alternate contact categories of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactCategory {
    Billing,
    Operations,
    Security,
}

impl ContactCategory {
    pub const ALL: [ContactCategory; 3] = [
        ContactCategory::Billing,
        ContactCategory::Operations,
        ContactCategory::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactCategory::Billing => "BILLING",
            ContactCategory::Operations => "OPERATIONS",
            ContactCategory::Security => "SECURITY",
        }
    }
}

impl fmt::Display for ContactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ContactApi: Send + Sync {
    /// Email address of the contact, `None` when the record has none.
    async fn alternate_contact_email(
        &self,
        category: ContactCategory,
    ) -> Result<Option<String>, ApiError>;
}

#[async_trait]
pub trait OrganizationApi: Send + Sync {
    /// Email registered for `account_id` in its organization.
    ///
    /// Fails with [`ApiError::OrganizationsNotInUse`] when the account is
    /// standalone and [`ApiError::AccessDenied`] when the caller may not ask.
    async fn account_email(&self, account_id: &str) -> Result<Option<String>, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Monthly,
}

/// Dimension a cost query is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostDimension {
    Region,
    Service,
}

impl CostDimension {
    pub fn as_key(&self) -> &'static str {
        match self {
            CostDimension::Region => "REGION",
            CostDimension::Service => "SERVICE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostQuery {
    /// Inclusive.
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub metric: String,
    pub group_by: Option<CostDimension>,
}

/// Amount exactly as the provider returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostAmount {
    pub amount: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostGroup {
    pub key: String,
    pub amount: CostAmount,
}

/// One time bucket of a cost query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostPeriod {
    pub start: NaiveDate,
    pub estimated: bool,
    /// Present for ungrouped queries.
    pub total: Option<CostAmount>,
    pub groups: Vec<CostGroup>,
}

#[async_trait]
pub trait CostApi: Send + Sync {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>, ApiError>;
}
