//! Metadata collectors.
//!
//! Each collector wraps one external lookup and classifies its answer. A
//! collector never lets an API failure escape as anything but a
//! [`CollectorError`]; the assembler decides what a failure degrades to.

pub mod contacts;
pub mod cost;
pub mod organizations;
pub mod regions;
pub mod stack_outputs;

use crate::api::{ApiError, ContactCategory};

pub use contacts::alternate_contact_domains;
pub use cost::{CostExplorer, CostRollup, MonthlyTotal, query_window};
pub use organizations::{OrganizationMembership, organization_membership};
pub use regions::{UnknownRegion, region_display_name};
pub use stack_outputs::{nested_stack_outputs, stack_outputs};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    #[error("{category} alternate contact has no email address")]
    MissingContactEmail { category: ContactCategory },

    #[error("malformed email address '{0}'")]
    MalformedEmail(String),

    #[error("malformed cost amount '{0}'")]
    MalformedAmount(String),

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Domain part of an email address.
pub fn email_domain(email: &str) -> Option<&str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Some(domain),
        _ => None,
    }
}
