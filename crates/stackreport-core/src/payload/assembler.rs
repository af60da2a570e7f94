//! Pure merge of collected metadata into a [`Payload`].

use std::collections::BTreeSet;

use tracing::warn;

use super::{AssembleError, NestedOutputs, Payload};
use crate::collectors::{
    CollectorError, CostRollup, OrganizationMembership, UnknownRegion, region_display_name,
};
use crate::config::Config;
use crate::event::LifecycleEvent;

/// Identifiers known before any lookup runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMetadata<'a> {
    pub stack_id: &'a str,
    pub region: &'a str,
    pub account_id: &'a str,
    pub fallback_email_domain: &'a str,
}

impl<'a> From<&'a Config> for LocalMetadata<'a> {
    fn from(config: &'a Config) -> Self {
        Self {
            stack_id: &config.stack_id,
            region: &config.region,
            account_id: &config.account_id,
            fallback_email_domain: &config.fallback_email_domain,
        }
    }
}

/// Everything the collectors produced for one invocation.
#[derive(Debug, Clone)]
pub struct CollectedMetadata {
    pub organization: Result<OrganizationMembership, CollectorError>,
    pub contact_domains: Result<BTreeSet<String>, CollectorError>,
    pub cost: CostRollup,
    pub nested_outputs: NestedOutputs,
}

impl Default for CollectedMetadata {
    fn default() -> Self {
        Self {
            organization: Ok(OrganizationMembership::NotMember),
            contact_domains: Ok(BTreeSet::new()),
            cost: CostRollup::default(),
            nested_outputs: NestedOutputs::new(),
        }
    }
}

/// Merge event, local identifiers and collector results.
///
/// Failed collectors degrade to `false` or empty values. The result depends
/// only on the inputs, so identical inputs serialize identically.
pub fn assemble(
    event: &LifecycleEvent,
    local: &LocalMetadata<'_>,
    collected: &CollectedMetadata,
) -> Result<Payload, AssembleError> {
    let organization = collected.organization.as_ref().ok();
    let contact_domains = collected.contact_domains.as_ref().ok();

    let mut builder = Payload::builder();
    builder
        .request_type(event.kind().as_str())?
        .stack_id(local.stack_id)?
        .region(local.region)?
        .account_id(local.account_id)?
        .organization(
            organization.is_some_and(OrganizationMembership::is_member),
            derive_email_domain(organization, contact_domains, local.fallback_email_domain),
        )?
        .active_regions(display_names(&collected.cost.by_region))?
        .active_services(collected.cost.by_service.clone())?
        .monthly_billing(
            collected
                .cost
                .monthly_totals
                .iter()
                .map(|total| total.label())
                .collect(),
        )?
        .nested_stack_outputs(collected.nested_outputs.clone())?;
    builder.build()
}

/// Pick the email domain reported for the account.
///
/// Preference: organization email, alternate contact domains (comma joined,
/// sorted), the configured fallback, then the empty string.
pub fn derive_email_domain(
    organization: Option<&OrganizationMembership>,
    contact_domains: Option<&BTreeSet<String>>,
    fallback: &str,
) -> String {
    if let Some(domain) = organization.and_then(OrganizationMembership::email_domain) {
        return domain.to_string();
    }
    if let Some(domains) = contact_domains
        && !domains.is_empty()
    {
        return domains.iter().cloned().collect::<Vec<_>>().join(",");
    }
    fallback.to_string()
}

/// Unknown codes are kept verbatim so the region is not lost from the report.
fn display_names(region_ids: &[String]) -> Vec<String> {
    region_ids
        .iter()
        .map(|id| match region_display_name(id) {
            Ok(name) => name.to_string(),
            Err(UnknownRegion(code)) => {
                warn!(region = %code, "No display name for region");
                code
            }
        })
        .collect()
}
