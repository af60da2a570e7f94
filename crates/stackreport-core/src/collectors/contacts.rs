//! Alternate contact domains.

use std::collections::BTreeSet;

use tracing::{debug, error};

use super::{CollectorError, email_domain};
use crate::api::{ContactApi, ContactCategory};

/// Unique email domains across the billing, operations and security contacts.
///
/// All three contacts must carry an email; one missing address fails the
/// whole lookup rather than returning a partial set.
pub async fn alternate_contact_domains(
    api: &dyn ContactApi,
) -> Result<BTreeSet<String>, CollectorError> {
    let mut domains = BTreeSet::new();

    for category in ContactCategory::ALL {
        let email = match api.alternate_contact_email(category).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!(%category, "Alternate contact has no email address");
                return Err(CollectorError::MissingContactEmail { category });
            }
            Err(err) => {
                error!(%category, "Alternate contact lookup failed: {}", err);
                return Err(err.into());
            }
        };

        let domain = email_domain(&email)
            .ok_or_else(|| CollectorError::MalformedEmail(email.clone()))?;
        domains.insert(domain.to_string());
    }

    debug!(?domains, "Alternate contact domains");
    Ok(domains)
}
