//! The delivered payload.
//!
//! [`Payload`] has a fixed schema; [`PayloadBuilder`] sets every field exactly
//! once so no later step can silently overwrite an earlier one.

pub mod assembler;

use std::collections::BTreeMap;

use serde::Serialize;

pub use assembler::{CollectedMetadata, LocalMetadata, assemble, derive_email_domain};

pub type NestedOutputs = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("payload field {0} set twice")]
    FieldAlreadySet(&'static str),

    #[error("payload field {0} never set")]
    MissingField(&'static str),
}

/// Aggregated deployment report. Serializes in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    #[serde(rename = "RequestType")]
    request_type: String,
    #[serde(rename = "StackId")]
    stack_id: String,
    #[serde(rename = "Region")]
    region: String,
    #[serde(rename = "AWSAccountId")]
    account_id: String,
    #[serde(rename = "IsOrganizationsAccount")]
    is_organizations_account: bool,
    #[serde(rename = "EmailDomain")]
    email_domain: String,
    #[serde(rename = "ActiveAWSRegions")]
    active_regions: Vec<String>,
    #[serde(rename = "ActiveAWSServices")]
    active_services: Vec<String>,
    #[serde(rename = "MonthlyBilling")]
    monthly_billing: Vec<String>,
    #[serde(rename = "NestedStackOutputs")]
    nested_stack_outputs: NestedOutputs,
}

impl Payload {
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::default()
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn is_organizations_account(&self) -> bool {
        self.is_organizations_account
    }

    pub fn email_domain(&self) -> &str {
        &self.email_domain
    }

    pub fn active_regions(&self) -> &[String] {
        &self.active_regions
    }

    pub fn active_services(&self) -> &[String] {
        &self.active_services
    }

    pub fn monthly_billing(&self) -> &[String] {
        &self.monthly_billing
    }

    pub fn nested_stack_outputs(&self) -> &NestedOutputs {
        &self.nested_stack_outputs
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct PayloadBuilder {
    request_type: Option<String>,
    stack_id: Option<String>,
    region: Option<String>,
    account_id: Option<String>,
    is_organizations_account: Option<bool>,
    email_domain: Option<String>,
    active_regions: Option<Vec<String>>,
    active_services: Option<Vec<String>>,
    monthly_billing: Option<Vec<String>>,
    nested_stack_outputs: Option<NestedOutputs>,
}

fn set_once<T>(slot: &mut Option<T>, field: &'static str, value: T) -> Result<(), AssembleError> {
    if slot.is_some() {
        return Err(AssembleError::FieldAlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

fn take<T>(slot: Option<T>, field: &'static str) -> Result<T, AssembleError> {
    slot.ok_or(AssembleError::MissingField(field))
}

impl PayloadBuilder {
    pub fn request_type(&mut self, value: impl Into<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.request_type, "RequestType", value.into())?;
        Ok(self)
    }

    pub fn stack_id(&mut self, value: impl Into<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.stack_id, "StackId", value.into())?;
        Ok(self)
    }

    pub fn region(&mut self, value: impl Into<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.region, "Region", value.into())?;
        Ok(self)
    }

    pub fn account_id(&mut self, value: impl Into<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.account_id, "AWSAccountId", value.into())?;
        Ok(self)
    }

    pub fn organization(
        &mut self,
        is_member: bool,
        email_domain: impl Into<String>,
    ) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.is_organizations_account, "IsOrganizationsAccount", is_member)?;
        set_once(&mut self.email_domain, "EmailDomain", email_domain.into())?;
        Ok(self)
    }

    pub fn active_regions(&mut self, value: Vec<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.active_regions, "ActiveAWSRegions", value)?;
        Ok(self)
    }

    pub fn active_services(&mut self, value: Vec<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.active_services, "ActiveAWSServices", value)?;
        Ok(self)
    }

    pub fn monthly_billing(&mut self, value: Vec<String>) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.monthly_billing, "MonthlyBilling", value)?;
        Ok(self)
    }

    pub fn nested_stack_outputs(
        &mut self,
        value: NestedOutputs,
    ) -> Result<&mut Self, AssembleError> {
        set_once(&mut self.nested_stack_outputs, "NestedStackOutputs", value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Payload, AssembleError> {
        Ok(Payload {
            request_type: take(self.request_type, "RequestType")?,
            stack_id: take(self.stack_id, "StackId")?,
            region: take(self.region, "Region")?,
            account_id: take(self.account_id, "AWSAccountId")?,
            is_organizations_account: take(
                self.is_organizations_account,
                "IsOrganizationsAccount",
            )?,
            email_domain: take(self.email_domain, "EmailDomain")?,
            active_regions: take(self.active_regions, "ActiveAWSRegions")?,
            active_services: take(self.active_services, "ActiveAWSServices")?,
            monthly_billing: take(self.monthly_billing, "MonthlyBilling")?,
            nested_stack_outputs: take(self.nested_stack_outputs, "NestedStackOutputs")?,
        })
    }
}
