//! CloudFormation stack resources and outputs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use tracing::debug;

use crate::api::{ApiError, ResourceApi};
use crate::readiness::SubDeployment;

const SERVICE: &str = "cloudformation";

#[derive(Debug, Clone)]
pub struct CloudFormationResources {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationResources {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for CloudFormationResources {
    async fn describe_child_resources(
        &self,
        parent_id: &str,
    ) -> Result<Vec<SubDeployment>, ApiError> {
        let output = self
            .client
            .describe_stack_resources()
            .stack_name(parent_id)
            .send()
            .await
            .map_err(|e| ApiError::service(SERVICE, DisplayErrorContext(&e).to_string()))?;
        debug!("Describe stack resources response - {:?}", output);

        // Option::from accepts plain and optional members alike.
        Ok(output
            .stack_resources()
            .iter()
            .map(|resource| {
                SubDeployment::new(
                    Option::<&str>::from(resource.physical_resource_id()).unwrap_or_default(),
                    Option::<&str>::from(resource.resource_type()).unwrap_or_default(),
                    Option::<&aws_sdk_cloudformation::types::ResourceStatus>::from(
                        resource.resource_status(),
                    )
                    .map(|status| status.as_str())
                    .unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn describe_outputs(
        &self,
        physical_id: &str,
    ) -> Result<BTreeMap<String, String>, ApiError> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(physical_id)
            .send()
            .await
            .map_err(|e| ApiError::service(SERVICE, DisplayErrorContext(&e).to_string()))?;
        debug!("Describe stacks response - {:?}", output);

        let stack = output
            .stacks()
            .first()
            .ok_or_else(|| ApiError::NotFound(physical_id.to_string()))?;

        Ok(stack
            .outputs()
            .iter()
            .filter_map(|out| {
                let key = Option::<&str>::from(out.output_key())?;
                let value = Option::<&str>::from(out.output_value()).unwrap_or_default();
                Some((key.to_string(), value.to_string()))
            })
            .collect())
    }
}
