//! Nested stack outputs.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::api::ResourceApi;
use crate::readiness::SubDeployment;

/// Declared outputs of one stack. Lookup errors are logged and yield no outputs.
pub async fn stack_outputs(api: &dyn ResourceApi, physical_id: &str) -> BTreeMap<String, String> {
    match api.describe_outputs(physical_id).await {
        Ok(outputs) => {
            debug!(physical_id, ?outputs, "Stack outputs");
            outputs
        }
        Err(err) => {
            warn!(physical_id, "Failed to read stack outputs: {}", err);
            BTreeMap::new()
        }
    }
}

/// Outputs of every nested stack, keyed by physical id.
pub async fn nested_stack_outputs(
    api: &dyn ResourceApi,
    children: &[SubDeployment],
) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut outputs = BTreeMap::new();
    for child in children.iter().filter(|c| c.is_nested_stack()) {
        let values = stack_outputs(api, &child.physical_id).await;
        outputs.insert(child.physical_id.clone(), values);
    }
    outputs
}
