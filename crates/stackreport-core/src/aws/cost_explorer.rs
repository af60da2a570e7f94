//! Cost Explorer cost and usage queries.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_costexplorer::error::DisplayErrorContext;
use aws_sdk_costexplorer::types::{
    DateInterval, Granularity as CeGranularity, GroupDefinition, GroupDefinitionType, MetricValue,
    ResultByTime,
};
use chrono::NaiveDate;
use tracing::debug;

use crate::api::{ApiError, CostAmount, CostApi, CostGroup, CostPeriod, CostQuery, Granularity};

const SERVICE: &str = "costexplorer";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct CostExplorerApi {
    client: aws_sdk_costexplorer::Client,
}

impl CostExplorerApi {
    pub fn new(client: aws_sdk_costexplorer::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CostApi for CostExplorerApi {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<Vec<CostPeriod>, ApiError> {
        let interval = DateInterval::builder()
            .start(query.start.format(DATE_FORMAT).to_string())
            .end(query.end.format(DATE_FORMAT).to_string())
            .build()
            .map_err(|e| ApiError::service(SERVICE, e.to_string()))?;
        let granularity = match query.granularity {
            Granularity::Daily => CeGranularity::Daily,
            Granularity::Monthly => CeGranularity::Monthly,
        };

        let mut periods = Vec::new();
        let mut next_page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get_cost_and_usage()
                .time_period(interval.clone())
                .granularity(granularity.clone())
                .metrics(query.metric.clone())
                .set_next_page_token(next_page_token.take());
            if let Some(dimension) = query.group_by {
                request = request.group_by(
                    GroupDefinition::builder()
                        .r#type(GroupDefinitionType::Dimension)
                        .key(dimension.as_key())
                        .build(),
                );
            }

            let output = request
                .send()
                .await
                .map_err(|e| ApiError::service(SERVICE, DisplayErrorContext(&e).to_string()))?;
            debug!("Cost and usage response - {:?}", output);

            for result in output.results_by_time() {
                periods.push(to_period(result, &query.metric)?);
            }

            match output.next_page_token() {
                Some(token) if !token.is_empty() => next_page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(periods)
    }
}

fn to_period(result: &ResultByTime, metric: &str) -> Result<CostPeriod, ApiError> {
    let start = result
        .time_period()
        .and_then(|interval| Option::<&str>::from(interval.start()))
        .ok_or_else(|| ApiError::service(SERVICE, "result without time period"))?;
    let start = NaiveDate::parse_from_str(start, DATE_FORMAT)
        .map_err(|e| ApiError::service(SERVICE, format!("bad period start '{}': {}", start, e)))?;

    let groups = result
        .groups()
        .iter()
        .filter_map(|group| {
            let key = group.keys().first()?.clone();
            let amount = metric_amount(group.metrics(), metric)?;
            Some(CostGroup { key, amount })
        })
        .collect();

    Ok(CostPeriod {
        start,
        estimated: Option::<bool>::from(result.estimated()).unwrap_or(false),
        total: metric_amount(result.total(), metric),
        groups,
    })
}

fn metric_amount(
    metrics: Option<&HashMap<String, MetricValue>>,
    metric: &str,
) -> Option<CostAmount> {
    let value = metrics?.get(metric)?;
    Some(CostAmount {
        amount: value.amount()?.to_string(),
        unit: value.unit().unwrap_or_default().to_string(),
    })
}
