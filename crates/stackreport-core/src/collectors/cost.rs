//! Cost and usage rollups over the trailing billing window.

use chrono::{Datelike, NaiveDate, TimeDelta};
use tracing::{debug, warn};

use super::CollectorError;
use crate::api::{CostApi, CostDimension, CostPeriod, CostQuery, Granularity};

pub const UNBLENDED_COST: &str = "UnblendedCost";

/// Pseudo-regions Cost Explorer uses for charges not tied to a region.
pub const EXCLUDED_REGIONS: [&str; 2] = ["global", "NoRegion"];

/// Query window for "the last 90 days" of monthly billing.
///
/// Starts on the first day of the month containing the date 88 days before
/// the first of the current month; ends (exclusively) on `today`.
pub fn query_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = first_of_month(first_of_month(today) - TimeDelta::days(88));
    (start, today)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(i64::from(date.day0()))
}

/// Billed amount for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub period: NaiveDate,
    pub amount: f64,
    pub currency: String,
    /// The month is still open and the amount may change.
    pub estimated: bool,
}

impl MonthlyTotal {
    /// `"March 2024 - 12.30 USD"`, or `"May 2024 (Estimated) - 1.05 USD"`.
    pub fn label(&self) -> String {
        let month = self.period.format("%B %Y");
        if self.estimated {
            format!("{} (Estimated) - {:.2} {}", month, self.amount, self.currency)
        } else {
            format!("{} - {:.2} {}", month, self.amount, self.currency)
        }
    }
}

/// Active regions, active services and monthly totals of the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostRollup {
    pub by_region: Vec<String>,
    pub by_service: Vec<String>,
    pub monthly_totals: Vec<MonthlyTotal>,
}

/// Cost Explorer queries anchored at a fixed day.
pub struct CostExplorer<'a> {
    api: &'a dyn CostApi,
    today: NaiveDate,
}

impl<'a> CostExplorer<'a> {
    pub fn new(api: &'a dyn CostApi, today: NaiveDate) -> Self {
        Self { api, today }
    }

    fn query(&self, group_by: Option<CostDimension>) -> CostQuery {
        let (start, end) = query_window(self.today);
        CostQuery {
            start,
            end,
            granularity: Granularity::Monthly,
            metric: UNBLENDED_COST.to_string(),
            group_by,
        }
    }

    /// Regions with a non-zero spend, in first-seen order.
    pub async fn active_regions(&self) -> Result<Vec<String>, CollectorError> {
        let periods = self
            .api
            .cost_and_usage(&self.query(Some(CostDimension::Region)))
            .await?;
        let mut regions = active_keys(&periods)?;
        regions.retain(|region| {
            let excluded = EXCLUDED_REGIONS.contains(&region.as_str());
            if excluded {
                debug!(region, "Removed excluded billing region");
            }
            !excluded
        });
        Ok(regions)
    }

    /// Services with a non-zero spend, in first-seen order.
    pub async fn active_services(&self) -> Result<Vec<String>, CollectorError> {
        let periods = self
            .api
            .cost_and_usage(&self.query(Some(CostDimension::Service)))
            .await?;
        active_keys(&periods)
    }

    pub async fn monthly_totals(&self) -> Result<Vec<MonthlyTotal>, CollectorError> {
        let periods = self.api.cost_and_usage(&self.query(None)).await?;
        periods
            .iter()
            .map(|period| -> Result<MonthlyTotal, CollectorError> {
                let total = period
                    .total
                    .as_ref()
                    .ok_or(CollectorError::MissingField("Total.UnblendedCost"))?;
                Ok(MonthlyTotal {
                    period: period.start,
                    amount: parse_amount(&total.amount)?,
                    currency: total.unit.clone(),
                    estimated: period.estimated,
                })
            })
            .collect()
    }

    /// Run all three queries. A failing query leaves its section empty.
    pub async fn rollup(&self) -> CostRollup {
        let by_region = self.active_regions().await.unwrap_or_else(|err| {
            warn!("Cost by region unavailable: {}", err);
            Vec::new()
        });
        let by_service = self.active_services().await.unwrap_or_else(|err| {
            warn!("Cost by service unavailable: {}", err);
            Vec::new()
        });
        let monthly_totals = self.monthly_totals().await.unwrap_or_else(|err| {
            warn!("Monthly cost totals unavailable: {}", err);
            Vec::new()
        });

        CostRollup {
            by_region,
            by_service,
            monthly_totals,
        }
    }
}

/// Group keys whose amount rounds up above zero, deduplicated.
fn active_keys(periods: &[CostPeriod]) -> Result<Vec<String>, CollectorError> {
    let mut keys: Vec<String> = Vec::new();
    for period in periods {
        for group in &period.groups {
            let amount = parse_amount(&group.amount.amount)?;
            if amount.ceil() <= 0.0 {
                continue;
            }
            debug!(
                key = %group.key,
                "Spend is {} {}",
                group.amount.amount,
                group.amount.unit
            );
            if !keys.contains(&group.key) {
                keys.push(group.key.clone());
            }
        }
    }
    Ok(keys)
}

fn parse_amount(raw: &str) -> Result<f64, CollectorError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CollectorError::MalformedAmount(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_covers_three_previous_months() {
        assert_eq!(
            query_window(date(2024, 5, 17)),
            (date(2024, 2, 1), date(2024, 5, 17))
        );
        assert_eq!(
            query_window(date(2024, 1, 1)),
            (date(2023, 10, 1), date(2024, 1, 1))
        );
    }

    #[test]
    fn labels_estimated_months() {
        let mut total = MonthlyTotal {
            period: date(2024, 3, 1),
            amount: 12.3,
            currency: "USD".to_string(),
            estimated: false,
        };
        assert_eq!(total.label(), "March 2024 - 12.30 USD");

        total.estimated = true;
        total.amount = 1.049;
        assert_eq!(total.label(), "March 2024 (Estimated) - 1.05 USD");
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(" 0.42 ").unwrap(), 0.42);
        assert_eq!(
            parse_amount("n/a"),
            Err(CollectorError::MalformedAmount("n/a".to_string()))
        );
    }
}
