//! Dashboard aggregation over the cleaned ledger
//!
//! Reads settled rows only; never touches batches mid-flight. The engine
//! picks a day/week/month grain from the span, then folds rows into either
//! per-filter time series (line) or the five-slice financial breakdown
//! (pie). Chart math lives in `line` and `pie` as pure functions so it
//! tests without a database.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tradeops_common::{Error, Result};

use crate::db;
use crate::models::{Action, ChartType, FeeType, Grain, ShipType, ValueMode};

mod line;
mod pie;

/// One aggregation request, already parsed into domain types
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Empty means every seller
    pub sellers: Vec<String>,
    pub chart: ChartType,
    pub mode: ValueMode,
    /// Actions to chart; empty defaults to all six
    pub actions: Vec<Action>,
    pub ships: Vec<ShipType>,
    pub fees: Vec<FeeType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AggregateResult {
    Line(LineChart),
    Pie(PieChart),
}

#[derive(Debug, Clone, Serialize)]
pub struct LineChart {
    /// Bucket labels, oldest first
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    /// One value per category
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieChart {
    pub pie_data: Vec<PieSlice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    /// Share of gross sales, one decimal place
    pub percent: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detail: Vec<PieDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieDetail {
    pub name: String,
    pub value: f64,
}

/// Run one aggregation query against the ledger
pub async fn aggregate(pool: &SqlitePool, query: &AggregateQuery) -> Result<AggregateResult> {
    if query.start > query.end {
        return Err(Error::InvalidInput(format!(
            "start date {} is after end date {}",
            query.start, query.end
        )));
    }

    let rows = db::ledger::rows_in_range(pool, query.start, query.end, &query.sellers).await?;

    match query.chart {
        ChartType::Line => {
            let grain = Grain::for_span(query.start, query.end);
            let buckets = bucket_range(query.start, query.end, grain);
            let actions: &[Action] = if query.actions.is_empty() {
                &Action::ALL
            } else {
                &query.actions
            };
            Ok(AggregateResult::Line(line::build(
                &rows,
                &buckets,
                grain,
                query.mode,
                actions,
                &query.ships,
                &query.fees,
            )))
        }
        ChartType::Pie => {
            let unit_costs = db::catalog::unit_cost_map(pool).await?;
            Ok(AggregateResult::Pie(pie::build(&rows, &unit_costs)))
        }
    }
}

/// Every bucket start covering `start..=end`, oldest first
///
/// The first bucket may begin before `start` (a week or month is labeled
/// by its first day even when the range opens mid-bucket).
pub fn bucket_range(start: NaiveDate, end: NaiveDate, grain: Grain) -> Vec<NaiveDate> {
    let mut buckets = Vec::new();
    let mut bucket = grain.bucket(start);
    while bucket <= end {
        buckets.push(bucket);
        bucket = grain.advance(bucket);
    }
    buckets
}

/// Money rendered for chart payloads: two decimal places
fn money(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

/// Share of `sales` as a percentage, one decimal place
///
/// The denominator never drops below 1, so zero-sales buckets divide
/// cleanly instead of erroring.
fn percent_of_sales(value: Decimal, sales: Decimal) -> f64 {
    let denominator = sales.max(Decimal::ONE);
    (value / denominator * Decimal::from(100))
        .round_dp(1)
        .to_f64()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_buckets_cover_the_span_inclusively() {
        let buckets = bucket_range(date(2024, 3, 1), date(2024, 3, 5), Grain::Day);
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0], date(2024, 3, 1));
        assert_eq!(buckets[4], date(2024, 3, 5));
    }

    #[test]
    fn week_buckets_open_on_the_monday_before_the_range() {
        // 2024-03-06 is a Wednesday; its week starts 2024-03-04
        let buckets = bucket_range(date(2024, 3, 6), date(2024, 3, 18), Grain::Week);
        assert_eq!(buckets[0], date(2024, 3, 4));
        assert_eq!(buckets, vec![date(2024, 3, 4), date(2024, 3, 11), date(2024, 3, 18)]);
    }

    #[test]
    fn month_buckets_step_across_the_year_boundary() {
        let buckets = bucket_range(date(2023, 11, 15), date(2024, 2, 10), Grain::Month);
        assert_eq!(
            buckets,
            vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]
        );
    }

    #[test]
    fn percentage_clamps_the_denominator_at_one() {
        assert_eq!(percent_of_sales(Decimal::from(5), Decimal::ZERO), 500.0);
        assert_eq!(percent_of_sales(Decimal::from(25), Decimal::from(100)), 25.0);
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(money("12.345".parse().unwrap()), 12.35);
        assert_eq!(money("12.344".parse().unwrap()), 12.34);
    }
}
