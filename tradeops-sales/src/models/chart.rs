//! Chart-facing enums for the aggregation engine

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tradeops_common::time::{day_span, month_start, week_start};

/// Chart shape requested by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Pie,
}

impl ChartType {
    pub fn from_param(value: &str) -> Option<ChartType> {
        match value.to_ascii_lowercase().as_str() {
            "line" => Some(ChartType::Line),
            "pie" => Some(ChartType::Pie),
            _ => None,
        }
    }
}

/// Value computed per bucket for line series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// Sum of signed gross amounts
    Amount,
    /// Sum of unit quantities
    Quantity,
    /// Count of distinct order numbers
    Order,
    /// Amount as a percentage of the bucket's sales amount
    Percentage,
}

impl ValueMode {
    pub fn from_param(value: &str) -> Option<ValueMode> {
        match value.to_ascii_lowercase().as_str() {
            "amount" => Some(ValueMode::Amount),
            "quantity" => Some(ValueMode::Quantity),
            "order" | "orders" => Some(ValueMode::Order),
            "percentage" | "percent" => Some(ValueMode::Percentage),
            _ => None,
        }
    }

    /// Shipping and fee series only make sense for money-valued modes
    pub fn supports_money_filters(&self) -> bool {
        matches!(self, ValueMode::Amount | ValueMode::Percentage)
    }
}

/// Time bucket width, picked from the span of the requested range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Day,
    Week,
    Month,
}

impl Grain {
    /// Pick the grain for an inclusive date range: up to 35 days renders
    /// daily, up to 180 days weekly, anything longer monthly.
    pub fn for_span(start: NaiveDate, end: NaiveDate) -> Grain {
        let days = day_span(start, end);
        if days <= 35 {
            Grain::Day
        } else if days <= 180 {
            Grain::Week
        } else {
            Grain::Month
        }
    }

    /// Bucket a date: the date itself, the Monday of its ISO week, or the
    /// first of its month.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Grain::Day => date,
            Grain::Week => week_start(date),
            Grain::Month => month_start(date),
        }
    }

    /// First day of the bucket after `bucket`
    pub fn advance(&self, bucket: NaiveDate) -> NaiveDate {
        match self {
            Grain::Day => bucket + Duration::days(1),
            Grain::Week => bucket + Duration::days(7),
            Grain::Month => bucket + Months::new(1),
        }
    }

    /// Category label for a bucket
    pub fn format_bucket(&self, bucket: NaiveDate) -> String {
        match self {
            Grain::Day | Grain::Week => bucket.format("%Y-%m-%d").to_string(),
            Grain::Month => bucket.format("%Y-%m").to_string(),
        }
    }
}
