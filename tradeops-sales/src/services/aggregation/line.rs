//! Time-series construction for line charts

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::models::{Action, CleanedTransaction, FeeType, Grain, ShipType, ValueMode};

use super::{money, percent_of_sales, LineChart, Series};

/// Fold ledger rows into one series per requested filter
///
/// Shipping and fee filters only exist in money terms, so they are
/// dropped outright in quantity and order modes.
pub(super) fn build(
    rows: &[CleanedTransaction],
    buckets: &[NaiveDate],
    grain: Grain,
    mode: ValueMode,
    actions: &[Action],
    ships: &[ShipType],
    fees: &[FeeType],
) -> LineChart {
    let index: HashMap<NaiveDate, usize> = buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| (*bucket, i))
        .collect();
    let categories = buckets.iter().map(|b| grain.format_bucket(*b)).collect();
    let len = buckets.len();

    // Per-bucket gross sales, the percentage-mode denominator
    let mut sales_amounts = vec![Decimal::ZERO; len];
    if mode == ValueMode::Percentage {
        for row in rows {
            if row.action == Action::Sale {
                if let Some(&i) = index.get(&grain.bucket(row.ledger_date)) {
                    sales_amounts[i] += row.amount;
                }
            }
        }
    }

    let mut series = Vec::new();
    for action in actions {
        series.push(action_series(
            rows,
            &index,
            len,
            grain,
            mode,
            *action,
            &sales_amounts,
        ));
    }
    if mode.supports_money_filters() {
        for ship in ships {
            let values = sum_rows(rows, &index, len, grain, |row| row.shipping.get(*ship));
            series.push(money_series(ship.label(), values, mode, &sales_amounts));
        }
        for fee in fees {
            let values = sum_rows(rows, &index, len, grain, |row| row.fees.get(*fee));
            series.push(money_series(fee.label(), values, mode, &sales_amounts));
        }
    }

    LineChart { categories, series }
}

fn action_series(
    rows: &[CleanedTransaction],
    index: &HashMap<NaiveDate, usize>,
    len: usize,
    grain: Grain,
    mode: ValueMode,
    action: Action,
    sales_amounts: &[Decimal],
) -> Series {
    let name = action.label().to_string();
    let data = match mode {
        ValueMode::Amount | ValueMode::Percentage => {
            let mut sums = vec![Decimal::ZERO; len];
            for row in rows.iter().filter(|r| r.action == action) {
                if let Some(&i) = index.get(&grain.bucket(row.ledger_date)) {
                    sums[i] += row.amount;
                }
            }
            render_money(sums, mode, sales_amounts)
        }
        ValueMode::Quantity => {
            let mut sums = vec![0i64; len];
            for row in rows.iter().filter(|r| r.action == action) {
                if let Some(&i) = index.get(&grain.bucket(row.ledger_date)) {
                    sums[i] += row.quantity;
                }
            }
            sums.into_iter().map(|q| q as f64).collect()
        }
        ValueMode::Order => {
            let mut orders: Vec<HashSet<&str>> = vec![HashSet::new(); len];
            for row in rows.iter().filter(|r| r.action == action) {
                if let Some(&i) = index.get(&grain.bucket(row.ledger_date)) {
                    orders[i].insert(row.order_number.as_str());
                }
            }
            orders.into_iter().map(|set| set.len() as f64).collect()
        }
    };
    Series { name, data }
}

/// Sum one money field per bucket
fn sum_rows<F>(
    rows: &[CleanedTransaction],
    index: &HashMap<NaiveDate, usize>,
    len: usize,
    grain: Grain,
    field: F,
) -> Vec<Decimal>
where
    F: Fn(&CleanedTransaction) -> Decimal,
{
    let mut sums = vec![Decimal::ZERO; len];
    for row in rows {
        if let Some(&i) = index.get(&grain.bucket(row.ledger_date)) {
            sums[i] += field(row);
        }
    }
    sums
}

fn money_series(name: &str, values: Vec<Decimal>, mode: ValueMode, sales: &[Decimal]) -> Series {
    Series {
        name: name.to_string(),
        data: render_money(values, mode, sales),
    }
}

fn render_money(values: Vec<Decimal>, mode: ValueMode, sales: &[Decimal]) -> Vec<f64> {
    if mode == ValueMode::Percentage {
        values
            .into_iter()
            .zip(sales)
            .map(|(value, sales)| percent_of_sales(value, *sales))
            .collect()
    } else {
        values.into_iter().map(money).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeeAmounts, ShipAmounts};
    use crate::services::aggregation::bucket_range;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn row(action: Action, day: NaiveDate, amount: &str, quantity: i64, order: &str) -> CleanedTransaction {
        CleanedTransaction {
            id: 0,
            batch_id: Uuid::nil(),
            seller: "acme".to_string(),
            order_number: order.to_string(),
            item_id: "item-1".to_string(),
            action,
            ledger_date: day,
            quantity,
            amount: dec(amount),
            slots: Vec::new(),
            fees: FeeAmounts::default(),
            shipping: ShipAmounts::default(),
        }
    }

    #[test]
    fn amount_mode_sums_each_bucket() {
        let d1 = date(2024, 3, 1);
        let d2 = date(2024, 3, 2);
        let rows = vec![
            row(Action::Sale, d1, "10.00", 1, "o1"),
            row(Action::Sale, d1, "5.50", 1, "o2"),
            row(Action::Sale, d2, "3.00", 1, "o3"),
        ];
        let buckets = bucket_range(d1, d2, Grain::Day);

        let chart = build(&rows, &buckets, Grain::Day, ValueMode::Amount, &[Action::Sale], &[], &[]);
        assert_eq!(chart.categories, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].name, "Sales");
        assert_eq!(chart.series[0].data, vec![15.5, 3.0]);
    }

    #[test]
    fn order_mode_counts_distinct_orders() {
        let d1 = date(2024, 3, 1);
        let rows = vec![
            row(Action::Sale, d1, "10.00", 1, "o1"),
            row(Action::Sale, d1, "10.00", 1, "o1"),
            row(Action::Sale, d1, "10.00", 1, "o2"),
        ];
        let buckets = bucket_range(d1, d1, Grain::Day);

        let chart = build(&rows, &buckets, Grain::Day, ValueMode::Order, &[Action::Sale], &[], &[]);
        assert_eq!(chart.series[0].data, vec![2.0]);
    }

    #[test]
    fn percentage_mode_is_relative_to_bucket_sales() {
        let d1 = date(2024, 3, 1);
        let d2 = date(2024, 3, 2);
        let rows = vec![
            row(Action::Sale, d1, "200.00", 1, "o1"),
            row(Action::Return, d1, "-50.00", 1, "o2"),
            // No sales on d2: denominator clamps to 1
            row(Action::Return, d2, "-3.00", 1, "o3"),
        ];
        let buckets = bucket_range(d1, d2, Grain::Day);

        let chart = build(
            &rows,
            &buckets,
            Grain::Day,
            ValueMode::Percentage,
            &[Action::Return],
            &[],
            &[],
        );
        assert_eq!(chart.series[0].data, vec![-25.0, -300.0]);
    }

    #[test]
    fn ship_and_fee_series_only_appear_in_money_modes() {
        let d1 = date(2024, 3, 1);
        let mut sale = row(Action::Sale, d1, "10.00", 1, "o1");
        sale.shipping.regular = dec("4.25");
        sale.fees.final_value = dec("1.10");
        let rows = vec![sale];
        let buckets = bucket_range(d1, d1, Grain::Day);

        let amount = build(
            &rows,
            &buckets,
            Grain::Day,
            ValueMode::Amount,
            &[Action::Sale],
            &[ShipType::Regular],
            &[FeeType::FinalValue],
        );
        assert_eq!(amount.series.len(), 3);
        assert_eq!(amount.series[1].name, "Regular");
        assert_eq!(amount.series[1].data, vec![4.25]);
        assert_eq!(amount.series[2].name, "Final value fee");
        assert_eq!(amount.series[2].data, vec![1.1]);

        let quantity = build(
            &rows,
            &buckets,
            Grain::Day,
            ValueMode::Quantity,
            &[Action::Sale],
            &[ShipType::Regular],
            &[FeeType::FinalValue],
        );
        assert_eq!(quantity.series.len(), 1);
    }

    #[test]
    fn rows_outside_the_buckets_are_ignored() {
        let d1 = date(2024, 3, 1);
        let rows = vec![
            row(Action::Sale, d1, "10.00", 1, "o1"),
            row(Action::Sale, date(2024, 4, 1), "99.00", 1, "o2"),
        ];
        let buckets = bucket_range(d1, d1, Grain::Day);

        let chart = build(&rows, &buckets, Grain::Day, ValueMode::Amount, &[Action::Sale], &[], &[]);
        assert_eq!(chart.series[0].data, vec![10.0]);
    }

    #[test]
    fn weekly_grain_folds_rows_into_monday_buckets() {
        // 2024-03-04 is a Monday
        let rows = vec![
            row(Action::Sale, date(2024, 3, 5), "10.00", 1, "o1"),
            row(Action::Sale, date(2024, 3, 8), "20.00", 1, "o2"),
            row(Action::Sale, date(2024, 3, 12), "40.00", 1, "o3"),
        ];
        let buckets = bucket_range(date(2024, 3, 4), date(2024, 3, 17), Grain::Week);

        let chart = build(&rows, &buckets, Grain::Week, ValueMode::Amount, &[Action::Sale], &[], &[]);
        assert_eq!(chart.categories, vec!["2024-03-04", "2024-03-11"]);
        assert_eq!(chart.series[0].data, vec![30.0, 40.0]);
    }
}
