//! Marketplace export normalizer
//!
//! Turns the raw CSV lines of a transaction export and an earnings export
//! into typed rows. Every cell quirk the marketplace emits is absorbed
//! here: currency symbols, thousands separators, parenthesized negatives,
//! five different date spellings, and a leading header row. One malformed
//! row fails the whole upload with its line number; uploads are all or
//! nothing.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tradeops_common::{Error, Result};

use crate::models::{FeeAmounts, NewEarning, NewTransaction, ShipAmounts};

/// Column count of the transaction export
const TRANSACTION_COLUMNS: usize = 8;
/// Column count of the earnings export
const EARNING_COLUMNS: usize = 14;

/// Timestamp spellings seen in exports, tried in order
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];
/// Date-only spellings; these normalize to midnight
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y"];

/// Parse the lines of a transaction export
///
/// Expected columns: date, type, order number, item id, title,
/// custom label, quantity, gross amount.
pub fn parse_transactions(lines: &[String]) -> Result<Vec<NewTransaction>> {
    let mut rows = Vec::new();

    for (line_no, record) in records(lines)? {
        if record.len() != TRANSACTION_COLUMNS {
            return Err(invalid(
                "transaction",
                line_no,
                format!("expected {} columns, found {}", TRANSACTION_COLUMNS, record.len()),
            ));
        }

        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        rows.push(NewTransaction {
            transaction_date: parse_export_datetime(&field(0))
                .map_err(|e| invalid("transaction", line_no, e))?,
            transaction_type: field(1),
            order_number: field(2),
            item_id: field(3),
            title: field(4),
            custom_label: field(5),
            quantity: parse_quantity(&field(6))
                .map_err(|e| invalid("transaction", line_no, e))?,
            gross_amount: parse_money(&field(7))
                .map_err(|e| invalid("transaction", line_no, e))?,
        });
    }

    Ok(rows)
}

/// Parse the lines of an earnings export
///
/// Expected columns: date, type, order number, item id, quantity, gross
/// amount, the four fee categories, then the four shipping categories.
/// Fee and shipping cells are normalized to absolute magnitudes; the
/// export flips their signs between report versions.
pub fn parse_earnings(lines: &[String]) -> Result<Vec<NewEarning>> {
    let mut rows = Vec::new();

    for (line_no, record) in records(lines)? {
        if record.len() != EARNING_COLUMNS {
            return Err(invalid(
                "earnings",
                line_no,
                format!("expected {} columns, found {}", EARNING_COLUMNS, record.len()),
            ));
        }

        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let magnitude = |i: usize| -> std::result::Result<Decimal, String> {
            parse_money(&field(i)).map(|d| d.abs())
        };

        rows.push(NewEarning {
            transaction_date: parse_export_datetime(&field(0))
                .map_err(|e| invalid("earnings", line_no, e))?,
            transaction_type: field(1),
            order_number: field(2),
            item_id: field(3),
            quantity: parse_quantity(&field(4)).map_err(|e| invalid("earnings", line_no, e))?,
            gross_amount: parse_money(&field(5)).map_err(|e| invalid("earnings", line_no, e))?,
            fees: FeeAmounts {
                final_value: magnitude(6).map_err(|e| invalid("earnings", line_no, e))?,
                fixed: magnitude(7).map_err(|e| invalid("earnings", line_no, e))?,
                international: magnitude(8).map_err(|e| invalid("earnings", line_no, e))?,
                ad: magnitude(9).map_err(|e| invalid("earnings", line_no, e))?,
            },
            shipping: ShipAmounts {
                regular: magnitude(10).map_err(|e| invalid("earnings", line_no, e))?,
                fine: magnitude(11).map_err(|e| invalid("earnings", line_no, e))?,
                overpay: magnitude(12).map_err(|e| invalid("earnings", line_no, e))?,
                return_label: magnitude(13).map_err(|e| invalid("earnings", line_no, e))?,
            },
        });
    }

    Ok(rows)
}

/// Inclusive (min, max) of a date collection; None when empty
pub fn date_bounds<I>(dates: I) -> Option<(NaiveDate, NaiveDate)>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut iter = dates.into_iter();
    let first = iter.next()?;
    let (mut min, mut max) = (first, first);
    for date in iter {
        min = min.min(date);
        max = max.max(date);
    }
    Some((min, max))
}

/// Read CSV records with their 1-based line numbers
///
/// Blank lines and a leading header row (first cell "date") are skipped.
fn records(lines: &[String]) -> Result<Vec<(u64, csv::StringRecord)>> {
    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let mut out = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| Error::InvalidInput(format!("unreadable CSV row: {}", e)))?;
        let line_no = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record
            .get(0)
            .map(|f| f.eq_ignore_ascii_case("date"))
            .unwrap_or(false)
        {
            continue;
        }

        out.push((line_no, record));
    }
    Ok(out)
}

fn invalid(file: &str, line_no: u64, reason: impl Into<String>) -> Error {
    Error::InvalidInput(format!("{} export line {}: {}", file, line_no, reason.into()))
}

/// Parse a money cell
///
/// Accepts currency symbols, thousands separators, leading minus, and
/// accountant-style parenthesized negatives. Blank cells are zero.
fn parse_money(raw: &str) -> std::result::Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if parenthesized {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err(format!("invalid money value {:?}", raw));
    }

    let value: Decimal = cleaned
        .parse()
        .map_err(|_| format!("invalid money value {:?}", raw))?;
    Ok(if parenthesized { -value } else { value })
}

/// Parse a quantity cell; blank means zero
fn parse_quantity(raw: &str) -> std::result::Result<i64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse()
        .map_err(|_| format!("invalid quantity {:?}", raw))
}

/// Parse an export date cell as a Pacific wall-clock timestamp
fn parse_export_datetime(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    let trimmed = raw.trim();

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }

    Err(format!("unrecognized date {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn money_handles_marketplace_spellings() {
        assert_eq!(parse_money("$1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_money("-$12.00").unwrap(), dec("-12.00"));
        assert_eq!(parse_money("(12.00)").unwrap(), dec("-12.00"));
        assert_eq!(parse_money("($1,234.56)").unwrap(), dec("-1234.56"));
        assert_eq!(parse_money("3.5").unwrap(), dec("3.5"));
        assert_eq!(parse_money("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_money("  ").unwrap(), Decimal::ZERO);
        assert!(parse_money("twelve").is_err());
        assert!(parse_money("$").is_err());
    }

    #[test]
    fn quantity_handles_blanks_and_separators() {
        assert_eq!(parse_quantity("2").unwrap(), 2);
        assert_eq!(parse_quantity("1,000").unwrap(), 1000);
        assert_eq!(parse_quantity("").unwrap(), 0);
        assert!(parse_quantity("two").is_err());
    }

    #[test]
    fn every_date_spelling_parses() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(
            parse_export_datetime("2025-06-02 14:11:05").unwrap(),
            expected.and_hms_opt(14, 11, 5).unwrap()
        );
        assert_eq!(
            parse_export_datetime("06/02/2025 14:11").unwrap(),
            expected.and_hms_opt(14, 11, 0).unwrap()
        );
        for raw in ["2025-06-02", "06/02/2025", "Jun 2, 2025"] {
            assert_eq!(
                parse_export_datetime(raw).unwrap(),
                expected.and_time(NaiveTime::MIN),
                "{}",
                raw
            );
        }
        assert!(parse_export_datetime("June the second").is_err());
    }

    #[test]
    fn transaction_rows_parse_with_quoted_titles() {
        let rows = parse_transactions(&lines(&[
            r#"2025-06-02 14:11:05,Order,ORD-1001,ITM-1,"Widget, blue",SKU-100 x2,2,$24.00"#,
        ]))
        .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.transaction_type, "Order");
        assert_eq!(row.order_number, "ORD-1001");
        assert_eq!(row.title, "Widget, blue");
        assert_eq!(row.custom_label, "SKU-100 x2");
        assert_eq!(row.quantity, 2);
        assert_eq!(row.gross_amount, dec("24.00"));
    }

    #[test]
    fn header_row_and_blank_lines_are_skipped() {
        let rows = parse_transactions(&lines(&[
            "Date,Type,Order number,Item ID,Title,Custom label,Quantity,Gross amount",
            "",
            "2025-06-02,Order,ORD-1,ITM-1,Widget,SKU-1,1,10.00",
        ]))
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_number, "ORD-1");
    }

    #[test]
    fn malformed_row_reports_its_line_number() {
        let err = parse_transactions(&lines(&[
            "2025-06-02,Order,ORD-1,ITM-1,Widget,SKU-1,1,10.00",
            "only,three,cols",
        ]))
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("line 2"), "{}", message);
        assert!(message.contains("columns"), "{}", message);
    }

    #[test]
    fn bad_money_cell_reports_its_line_number() {
        let err = parse_transactions(&lines(&[
            "2025-06-02,Order,ORD-1,ITM-1,Widget,SKU-1,1,oops",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("line 1"), "{}", err);
    }

    #[test]
    fn earnings_fees_and_shipping_become_magnitudes() {
        let rows = parse_earnings(&lines(&[
            "2025-06-02,Order,ORD-1,ITM-1,1,25.00,-2.50,(0.30),0.00,1.10,-5.00,0,0.75,0",
        ]))
        .unwrap();

        let row = &rows[0];
        assert_eq!(row.gross_amount, dec("25.00"));
        assert_eq!(row.fees.final_value, dec("2.50"));
        assert_eq!(row.fees.fixed, dec("0.30"));
        assert_eq!(row.fees.ad, dec("1.10"));
        assert_eq!(row.shipping.regular, dec("5.00"));
        assert_eq!(row.shipping.overpay, dec("0.75"));
    }

    #[test]
    fn earnings_gross_keeps_its_sign() {
        let rows = parse_earnings(&lines(&[
            "2025-06-02,Refund,ORD-1,ITM-1,1,-25.00,0,0,0,0,0,0,0,0",
        ]))
        .unwrap();
        assert_eq!(rows[0].gross_amount, dec("-25.00"));
    }

    #[test]
    fn date_bounds_covers_min_and_max() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        assert_eq!(date_bounds([d(5), d(2), d(9)]), Some((d(2), d(9))));
        assert_eq!(date_bounds(std::iter::empty::<NaiveDate>()), None);
    }
}
