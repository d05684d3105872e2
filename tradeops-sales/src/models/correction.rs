//! Correction memory records and the parse-time lookup map
//!
//! Every operator fix is remembered as a (custom label, bad SKU) pair.
//! Later parses consult the map before bothering the operator again, so
//! the same typo is only ever fixed by hand once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One remembered operator fix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuCorrection {
    /// Custom label the bad SKU was extracted from, verbatim
    pub custom_label: String,
    /// The extracted token that failed catalog validation
    pub bad_sku: String,
    /// Catalog SKU the operator mapped it to
    pub correct_sku: String,
    /// Quantity the operator confirmed for the line
    pub correct_qty: i64,
    /// Operator identifier from the fix request
    pub confirmed_by: String,
    /// When the fix was recorded
    pub confirmed_at: DateTime<Utc>,
}

/// In-memory correction lookup built once per parse run
///
/// Keys are upper-cased so lookups ignore the case of both the label and
/// the extracted token.
#[derive(Debug, Default)]
pub struct CorrectionMap {
    entries: HashMap<(String, String), (String, i64)>,
}

impl CorrectionMap {
    pub fn from_rows(rows: &[SkuCorrection]) -> Self {
        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            entries.insert(
                (row.custom_label.to_uppercase(), row.bad_sku.to_uppercase()),
                (row.correct_sku.clone(), row.correct_qty),
            );
        }
        Self { entries }
    }

    /// Look up a remembered fix for this label and extracted token
    pub fn lookup(&self, custom_label: &str, bad_sku: &str) -> Option<(&str, i64)> {
        self.entries
            .get(&(custom_label.to_uppercase(), bad_sku.to_uppercase()))
            .map(|(sku, qty)| (sku.as_str(), *qty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correction(label: &str, bad: &str, good: &str, qty: i64) -> SkuCorrection {
        SkuCorrection {
            custom_label: label.to_string(),
            bad_sku: bad.to_string(),
            correct_sku: good.to_string(),
            correct_qty: qty,
            confirmed_by: "ops".to_string(),
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn lookup_ignores_case_of_label_and_token() {
        let map = CorrectionMap::from_rows(&[correction("Sku-100 x2", "Sku-100", "SKU-1000", 2)]);
        assert_eq!(map.lookup("SKU-100 X2", "sku-100"), Some(("SKU-1000", 2)));
        assert_eq!(map.lookup("SKU-100 X2", "sku-999"), None);
    }

    #[test]
    fn corrections_are_scoped_to_their_label() {
        let map = CorrectionMap::from_rows(&[correction("label-a", "BAD", "GOOD-A", 1)]);
        assert!(map.lookup("label-b", "BAD").is_none());
    }

    #[test]
    fn later_rows_replace_earlier_ones() {
        let map = CorrectionMap::from_rows(&[
            correction("L", "BAD", "OLD", 1),
            correction("L", "BAD", "NEW", 3),
        ]);
        assert_eq!(map.lookup("L", "BAD"), Some(("NEW", 3)));
        assert_eq!(map.len(), 1);
    }
}
