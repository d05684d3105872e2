//! SKU resolution engine
//!
//! Custom labels are free text typed by listers, so resolution happens in
//! layers: tokenize the label into (SKU, quantity) pairs, validate each
//! token against the catalog, fall back to the correction memory, and
//! only then surface the token to the operator with fuzzy suggestions.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use strsim::jaro_winkler;

use crate::models::{CorrectionMap, PendingSkuItem, RawTransactionItem};

/// Most suggestions ever attached to one pending item
pub const MAX_SUGGESTIONS: usize = 5;
/// Similarity floor below which a catalog SKU is not worth suggesting
const SUGGESTION_MIN_SCORE: f64 = 0.3;
/// Fuzzy matching only looks at the head of long tokens
const FUZZY_PROBE_LEN: usize = 20;

// Label token shapes: "ABC*2" attaches a quantity, "x2"/"X2"/"*2" modifies
// the preceding SKU, anything else alphanumeric-ish is a SKU candidate.
static STAR_QTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_./-]*)\*(\d+)$").expect("valid regex"));
static QTY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[xX*](\d+)$").expect("valid regex"));
static SKU_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_./-]*$").expect("valid regex"));

/// One line produced by resolving a label
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    /// Canonical (upper-cased) SKU
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// True when the correction memory supplied this line
    pub auto_fixed: bool,
}

/// Everything resolving one label yields
#[derive(Debug, Default)]
pub struct LabelResolution {
    /// Lines to persist under the transaction
    pub lines: Vec<ResolvedLine>,
    /// Items surfaced to the operator, including auto-fixed ones
    pub pending: Vec<PendingSkuItem>,
    /// True when at least one token still needs a human decision
    pub needs_fix: bool,
}

/// Tokenize a custom label into (SKU candidate, quantity) pairs
///
/// Quantities default to 1. Tokens that fit none of the shapes are label
/// noise and are dropped; a label made only of noise yields no pairs.
pub fn extract_pairs(label: &str) -> Vec<(String, i64)> {
    // (sku, qty, quantity was explicit)
    let mut pairs: Vec<(String, i64, bool)> = Vec::new();

    for token in label.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '+')) {
        if token.is_empty() {
            continue;
        }

        if let Some(caps) = STAR_QTY.captures(token) {
            let qty = caps[2].parse().unwrap_or(1);
            pairs.push((caps[1].to_string(), qty, true));
            continue;
        }

        if let Some(caps) = QTY_TOKEN.captures(token) {
            if let Some(last) = pairs.last_mut() {
                if !last.2 {
                    last.1 = caps[1].parse().unwrap_or(1);
                    last.2 = true;
                }
            }
            continue;
        }

        if SKU_TOKEN.is_match(token) {
            pairs.push((token.to_string(), 1, false));
        }
    }

    pairs.into_iter().map(|(sku, qty, _)| (sku, qty)).collect()
}

/// Resolver for one parse run
///
/// Holds the catalog SKU set and correction memory loaded at the start of
/// the run, so resolution itself never touches the database.
pub struct SkuResolver<'a> {
    catalog: &'a HashSet<String>,
    corrections: &'a CorrectionMap,
    strict_catalog: bool,
}

impl<'a> SkuResolver<'a> {
    pub fn new(
        catalog: &'a HashSet<String>,
        corrections: &'a CorrectionMap,
        strict_catalog: bool,
    ) -> Self {
        Self {
            catalog,
            corrections,
            strict_catalog,
        }
    }

    /// Whether a token passes catalog validation
    ///
    /// An empty catalog accepts everything unless strict mode is on; a
    /// fresh deployment should not block its very first upload.
    pub fn catalog_accepts(&self, sku: &str) -> bool {
        if self.catalog.is_empty() {
            return !self.strict_catalog;
        }
        self.catalog.contains(&sku.to_uppercase())
    }

    /// Resolve one custom label against catalog and correction memory
    pub fn resolve_label(
        &self,
        transaction_id: i64,
        custom_label: &str,
        gross_amount: Decimal,
    ) -> LabelResolution {
        let pairs = extract_pairs(custom_label);
        let mut resolution = LabelResolution::default();

        if pairs.is_empty() {
            // Unextractable labels remember their fixes under an empty
            // bad_sku, so a confirmed one resolves itself from then on.
            if let Some((correct_sku, correct_qty)) = self.corrections.lookup(custom_label, "") {
                resolution.lines.push(ResolvedLine {
                    sku: correct_sku.to_string(),
                    quantity: correct_qty,
                    unit_price: RawTransactionItem::compute_unit_price(gross_amount, correct_qty),
                    auto_fixed: true,
                });
                resolution.pending.push(PendingSkuItem {
                    transaction_id,
                    custom_label: custom_label.to_string(),
                    bad_sku: String::new(),
                    bad_qty: "0".to_string(),
                    suggestions: Vec::new(),
                    auto_fixed: true,
                });
                return resolution;
            }

            // Nothing extractable at all; give the operator the label
            // itself as the fuzzy probe.
            resolution.needs_fix = true;
            resolution.pending.push(PendingSkuItem {
                transaction_id,
                custom_label: custom_label.to_string(),
                bad_sku: String::new(),
                bad_qty: "0".to_string(),
                suggestions: self.suggestions_for(custom_label),
                auto_fixed: false,
            });
            return resolution;
        }

        for (sku, qty) in pairs {
            if self.catalog_accepts(&sku) {
                resolution.lines.push(ResolvedLine {
                    sku: sku.to_uppercase(),
                    quantity: qty,
                    unit_price: RawTransactionItem::compute_unit_price(gross_amount, qty),
                    auto_fixed: false,
                });
            } else if let Some((correct_sku, correct_qty)) =
                self.corrections.lookup(custom_label, &sku)
            {
                resolution.lines.push(ResolvedLine {
                    sku: correct_sku.to_string(),
                    quantity: correct_qty,
                    unit_price: RawTransactionItem::compute_unit_price(gross_amount, correct_qty),
                    auto_fixed: true,
                });
                // Surfaced for review, but not counted as needing a fix.
                resolution.pending.push(PendingSkuItem {
                    transaction_id,
                    custom_label: custom_label.to_string(),
                    bad_sku: sku,
                    bad_qty: qty.to_string(),
                    suggestions: Vec::new(),
                    auto_fixed: true,
                });
            } else {
                resolution.needs_fix = true;
                resolution.pending.push(PendingSkuItem {
                    transaction_id,
                    custom_label: custom_label.to_string(),
                    bad_sku: sku.clone(),
                    bad_qty: qty.to_string(),
                    suggestions: self.suggestions_for(&sku),
                    auto_fixed: false,
                });
            }
        }

        resolution
    }

    /// Catalog SKUs ranked by similarity to a token, best first
    pub fn suggestions_for(&self, token: &str) -> Vec<String> {
        let probe: String = token.to_uppercase().chars().take(FUZZY_PROBE_LEN).collect();
        if probe.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &String)> = self
            .catalog
            .iter()
            .map(|sku| (jaro_winkler(&probe, sku), sku))
            .filter(|(score, _)| *score >= SUGGESTION_MIN_SCORE)
            .collect();

        // Ties break alphabetically so suggestion order is stable.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        scored.truncate(MAX_SUGGESTIONS);
        scored.into_iter().map(|(_, sku)| sku.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn catalog(skus: &[&str]) -> HashSet<String> {
        skus.iter().map(|s| s.to_uppercase()).collect()
    }

    fn correction(label: &str, bad: &str, good: &str, qty: i64) -> crate::models::SkuCorrection {
        crate::models::SkuCorrection {
            custom_label: label.to_string(),
            bad_sku: bad.to_string(),
            correct_sku: good.to_string(),
            correct_qty: qty,
            confirmed_by: "ops".to_string(),
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn extraction_handles_quantity_markers() {
        assert_eq!(extract_pairs("SKU-100 x2"), vec![("SKU-100".to_string(), 2)]);
        assert_eq!(extract_pairs("SKU-100 X2"), vec![("SKU-100".to_string(), 2)]);
        assert_eq!(extract_pairs("ABC*3"), vec![("ABC".to_string(), 3)]);
        assert_eq!(extract_pairs("SKU-7 *4"), vec![("SKU-7".to_string(), 4)]);
        assert_eq!(extract_pairs("SKU-9"), vec![("SKU-9".to_string(), 1)]);
    }

    #[test]
    fn extraction_splits_on_separators() {
        assert_eq!(
            extract_pairs("SKU-100 x2; SKU-200, SKU-300+SKU-400"),
            vec![
                ("SKU-100".to_string(), 2),
                ("SKU-200".to_string(), 1),
                ("SKU-300".to_string(), 1),
                ("SKU-400".to_string(), 1),
            ]
        );
    }

    #[test]
    fn extraction_drops_noise_tokens() {
        assert_eq!(extract_pairs("(clearance) SKU-1"), vec![("SKU-1".to_string(), 1)]);
        assert!(extract_pairs("???").is_empty());
        assert!(extract_pairs("").is_empty());
        // A dangling quantity marker with no SKU before it is noise
        assert!(extract_pairs("x2").is_empty());
    }

    #[test]
    fn quantity_marker_only_applies_once() {
        assert_eq!(extract_pairs("A x2 x3"), vec![("A".to_string(), 2)]);
    }

    #[test]
    fn known_sku_resolves_case_insensitively() {
        let cat = catalog(&["SKU-100"]);
        let map = CorrectionMap::default();
        let resolver = SkuResolver::new(&cat, &map, false);

        let resolution = resolver.resolve_label(7, "sku-100 x2", dec("24.00"));
        assert!(!resolution.needs_fix);
        assert!(resolution.pending.is_empty());
        assert_eq!(resolution.lines.len(), 1);
        assert_eq!(resolution.lines[0].sku, "SKU-100");
        assert_eq!(resolution.lines[0].quantity, 2);
        assert_eq!(resolution.lines[0].unit_price, dec("12.00000"));
        assert!(!resolution.lines[0].auto_fixed);
    }

    #[test]
    fn unknown_sku_becomes_pending_with_ranked_suggestions() {
        let cat = catalog(&["SKU-100", "SKU-200", "WIDGET-9"]);
        let map = CorrectionMap::default();
        let resolver = SkuResolver::new(&cat, &map, false);

        let resolution = resolver.resolve_label(3, "SKU-1O0 x2", dec("10.00"));
        assert!(resolution.needs_fix);
        assert!(resolution.lines.is_empty());
        assert_eq!(resolution.pending.len(), 1);

        let pending = &resolution.pending[0];
        assert_eq!(pending.transaction_id, 3);
        assert_eq!(pending.bad_sku, "SKU-1O0");
        assert_eq!(pending.bad_qty, "2");
        assert!(!pending.auto_fixed);
        assert_eq!(pending.suggestions.first().map(String::as_str), Some("SKU-100"));
    }

    #[test]
    fn correction_memory_auto_fixes_without_counting_as_pending_work() {
        let cat = catalog(&["SKU-1000"]);
        let corrections =
            CorrectionMap::from_rows(&[correction("SKU-100 x2", "SKU-100", "SKU-1000", 2)]);
        let resolver = SkuResolver::new(&cat, &corrections, false);

        let resolution = resolver.resolve_label(5, "SKU-100 x2", dec("24.00"));
        assert!(!resolution.needs_fix, "auto-fixed rows still parse clean");
        assert_eq!(resolution.lines.len(), 1);
        assert_eq!(resolution.lines[0].sku, "SKU-1000");
        assert_eq!(resolution.lines[0].quantity, 2);
        assert!(resolution.lines[0].auto_fixed);

        // The fix is surfaced for review
        assert_eq!(resolution.pending.len(), 1);
        assert!(resolution.pending[0].auto_fixed);
        assert_eq!(resolution.pending[0].bad_sku, "SKU-100");
    }

    #[test]
    fn empty_catalog_accepts_everything_unless_strict() {
        let cat = HashSet::new();
        let map = CorrectionMap::default();

        let lenient = SkuResolver::new(&cat, &map, false);
        let resolution = lenient.resolve_label(1, "ANYTHING x3", dec("9.00"));
        assert!(!resolution.needs_fix);
        assert_eq!(resolution.lines[0].sku, "ANYTHING");

        let strict = SkuResolver::new(&cat, &map, true);
        let resolution = strict.resolve_label(1, "ANYTHING x3", dec("9.00"));
        assert!(resolution.needs_fix);
        assert!(resolution.lines.is_empty());
    }

    #[test]
    fn unextractable_label_yields_one_pending_item() {
        let cat = catalog(&["SKU-100"]);
        let map = CorrectionMap::default();
        let resolver = SkuResolver::new(&cat, &map, false);

        let resolution = resolver.resolve_label(9, "???", dec("5.00"));
        assert!(resolution.needs_fix);
        assert_eq!(resolution.pending.len(), 1);
        assert_eq!(resolution.pending[0].bad_sku, "");
        assert_eq!(resolution.pending[0].bad_qty, "0");
    }

    #[test]
    fn unextractable_label_auto_fixes_from_correction_memory() {
        let cat = catalog(&["SKU-100"]);
        let corrections = CorrectionMap::from_rows(&[correction("???", "", "SKU-100", 3)]);
        let resolver = SkuResolver::new(&cat, &corrections, false);

        let resolution = resolver.resolve_label(9, "???", dec("9.00"));
        assert!(!resolution.needs_fix);
        assert_eq!(resolution.lines.len(), 1);
        assert_eq!(resolution.lines[0].sku, "SKU-100");
        assert_eq!(resolution.lines[0].quantity, 3);
        assert!(resolution.lines[0].auto_fixed);
        assert_eq!(resolution.pending.len(), 1);
        assert!(resolution.pending[0].auto_fixed);
    }

    #[test]
    fn suggestions_are_capped_and_filtered() {
        let cat = catalog(&[
            "SKU-1", "SKU-2", "SKU-3", "SKU-4", "SKU-5", "SKU-6", "SKU-7", "ZZZZZ",
        ]);
        let map = CorrectionMap::default();
        let resolver = SkuResolver::new(&cat, &map, false);

        let suggestions = resolver.suggestions_for("SKU-9");
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert!(suggestions.iter().all(|s| s.starts_with("SKU-")));
    }

    #[test]
    fn mixed_labels_resolve_and_flag_in_one_pass() {
        let cat = catalog(&["SKU-100", "SKU-200"]);
        let map = CorrectionMap::default();
        let resolver = SkuResolver::new(&cat, &map, false);

        let resolution = resolver.resolve_label(2, "SKU-100 x1, BAD-1 x2", dec("30.00"));
        assert!(resolution.needs_fix);
        assert_eq!(resolution.lines.len(), 1);
        assert_eq!(resolution.pending.len(), 1);
        assert_eq!(resolution.pending[0].bad_sku, "BAD-1");
    }
}
