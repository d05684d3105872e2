//! Operator-facing pending fix items and fix submissions

use serde::{Deserialize, Serialize};

/// One unresolved (or auto-corrected) SKU surfaced to the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSkuItem {
    /// Raw transaction row the token came from
    pub transaction_id: i64,
    /// Custom label the token was extracted from, verbatim
    pub custom_label: String,
    /// Extracted token that failed validation; empty when the label
    /// produced no extractions at all
    pub bad_sku: String,
    /// Extracted quantity, kept as text exactly as it will be echoed back
    /// in a fix request
    pub bad_qty: String,
    /// Catalog SKUs ranked by similarity, best first
    pub suggestions: Vec<String>,
    /// True when correction memory already resolved this line; shown for
    /// review only and not counted as needing a fix
    pub auto_fixed: bool,
}

/// One operator fix submitted against a pending item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuFix {
    pub transaction_id: i64,
    pub custom_label: String,
    pub bad_sku: String,
    #[serde(default)]
    pub bad_qty: String,
    pub correct_sku: String,
    pub correct_qty: i64,
}
