//! Raw export rows as persisted at upload time
//!
//! Raw rows keep the export's own vocabulary (transaction type tokens,
//! wall-clock timestamps). Classification into ledger actions happens in
//! the transform stage, never at upload.

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{Action, FeeAmounts, ShipAmounts};

/// Transaction type vocabulary of the marketplace export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Order,
    Refund,
    Claim,
    Cancel,
    Request,
    Dispute,
    /// Anything the export emits that the pipeline does not classify
    Other,
}

impl TransactionKind {
    /// Classify the raw export token; matching is trimmed and case-insensitive
    pub fn from_export(token: &str) -> TransactionKind {
        match token.trim().to_ascii_lowercase().as_str() {
            "order" => TransactionKind::Order,
            "refund" => TransactionKind::Refund,
            "claim" => TransactionKind::Claim,
            "cancel" | "cancellation" => TransactionKind::Cancel,
            "request" => TransactionKind::Request,
            "dispute" | "payment dispute" => TransactionKind::Dispute,
            _ => TransactionKind::Other,
        }
    }

    /// Rows of these kinds carry custom labels that need SKU resolution
    pub fn is_order_bearing(&self) -> bool {
        matches!(
            self,
            TransactionKind::Order | TransactionKind::Refund | TransactionKind::Claim
        )
    }

    /// Ledger action this kind maps to; `Other` rows never reach the ledger
    pub fn action(&self) -> Option<Action> {
        match self {
            TransactionKind::Order => Some(Action::Sale),
            TransactionKind::Refund => Some(Action::Return),
            TransactionKind::Claim => Some(Action::Case),
            TransactionKind::Cancel => Some(Action::Cancel),
            TransactionKind::Request => Some(Action::Request),
            TransactionKind::Dispute => Some(Action::Dispute),
            TransactionKind::Other => None,
        }
    }
}

/// Normalized transaction row ready for persistence
///
/// The normalizer produces these before a batch id exists; the upload
/// stage attaches the batch and seller at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub transaction_date: NaiveDateTime,
    pub transaction_type: String,
    pub order_number: String,
    pub item_id: String,
    pub title: String,
    pub custom_label: String,
    pub quantity: i64,
    pub gross_amount: Decimal,
}

/// Normalized earnings row ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewEarning {
    pub transaction_date: NaiveDateTime,
    pub transaction_type: String,
    pub order_number: String,
    pub item_id: String,
    pub quantity: i64,
    pub gross_amount: Decimal,
    pub fees: FeeAmounts,
    pub shipping: ShipAmounts,
}

/// One raw row from the transaction export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Row id, zero before insertion
    pub id: i64,
    pub batch_id: Uuid,
    pub seller: String,
    pub order_number: String,
    pub item_id: String,
    /// Listing title as exported
    pub title: String,
    /// Seller-entered custom label, the SKU resolution input
    pub custom_label: String,
    pub quantity: i64,
    /// Signed gross amount from the export
    pub gross_amount: Decimal,
    /// Raw transaction type token, kept verbatim
    pub transaction_type: String,
    /// Pacific wall-clock timestamp from the export
    pub transaction_date: NaiveDateTime,
}

impl RawTransaction {
    pub fn kind(&self) -> TransactionKind {
        TransactionKind::from_export(&self.transaction_type)
    }
}

/// One resolved SKU line under a raw transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransactionItem {
    /// Row id, zero before insertion
    pub id: i64,
    pub transaction_id: i64,
    pub sku: String,
    pub quantity: i64,
    /// Gross amount divided across units, 5 decimal places
    pub unit_price: Decimal,
}

impl RawTransactionItem {
    pub fn new(transaction_id: i64, sku: String, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            id: 0,
            transaction_id,
            sku,
            quantity,
            unit_price,
        }
    }

    /// Per-unit price for a line: gross amount over quantity, rounded to
    /// 5 decimal places, zero whenever the quantity is not positive.
    pub fn compute_unit_price(gross_amount: Decimal, quantity: i64) -> Decimal {
        if quantity <= 0 {
            return Decimal::ZERO;
        }
        (gross_amount / Decimal::from(quantity))
            .round_dp_with_strategy(5, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// One raw row from the earnings export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEarning {
    /// Row id, zero before insertion
    pub id: i64,
    pub batch_id: Uuid,
    pub seller: String,
    pub order_number: String,
    pub item_id: String,
    pub transaction_type: String,
    pub transaction_date: NaiveDateTime,
    pub quantity: i64,
    pub gross_amount: Decimal,
    /// Fee magnitudes; signs are normalized away at parse time
    pub fees: FeeAmounts,
    /// Shipping magnitudes; signs are normalized away at parse time
    pub shipping: ShipAmounts,
}
