//! Cleaned ledger rows and their classification enums
//!
//! The transform stage rewrites raw marketplace rows into one normalized
//! ledger row per order-bearing transaction. Fee and shipping amounts are
//! stored as absolute magnitudes; the row amount keeps its sign.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum number of SKU slots carried on one ledger row
pub const MAX_SKU_SLOTS: usize = 10;

/// Business action recorded on a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sale,
    Cancel,
    Return,
    Request,
    Case,
    Dispute,
}

impl Action {
    /// Every action, in canonical display order
    pub const ALL: [Action; 6] = [
        Action::Sale,
        Action::Cancel,
        Action::Return,
        Action::Request,
        Action::Case,
        Action::Dispute,
    ];

    /// Stable lowercase token stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sale => "sale",
            Action::Cancel => "cancel",
            Action::Return => "return",
            Action::Request => "request",
            Action::Case => "case",
            Action::Dispute => "dispute",
        }
    }

    /// Parse the stored token back into an action
    pub fn parse(value: &str) -> Option<Action> {
        match value {
            "sale" => Some(Action::Sale),
            "cancel" => Some(Action::Cancel),
            "return" => Some(Action::Return),
            "request" => Some(Action::Request),
            "case" => Some(Action::Case),
            "dispute" => Some(Action::Dispute),
            _ => None,
        }
    }

    /// Dashboard-facing label, matching the series names charts expect
    pub fn label(&self) -> &'static str {
        match self {
            Action::Sale => "Sales",
            Action::Cancel => "Cancel",
            Action::Return => "Return",
            Action::Request => "Request",
            Action::Case => "Case",
            Action::Dispute => "Dispute",
        }
    }

    /// Parse a query-string token; accepts the stored token or the label
    pub fn from_param(value: &str) -> Option<Action> {
        match value.to_ascii_lowercase().as_str() {
            "sale" | "sales" => Some(Action::Sale),
            "cancel" => Some(Action::Cancel),
            "return" | "returns" => Some(Action::Return),
            "request" => Some(Action::Request),
            "case" => Some(Action::Case),
            "dispute" => Some(Action::Dispute),
            _ => None,
        }
    }
}

/// Shipping cost categories tracked on earnings rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipType {
    /// Ordinary outbound label cost
    Regular,
    /// Carrier adjustment charged after the fact
    Fine,
    /// Buyer shipping overpayment credited back to the seller
    Overpay,
    /// Return label purchased for the buyer
    ReturnLabel,
}

impl ShipType {
    pub const ALL: [ShipType; 4] = [
        ShipType::Regular,
        ShipType::Fine,
        ShipType::Overpay,
        ShipType::ReturnLabel,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ShipType::Regular => "Regular",
            ShipType::Fine => "Fine",
            ShipType::Overpay => "Overpay",
            ShipType::ReturnLabel => "Return label",
        }
    }

    pub fn from_param(value: &str) -> Option<ShipType> {
        match value.to_ascii_lowercase().as_str() {
            "regular" => Some(ShipType::Regular),
            "fine" => Some(ShipType::Fine),
            "overpay" => Some(ShipType::Overpay),
            "return_label" | "return-label" => Some(ShipType::ReturnLabel),
            _ => None,
        }
    }
}

/// Marketplace fee categories tracked on earnings rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    /// Percentage fee on the sale amount
    FinalValue,
    /// Flat per-order fee
    Fixed,
    /// Cross-border surcharge
    International,
    /// Promoted listing fee
    Ad,
}

impl FeeType {
    pub const ALL: [FeeType; 4] = [
        FeeType::FinalValue,
        FeeType::Fixed,
        FeeType::International,
        FeeType::Ad,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeeType::FinalValue => "Final value fee",
            FeeType::Fixed => "Fixed fee",
            FeeType::International => "International fee",
            FeeType::Ad => "Ad fee",
        }
    }

    pub fn from_param(value: &str) -> Option<FeeType> {
        match value.to_ascii_lowercase().as_str() {
            "final_value" | "final-value" => Some(FeeType::FinalValue),
            "fixed" => Some(FeeType::Fixed),
            "international" => Some(FeeType::International),
            "ad" => Some(FeeType::Ad),
            _ => None,
        }
    }
}

/// The four fee amounts carried on a row, stored as absolute magnitudes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeAmounts {
    pub final_value: Decimal,
    pub fixed: Decimal,
    pub international: Decimal,
    pub ad: Decimal,
}

impl FeeAmounts {
    pub fn get(&self, fee: FeeType) -> Decimal {
        match fee {
            FeeType::FinalValue => self.final_value,
            FeeType::Fixed => self.fixed,
            FeeType::International => self.international,
            FeeType::Ad => self.ad,
        }
    }

    /// Sum of all four categories
    pub fn total(&self) -> Decimal {
        self.final_value + self.fixed + self.international + self.ad
    }

    /// Normalize every category to its absolute magnitude
    pub fn abs(&self) -> FeeAmounts {
        FeeAmounts {
            final_value: self.final_value.abs(),
            fixed: self.fixed.abs(),
            international: self.international.abs(),
            ad: self.ad.abs(),
        }
    }
}

/// The four shipping amounts carried on a row, stored as absolute magnitudes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipAmounts {
    pub regular: Decimal,
    pub fine: Decimal,
    pub overpay: Decimal,
    pub return_label: Decimal,
}

impl ShipAmounts {
    pub fn get(&self, ship: ShipType) -> Decimal {
        match ship {
            ShipType::Regular => self.regular,
            ShipType::Fine => self.fine,
            ShipType::Overpay => self.overpay,
            ShipType::ReturnLabel => self.return_label,
        }
    }

    /// Net shipping cost: overpay is money coming back, so it subtracts
    pub fn combined_cost(&self) -> Decimal {
        self.regular + self.fine + self.return_label - self.overpay
    }

    /// Normalize every category to its absolute magnitude
    pub fn abs(&self) -> ShipAmounts {
        ShipAmounts {
            regular: self.regular.abs(),
            fine: self.fine.abs(),
            overpay: self.overpay.abs(),
            return_label: self.return_label.abs(),
        }
    }
}

/// One resolved SKU with its per-unit quantity on a ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSlot {
    pub sku: String,
    pub quantity: i64,
}

/// One normalized ledger row produced by the transform stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedTransaction {
    /// Row id, zero before insertion
    pub id: i64,
    /// Batch that produced this row
    pub batch_id: Uuid,
    pub seller: String,
    pub order_number: String,
    pub item_id: String,
    /// Business action derived from the raw transaction type
    pub action: Action,
    /// Pacific calendar date of the transaction
    pub ledger_date: NaiveDate,
    /// Units sold or returned on this row
    pub quantity: i64,
    /// Signed gross amount from the export
    pub amount: Decimal,
    /// Resolved SKU slots, at most MAX_SKU_SLOTS
    pub slots: Vec<SkuSlot>,
    pub fees: FeeAmounts,
    pub shipping: ShipAmounts,
}

impl CleanedTransaction {
    /// Cost of goods for this row
    ///
    /// Each slot contributes `unit_cost * slot_quantity * row_quantity`;
    /// SKUs missing from the cost map contribute zero.
    pub fn cogs(&self, unit_costs: &HashMap<String, Decimal>) -> Decimal {
        self.slots
            .iter()
            .map(|slot| {
                let cost = unit_costs
                    .get(&slot.sku.to_uppercase())
                    .copied()
                    .unwrap_or_default();
                cost * Decimal::from(slot.quantity) * Decimal::from(self.quantity)
            })
            .sum()
    }
}
