//! Domain models for the sales ingestion service

pub mod batch;
pub mod chart;
pub mod correction;
pub mod ledger;
pub mod pending;
pub mod raw;

pub use batch::{BatchStatus, EtlBatch};
pub use chart::{ChartType, Grain, ValueMode};
pub use correction::{CorrectionMap, SkuCorrection};
pub use ledger::{
    Action, CleanedTransaction, FeeAmounts, FeeType, ShipAmounts, ShipType, SkuSlot,
    MAX_SKU_SLOTS,
};
pub use pending::{PendingSkuItem, SkuFix};
pub use raw::{
    NewEarning, NewTransaction, RawEarning, RawTransaction, RawTransactionItem, TransactionKind,
};
