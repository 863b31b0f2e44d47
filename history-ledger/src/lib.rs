//! Payout History Ledger
//!
//! Append-only record of faucet disbursements with a crash-safe on-disk
//! checkpoint.
//!
//! # Architecture
//!
//! - **In-memory ledger**: the ordered `Vec<PaymentRecord>` is the source of
//!   truth for last payout, total paid and start time
//! - **Checkpoint**: the full ledger serialized with bincode; the previous
//!   checkpoint is rotated to `<name>.bak` before every write
//! - **Recovery**: a missing, truncated or corrupt checkpoint falls back to the
//!   sentinel-only ledger at startup
//!
//! # Invariants
//!
//! - Index 0 is always the sentinel record `(start_time, 0)`
//! - Append-only: records are never modified or removed
//! - Only disbursements with a non-zero total are recorded

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod error;

// Re-exports
pub use error::{Error, Result};
pub use types::PaymentRecord;
pub use storage::CheckpointStorage;
pub use ledger::HistoryLedger;
