//! In-memory history ledger
//!
//! Holds the ordered record sequence and an optional checkpoint. The
//! in-memory copy is the ledger; the checkpoint only exists so a restart can
//! pick up where the previous process stopped.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use history_ledger::{CheckpointStorage, HistoryLedger, PaymentRecord};
//! use rust_decimal::Decimal;
//!
//! fn main() -> history_ledger::Result<()> {
//!     let storage = CheckpointStorage::new("./data/history.bin");
//!     let mut ledger = HistoryLedger::open(storage, Utc::now());
//!
//!     ledger.append(PaymentRecord::new(Utc::now(), Decimal::new(3, 0)))?;
//!     ledger.persist()?;
//!
//!     println!("Total paid: {}", ledger.total_paid());
//!     Ok(())
//! }
//! ```

use crate::{
    error::{Error, Result},
    storage::CheckpointStorage,
    types::PaymentRecord,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Append-only payout history
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    /// Ordered records, index 0 is the sentinel
    records: Vec<PaymentRecord>,

    /// Checkpoint target (none = memory only)
    storage: Option<CheckpointStorage>,
}

impl HistoryLedger {
    /// Create a memory-only ledger holding just the sentinel
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            records: vec![PaymentRecord::sentinel(start_time)],
            storage: None,
        }
    }

    /// Open a ledger backed by `storage`, recovering the last checkpoint
    ///
    /// An unreadable checkpoint is logged and ignored; the ledger then starts
    /// from the sentinel at `start_time`.
    pub fn open(storage: CheckpointStorage, start_time: DateTime<Utc>) -> Self {
        let records = match storage.load() {
            Ok(Some(records)) => {
                tracing::info!(
                    path = %storage.path().display(),
                    records = records.len(),
                    "Recovered payout history"
                );
                records
            }
            Ok(None) => vec![PaymentRecord::sentinel(start_time)],
            Err(e) => {
                tracing::warn!(
                    path = %storage.path().display(),
                    "Couldn't read history checkpoint, starting fresh: {}",
                    e
                );
                vec![PaymentRecord::sentinel(start_time)]
            }
        };

        Self {
            records,
            storage: Some(storage),
        }
    }

    /// Append a disbursement record
    pub fn append(&mut self, record: PaymentRecord) -> Result<()> {
        if record.amount <= Decimal::ZERO {
            return Err(Error::Corrupt(format!(
                "refusing to record non-positive disbursement {}",
                record
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Write the full ledger to its checkpoint (no-op when memory only)
    pub fn persist(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.write(&self.records),
            None => Ok(()),
        }
    }

    /// Checkpoint target, if any
    pub fn storage(&self) -> Option<&CheckpointStorage> {
        self.storage.as_ref()
    }

    /// All records, sentinel first
    pub fn records(&self) -> &[PaymentRecord] {
        &self.records
    }

    /// Number of records including the sentinel
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of recorded disbursements (sentinel excluded)
    pub fn payout_count(&self) -> usize {
        self.records.len().saturating_sub(1)
    }

    /// Most recent record (the sentinel when nothing was paid yet)
    pub fn last(&self) -> &PaymentRecord {
        // records is never empty: constructors seed the sentinel and the
        // checkpoint loader rejects empty files
        &self.records[self.records.len() - 1]
    }

    /// Time the ledger was started
    pub fn start_time(&self) -> DateTime<Utc> {
        self.records[0].timestamp
    }

    /// Sum of all disbursements
    pub fn total_paid(&self) -> Decimal {
        self.records.iter().map(|r| r.amount).sum()
    }
}
