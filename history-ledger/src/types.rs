//! Core types for the history ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One disbursement cycle as recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// When the cycle drained the pending registry
    pub timestamp: DateTime<Utc>,

    /// Total amount disbursed in the cycle
    pub amount: Decimal,
}

impl PaymentRecord {
    /// Create new record
    pub fn new(timestamp: DateTime<Utc>, amount: Decimal) -> Self {
        Self { timestamp, amount }
    }

    /// Sentinel record written at engine start
    pub fn sentinel(start_time: DateTime<Utc>) -> Self {
        Self::new(start_time, Decimal::ZERO)
    }
}

impl fmt::Display for PaymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.amount, self.timestamp.to_rfc3339())
    }
}
