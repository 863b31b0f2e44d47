//! Core types for the payout engine

use chrono::{DateTime, Utc};
use history_ledger::PaymentRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version stamp over the engine's mutable state
///
/// Sampled on both sides of a remote call: if it did not move, the values read
/// in between describe one consistent point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayStatusSnapshot {
    /// Records in the history ledger (sentinel included)
    pub history_len: usize,

    /// Sum of pending payouts
    pub pending_total: Decimal,

    /// Disbursement cycles run since start
    pub cycle_count: u64,
}

impl fmt::Display for PayStatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.history_len, self.pending_total, self.cycle_count
        )
    }
}

/// Coin name and symbol shown to requesters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    /// Ticker
    pub coin: String,

    /// Display symbol
    pub symbol: String,
}

impl CoinInfo {
    fn new(coin: &str, symbol: &str) -> Self {
        Self {
            coin: coin.to_string(),
            symbol: symbol.to_string(),
        }
    }

    /// Unrecognised network
    pub fn unknown() -> Self {
        Self::new("UNK", "?")
    }

    /// Guess the network from the address version prefix
    pub fn from_address(address: &str) -> Self {
        match address.chars().next() {
            Some('1') => Self::new("BTC", "\u{0243}"),
            Some('L') => Self::new("LTC", "\u{0141}"),
            Some('D') => Self::new("DOGE", "\u{0189}"),
            Some('N') => Self::new("NAME", "\u{2115}"),
            Some('P') => Self::new("PPC", "\u{2C63}"),
            Some('m') | Some('n') => Self::new("test-coin", "\u{0166}"),
            _ => Self::unknown(),
        }
    }
}

/// Read-only summary for the public pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicStatus {
    /// Coin ticker
    pub coin: String,
    /// Coin symbol
    pub symbol: String,
    /// Funds available for new payouts
    pub available_funds: Decimal,
    /// Amount the next admitted request would receive
    pub current_payout: Decimal,
    /// When the ledger started
    pub start_time: DateTime<Utc>,
    /// Time of the last recorded disbursement
    pub last_payout_time: DateTime<Utc>,
    /// Amount of the last recorded disbursement
    pub last_payout_total: Decimal,
    /// Sum of all recorded disbursements
    pub total_paid: Decimal,
    /// Cycles run since the engine started
    pub total_pay_periods: u64,
    /// Seconds between cycles
    pub payout_interval_secs: u64,
    /// Donation address
    pub current_address: String,
    /// When this status was taken
    pub current_time: DateTime<Utc>,
    /// When the next cycle is due
    pub next_payout_time: DateTime<Utc>,
    /// Amount the next cycle will disburse
    pub next_payout_total: Decimal,
}

/// Successful non-empty disbursement cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Disbursement {
    /// Cycle number
    pub cycle: u64,
    /// Record appended to the history
    pub record: PaymentRecord,
    /// Number of addresses paid
    pub recipients: usize,
    /// Transaction id returned by the funds service
    pub txid: String,
    /// Whether the checkpoint write succeeded
    pub persisted: bool,
}

/// Result of one disbursement cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing was pending; no record, no transfer
    Empty {
        /// Cycle number
        cycle: u64,
    },
    /// Pending payouts were sent
    Disbursed(Disbursement),
}

impl CycleOutcome {
    /// Cycle number
    pub fn cycle(&self) -> u64 {
        match self {
            CycleOutcome::Empty { cycle } => *cycle,
            CycleOutcome::Disbursed(d) => d.cycle,
        }
    }
}
