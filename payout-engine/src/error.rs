//! Error types for the payout engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for payout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payout engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Address rejected by the funds service
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Address already has a pending payout this cycle
    #[error("address ({0}) already queued")]
    DuplicateAddress(String),

    /// Requester already has a pending payout this cycle
    #[error("requester ({0}) already queued")]
    DuplicateRequester(String),

    /// Computed payout is not positive
    #[error("Out of {coin}")]
    InsufficientFunds {
        /// Coin name shown to the requester
        coin: String,
    },

    /// Human verification rejected the request
    #[error("Human verification failed")]
    HumanVerificationFailed,

    /// History ledger error (checkpoint read/write)
    #[error("Ledger error: {0}")]
    Ledger(#[from] history_ledger::Error),

    /// Funds service call failed
    #[error("Funds service error: {0}")]
    Funds(String),

    /// Batch transfer failed after the registry was drained
    #[error("Disbursement of {total} to {recipients} addresses failed: {reason}")]
    Disbursement {
        /// Drained total
        total: Decimal,
        /// Number of drained addresses
        recipients: usize,
        /// Underlying failure
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Status code the HTTP layer answers with
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidAddress(_) | Error::DuplicateAddress(_) | Error::DuplicateRequester(_) => {
                400
            }
            Error::HumanVerificationFailed => 403,
            Error::InsufficientFunds { .. } => 595,
            _ => 500,
        }
    }

    /// Whether the error was caused by the request rather than the engine
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAddress(_) => "invalid_address",
            Error::DuplicateAddress(_) => "duplicate_address",
            Error::DuplicateRequester(_) => "duplicate_requester",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::HumanVerificationFailed => "human_verification",
            Error::Ledger(_) => "ledger",
            Error::Funds(_) => "funds",
            Error::Disbursement { .. } => "disbursement",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Funds(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
