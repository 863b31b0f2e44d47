//! Funds service boundary
//!
//! The engine treats the wallet daemon as a stateless remote oracle: every
//! call is a suspension point and nothing it returns is trusted beyond the
//! pay-status snapshot it was fetched under.

pub mod mock;
pub mod rpc;

use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use mock::MockFundsService;
pub use rpc::RpcFundsClient;

/// Outcome of address validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidation {
    /// Whether the daemon accepts the address
    #[serde(rename = "isvalid")]
    pub is_valid: bool,
}

/// Unspent transaction output as listed by the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Receiving address
    pub address: String,

    /// Funding transaction
    #[serde(default)]
    pub txid: String,

    /// Output index
    #[serde(default)]
    pub vout: u32,

    /// Output value (a JSON number on the wire)
    #[serde(default, with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Confirmation count
    #[serde(default)]
    pub confirmations: u64,
}

/// Batch of payouts keyed by address
pub type Payouts = BTreeMap<String, Decimal>;

/// Remote wallet capabilities consumed by the engine
#[async_trait]
pub trait FundsService: Send + Sync {
    /// Confirmed balance of `account`
    async fn get_balance(&self, account: &str) -> Result<Decimal>;

    /// Current receiving address of `account`
    async fn get_account_address(&self, account: &str) -> Result<String>;

    /// Validate a payout address
    async fn validate_address(&self, address: &str) -> Result<AddressValidation>;

    /// Wallet-wide unspent outputs with at least `min_confirmations`
    async fn list_unspent(&self, min_confirmations: u32) -> Result<Vec<UnspentOutput>>;

    /// Addresses belonging to `account`
    async fn addresses_by_account(&self, account: &str) -> Result<Vec<String>>;

    /// Pay every address in one transaction, returns the transaction id
    async fn send_many(&self, account: &str, payouts: &Payouts) -> Result<String>;

    /// Set the fee per kilobyte used by `send_many`
    async fn set_tx_fee(&self, fee_per_kb: Decimal) -> Result<()>;
}
