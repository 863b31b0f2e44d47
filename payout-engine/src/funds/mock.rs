//! In-memory funds service
//!
//! Used by tests and by the server when `funds.mock_enabled` is set. Transfers
//! debit the mock balance immediately.

use super::{AddressValidation, FundsService, Payouts, UnspentOutput};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info, warn};

type Hook = Box<dyn FnOnce() + Send>;

/// Mock wallet daemon
pub struct MockFundsService {
    balance: Mutex<Decimal>,
    address: Mutex<String>,
    account_addresses: Mutex<Vec<String>>,
    unspent: Mutex<Vec<UnspentOutput>>,
    rejected: Mutex<HashSet<String>>,
    sends: Mutex<Vec<(String, Payouts)>>,
    tx_fee: Mutex<Option<Decimal>>,
    fail_sends: AtomicBool,
    balance_calls: AtomicUsize,
    address_calls: AtomicUsize,
    unspent_calls: AtomicUsize,
    balance_hook: Mutex<Option<Hook>>,
}

impl std::fmt::Debug for MockFundsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFundsService")
            .field("balance", &*self.balance.lock())
            .field("address", &*self.address.lock())
            .field("sends", &self.sends.lock().len())
            .finish_non_exhaustive()
    }
}

impl MockFundsService {
    /// Wallet holding `balance` in a single confirmed output at `address`
    pub fn new(balance: Decimal, address: impl Into<String>) -> Self {
        let address = address.into();
        let utxo = UnspentOutput {
            address: address.clone(),
            txid: "00".repeat(32),
            vout: 0,
            amount: balance,
            confirmations: 6,
        };

        Self {
            balance: Mutex::new(balance),
            address: Mutex::new(address.clone()),
            account_addresses: Mutex::new(vec![address]),
            unspent: Mutex::new(vec![utxo]),
            rejected: Mutex::new(HashSet::new()),
            sends: Mutex::new(Vec::new()),
            tx_fee: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
            balance_calls: AtomicUsize::new(0),
            address_calls: AtomicUsize::new(0),
            unspent_calls: AtomicUsize::new(0),
            balance_hook: Mutex::new(None),
        }
    }

    /// Overwrite the balance (e.g. a donation arrived)
    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock() = balance;
    }

    /// Current mock balance
    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }

    /// Hand out a new receiving address from now on
    pub fn rotate_address(&self, address: impl Into<String>) {
        let address = address.into();
        self.account_addresses.lock().push(address.clone());
        *self.address.lock() = address;
    }

    /// Add an unspent output to the wallet
    pub fn add_unspent(&self, output: UnspentOutput) {
        self.unspent.lock().push(output);
    }

    /// Make `validate_address` reject `address`
    pub fn reject_address(&self, address: impl Into<String>) {
        self.rejected.lock().insert(address.into());
    }

    /// Make subsequent `send_many` calls fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` during the next `get_balance` call
    pub fn on_next_balance(&self, hook: impl FnOnce() + Send + 'static) {
        *self.balance_hook.lock() = Some(Box::new(hook));
    }

    /// Transfers executed so far
    pub fn sends(&self) -> Vec<(String, Payouts)> {
        self.sends.lock().clone()
    }

    /// Fee set through `set_tx_fee`
    pub fn tx_fee(&self) -> Option<Decimal> {
        *self.tx_fee.lock()
    }

    /// Number of `get_balance` calls
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_account_address` calls
    pub fn address_calls(&self) -> usize {
        self.address_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_unspent` calls
    pub fn unspent_calls(&self) -> usize {
        self.unspent_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundsService for MockFundsService {
    async fn get_balance(&self, _account: &str) -> Result<Decimal> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.balance_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(*self.balance.lock())
    }

    async fn get_account_address(&self, _account: &str) -> Result<String> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.lock().clone())
    }

    async fn validate_address(&self, address: &str) -> Result<AddressValidation> {
        let well_formed = !address.is_empty() && address.chars().all(|c| c.is_ascii_alphanumeric());
        Ok(AddressValidation {
            is_valid: well_formed && !self.rejected.lock().contains(address),
        })
    }

    async fn list_unspent(&self, min_confirmations: u32) -> Result<Vec<UnspentOutput>> {
        self.unspent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .unspent
            .lock()
            .iter()
            .filter(|u| u.confirmations >= u64::from(min_confirmations))
            .cloned()
            .collect())
    }

    async fn addresses_by_account(&self, _account: &str) -> Result<Vec<String>> {
        Ok(self.account_addresses.lock().clone())
    }

    async fn send_many(&self, account: &str, payouts: &Payouts) -> Result<String> {
        let total: Decimal = payouts.values().copied().sum();

        if self.fail_sends.load(Ordering::SeqCst) {
            warn!("Mock funds: simulated transfer failure");
            return Err(Error::Funds("simulated sendmany failure".to_string()));
        }

        let mut balance = self.balance.lock();
        if total > *balance {
            return Err(Error::Funds(format!(
                "insufficient funds: need {}, have {}",
                total, *balance
            )));
        }
        *balance -= total;
        drop(balance);

        let mut sends = self.sends.lock();
        sends.push((account.to_string(), payouts.clone()));
        let txid = format!("MOCK-{:04}", sends.len());

        info!(
            "Mock funds: sent {} to {} addresses ({})",
            total,
            payouts.len(),
            txid
        );

        Ok(txid)
    }

    async fn set_tx_fee(&self, fee_per_kb: Decimal) -> Result<()> {
        *self.tx_fee.lock() = Some(fee_per_kb);
        Ok(())
    }
}
