//! Main payout engine
//!
//! Owns every piece of mutable faucet state and exposes the two operations
//! that mutate it: admission (`schedule_payment`) and the disbursement cycle
//! (`run_cycle`).
//!
//! # Consistency
//!
//! All mutable state sits behind one mutex that is never held across an
//! `.await`. Values fetched from the funds service are cached under the
//! pay-status snapshot they were read at. The payout amount is computed
//! optimistically: the snapshot is sampled before the computation and compared
//! again, under the mutex, right before the insert. A moved snapshot means the
//! amount may be stale and the computation is repeated.
//!
//! # Example
//!
//! ```no_run
//! use payout_engine::{Capabilities, Config, MockFundsService, PayoutEngine};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> payout_engine::Result<()> {
//!     let config = Config::default();
//!     let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));
//!     let engine = PayoutEngine::new(&config, funds, Capabilities::none()).await?;
//!
//!     let amount = engine.schedule_payment("mRecipient", "203.0.113.7").await?;
//!     println!("Scheduled {}", amount);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    cache::CachedValue,
    capabilities::{Capabilities, ResolvedCapabilities},
    config::{AddressMode, Config, FaucetConfig},
    fees::FeeEstimator,
    funds::{FundsService, Payouts},
    metrics::Metrics,
    pending::{PendingBatch, PendingRegistry},
    types::*,
    Error, Result,
};
use chrono::{DateTime, Utc};
use history_ledger::{CheckpointStorage, HistoryLedger, PaymentRecord};
use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State guarded by the engine mutex
#[derive(Debug)]
struct EngineState {
    pending: PendingRegistry,
    history: HistoryLedger,
    cycle_count: u64,
    last_cycle_at: DateTime<Utc>,
}

impl EngineState {
    fn snapshot(&self) -> PayStatusSnapshot {
        PayStatusSnapshot {
            history_len: self.history.record_count(),
            pending_total: self.pending.total(),
            cycle_count: self.cycle_count,
        }
    }
}

/// Outcome of the locked commit step of an admission
enum Commit {
    Admitted { pending_entries: usize },
    Retry,
    Rejected(Error),
}

/// Result of the locked drain step of a cycle
struct Drained {
    cycle: u64,
    batch: PendingBatch,
    record: Option<PaymentRecord>,
}

/// Faucet accounting engine
pub struct PayoutEngine {
    /// Remote wallet
    funds: Arc<dyn FundsService>,

    /// Accounting parameters
    config: FaucetConfig,

    /// Fee model for the next disbursement
    fees: FeeEstimator,

    /// Human verification and address rendering
    capabilities: ResolvedCapabilities,

    /// Coin detected from the donation address
    coin: CoinInfo,

    /// Pending registry, throttle, history and counters
    state: Mutex<EngineState>,

    balance_cache: CachedValue<Decimal>,
    address_cache: CachedValue<String>,
    utxo_cache: CachedValue<usize>,

    /// Serializes checkpoint writes of overlapping cycles
    checkpoint_lock: tokio::sync::Mutex<()>,

    /// Prometheus metrics
    metrics: Metrics,
}

impl std::fmt::Debug for PayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutEngine")
            .field("account", &self.config.account)
            .field("coin", &self.coin)
            .field("snapshot", &self.current_snapshot())
            .finish_non_exhaustive()
    }
}

impl PayoutEngine {
    /// Create the engine, recover history and prime the cached reads
    pub async fn new(
        config: &Config,
        funds: Arc<dyn FundsService>,
        capabilities: Capabilities,
    ) -> Result<Self> {
        config.validate()?;
        let capabilities = capabilities.resolve(config)?;
        let faucet = config.faucet.clone();

        debug!(account = %faucet.account, "Building new payout engine");

        if let Some(address) = &faucet.fixed_address {
            if !funds.validate_address(address).await?.is_valid {
                return Err(Error::Config(format!(
                    "faucet.fixed_address {} rejected by funds service",
                    address
                )));
            }
            if capabilities.render_enabled {
                capabilities.renderer.render(address)?;
            }
        }

        let start_time = Utc::now();
        let history = match &faucet.history_file {
            Some(path) => HistoryLedger::open(CheckpointStorage::new(path), start_time),
            None => HistoryLedger::new(start_time),
        };

        let metrics = Metrics::new()
            .map_err(|e| Error::Other(format!("Failed to create metrics: {}", e)))?;

        let mut engine = Self {
            funds,
            fees: FeeEstimator::new(faucet.tx_fee),
            config: faucet,
            capabilities,
            coin: CoinInfo::unknown(),
            state: Mutex::new(EngineState {
                pending: PendingRegistry::new(),
                history,
                cycle_count: 0,
                last_cycle_at: start_time,
            }),
            balance_cache: CachedValue::new(),
            address_cache: CachedValue::new(),
            utxo_cache: CachedValue::new(),
            checkpoint_lock: tokio::sync::Mutex::new(()),
            metrics,
        };

        engine.balance().await?;
        engine.utxo_count().await?;
        let address = engine.public_address().await?;
        engine.coin = CoinInfo::from_address(&address);

        engine.funds.set_tx_fee(engine.config.tx_fee).await?;

        info!(
            coin = %engine.coin.coin,
            address = %address,
            "Started new payout engine"
        );

        Ok(engine)
    }

    // Snapshot and cached reads

    /// Current pay-status snapshot (in-memory only, never suspends)
    pub fn current_snapshot(&self) -> PayStatusSnapshot {
        self.state.lock().snapshot()
    }

    /// Funding account balance
    pub async fn balance(&self) -> Result<Decimal> {
        let stamp = self.current_snapshot();
        self.balance_cache
            .get(stamp, || self.funds.get_balance(&self.config.account))
            .await
    }

    /// Spendable outputs owned by the funding account
    pub async fn utxo_count(&self) -> Result<usize> {
        let stamp = self.current_snapshot();
        self.utxo_cache.get(stamp, || self.fetch_utxo_count()).await
    }

    async fn fetch_utxo_count(&self) -> Result<usize> {
        let owned: HashSet<String> = self
            .funds
            .addresses_by_account(&self.config.account)
            .await?
            .into_iter()
            .collect();
        let unspent = self.funds.list_unspent(self.config.min_confirmations).await?;
        let count = unspent.iter().filter(|u| owned.contains(&u.address)).count();
        debug!(count, "Refreshed UTXO count");
        Ok(count)
    }

    /// Donation address shown to the public
    pub async fn public_address(&self) -> Result<String> {
        if let Some(address) = &self.config.fixed_address {
            return Ok(address.clone());
        }

        if self.config.address_mode == AddressMode::Reuse {
            if let Some(address) = self.address_cache.peek() {
                return Ok(address);
            }
        }

        let stamp = self.current_snapshot();
        self.address_cache.get(stamp, || self.fetch_address()).await
    }

    async fn fetch_address(&self) -> Result<String> {
        let address = self.funds.get_account_address(&self.config.account).await?;
        debug!(address = %address, "Refreshed donation address");
        if self.capabilities.render_enabled {
            self.capabilities.renderer.render(&address)?;
        }
        Ok(address)
    }

    // Availability and payout

    /// Fee estimate for the next disbursement
    ///
    /// `inputs` defaults to the live UTXO count, `outputs` to the pending
    /// entries plus the output not yet committed.
    pub async fn estimate_fee(&self, inputs: Option<usize>, outputs: Option<usize>) -> Result<Decimal> {
        let inputs = match inputs {
            Some(n) => n,
            None => self.utxo_count().await?,
        };
        let outputs = outputs.unwrap_or_else(|| self.pending_len() + 1);
        Ok(self.fees.estimate(inputs, outputs))
    }

    /// Funds not yet promised to anyone, net of the next transfer's fee
    pub async fn available_funds(&self) -> Result<Decimal> {
        let balance = self.balance().await?;
        let inputs = self.utxo_count().await?;

        let (pending_total, pending_len) = {
            let state = self.state.lock();
            (state.pending.total(), state.pending.len())
        };

        let fee = self.fees.estimate(inputs, pending_len + 1);
        Ok((balance - pending_total - fee).max(Decimal::ZERO))
    }

    /// Amount the next admitted request would receive
    pub async fn current_payout(&self) -> Result<Decimal> {
        let available = self.available_funds().await?;
        Ok(self.payout_for(available))
    }

    fn payout_for(&self, available: Decimal) -> Decimal {
        (self.config.payout_ratio * available)
            .min(self.config.max_payout)
            .round_dp_with_strategy(self.config.amount_precision, RoundingStrategy::ToZero)
    }

    // Admission

    /// Validate and enqueue a payout to `address` for `requester`
    pub async fn schedule_payment(&self, address: &str, requester: &str) -> Result<Decimal> {
        let validation = self.funds.validate_address(address).await?;
        if !validation.is_valid {
            return Err(self.reject(Error::InvalidAddress(address.to_string())));
        }

        let precheck = self.state.lock().pending.check_admissible(address, requester);
        if let Err(e) = precheck {
            return Err(self.reject(e));
        }

        let mut attempts = 1u32;
        loop {
            let before = self.current_snapshot();
            let amount = self.current_payout().await?;

            match self.commit(before, address, requester, amount) {
                Commit::Admitted { pending_entries } => {
                    info!(
                        address,
                        requester,
                        amount = %amount,
                        attempts,
                        "Scheduled payment"
                    );
                    self.metrics.record_admission(pending_entries);
                    return Ok(amount);
                }
                Commit::Retry => {
                    debug!(
                        address,
                        attempts,
                        "Pay status moved while computing payout, retrying"
                    );
                    self.metrics.record_read_retry();
                    attempts += 1;
                }
                Commit::Rejected(e) => {
                    if matches!(e, Error::InsufficientFunds { .. }) {
                        warn!(address, "Attempted to schedule a payment with zero funds");
                    }
                    return Err(self.reject(e));
                }
            }
        }
    }

    /// Insert the computed payout if the snapshot did not move since `before`
    fn commit(
        &self,
        before: PayStatusSnapshot,
        address: &str,
        requester: &str,
        amount: Decimal,
    ) -> Commit {
        let mut state = self.state.lock();

        if state.snapshot() != before {
            return Commit::Retry;
        }

        if amount <= Decimal::ZERO {
            return Commit::Rejected(Error::InsufficientFunds {
                coin: self.coin.coin.clone(),
            });
        }

        match state.pending.insert(address, requester, amount) {
            Ok(()) => Commit::Admitted {
                pending_entries: state.pending.len(),
            },
            Err(e) => Commit::Rejected(e),
        }
    }

    fn reject(&self, err: Error) -> Error {
        self.metrics.record_rejection(err.kind());
        debug!(reason = err.kind(), "Payout request rejected: {}", err);
        err
    }

    /// Run the configured human verification for a request
    pub async fn verify_requester(
        &self,
        challenge: &str,
        response: &str,
        remote_ip: &str,
    ) -> Result<()> {
        if !self.capabilities.captcha_enabled {
            return Ok(());
        }

        if self
            .capabilities
            .verifier
            .verify(challenge, response, remote_ip)
            .await?
        {
            Ok(())
        } else {
            Err(self.reject(Error::HumanVerificationFailed))
        }
    }

    /// Markup for the human verification widget (empty when disabled)
    pub fn captcha_html(&self) -> String {
        if self.capabilities.captcha_enabled {
            self.capabilities.verifier.widget_html()
        } else {
            String::new()
        }
    }

    // Disbursement

    /// Run one disbursement cycle: drain, persist, send
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Drained {
            cycle,
            batch,
            record,
        } = self.drain(Utc::now())?;

        self.metrics.record_cycle(batch.total());

        let record = match record {
            Some(record) => record,
            None => {
                debug!(cycle, "Payment period ended with no scheduled payments");
                return Ok(CycleOutcome::Empty { cycle });
            }
        };

        let persisted = match self.persist_history().await {
            Ok(()) => true,
            Err(e) => {
                self.metrics.record_persist_failure();
                error!(
                    cycle,
                    "Failed to write history checkpoint, sending anyway: {}", e
                );
                false
            }
        };

        let recipients = batch.len();
        match self.funds.send_many(&self.config.account, &batch.payouts).await {
            Ok(txid) => {
                info!(
                    cycle,
                    txid = %txid,
                    "Made payments totalling {} to {} addresses",
                    record.amount,
                    recipients
                );
                Ok(CycleOutcome::Disbursed(Disbursement {
                    cycle,
                    record,
                    recipients,
                    txid,
                    persisted,
                }))
            }
            Err(e) => {
                self.metrics.record_send_failure();
                error!(
                    cycle,
                    total = %record.amount,
                    recipients,
                    "Batch transfer failed, drained payouts are unconfirmed: {}",
                    e
                );
                for (address, amount) in &batch.payouts {
                    error!(cycle, address = %address, amount = %amount, "Unconfirmed payout");
                }
                Err(Error::Disbursement {
                    total: record.amount,
                    recipients,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Take the pending registry and record it, in one critical section
    fn drain(&self, now: DateTime<Utc>) -> Result<Drained> {
        self.drain_with(now, HistoryLedger::append)
    }

    /// Drain through `record`; nothing is mutated when `record` fails
    fn drain_with<F>(&self, now: DateTime<Utc>, record: F) -> Result<Drained>
    where
        F: FnOnce(&mut HistoryLedger, PaymentRecord) -> history_ledger::Result<()>,
    {
        let mut state = self.state.lock();

        let entry = if state.pending.is_empty() {
            None
        } else {
            let entry = PaymentRecord::new(now, state.pending.total());
            record(&mut state.history, entry)?;
            Some(entry)
        };

        state.cycle_count += 1;
        state.last_cycle_at = now;

        Ok(Drained {
            cycle: state.cycle_count,
            batch: state.pending.drain(),
            record: entry,
        })
    }

    /// Write the full history to its checkpoint (no-op when memory only)
    pub async fn persist_history(&self) -> Result<()> {
        let _guard = self.checkpoint_lock.lock().await;

        let checkpoint = {
            let state = self.state.lock();
            state
                .history
                .storage()
                .cloned()
                .map(|storage| (storage, state.history.records().to_vec()))
        };

        let Some((storage, records)) = checkpoint else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || storage.write(&records))
            .await
            .map_err(|e| Error::Other(format!("Checkpoint task failed: {}", e)))??;

        Ok(())
    }

    // Status

    /// Read-only summary for external consumers
    pub async fn public_status(&self) -> Result<PublicStatus> {
        let available_funds = self.available_funds().await?;
        let current_payout = self.payout_for(available_funds);
        let current_address = self.public_address().await?;
        let current_time = Utc::now();

        let state = self.state.lock();
        let last = state.history.last();

        Ok(PublicStatus {
            coin: self.coin.coin.clone(),
            symbol: self.coin.symbol.clone(),
            available_funds,
            current_payout,
            start_time: state.history.start_time(),
            last_payout_time: last.timestamp,
            last_payout_total: last.amount,
            total_paid: state.history.total_paid(),
            total_pay_periods: state.cycle_count,
            payout_interval_secs: self.config.interval_secs,
            current_address,
            current_time,
            next_payout_time: state.last_cycle_at + chrono::Duration::seconds(self.interval_secs_i64()),
            next_payout_total: state.pending.total(),
        })
    }

    fn interval_secs_i64(&self) -> i64 {
        i64::try_from(self.config.interval_secs).unwrap_or(i64::MAX)
    }

    // Accessors

    /// Time between disbursement cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    /// Coin detected from the donation address
    pub fn coin(&self) -> &CoinInfo {
        &self.coin
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Cycles run since start
    pub fn cycle_count(&self) -> u64 {
        self.state.lock().cycle_count
    }

    /// Sum of pending payouts
    pub fn pending_total(&self) -> Decimal {
        self.state.lock().pending.total()
    }

    /// Number of pending addresses
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Copy of the pending payouts
    pub fn pending_payouts(&self) -> Payouts {
        self.state.lock().pending.payouts().clone()
    }

    /// Whether `requester` holds a pending entry
    pub fn has_pending_requester(&self, requester: &str) -> bool {
        self.state.lock().pending.has_requester(requester)
    }

    /// Copy of the history records
    pub fn history(&self) -> Vec<PaymentRecord> {
        self.state.lock().history.records().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funds::{MockFundsService, UnspentOutput};
    use crate::testing::{test_config, test_engine};

    #[tokio::test]
    async fn test_engine_primes_caches_and_sets_fee() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;

        assert_eq!(funds.balance_calls(), 1);
        assert_eq!(funds.address_calls(), 1);
        assert_eq!(funds.unspent_calls(), 1);
        assert_eq!(funds.tx_fee(), Some(Decimal::new(1, 2)));
        assert_eq!(engine.coin().coin, "test-coin");
        assert_eq!(engine.cycle_count(), 0);
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_reads_skip_remote_calls() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;

        engine.available_funds().await.unwrap();
        engine.current_payout().await.unwrap();
        engine.public_address().await.unwrap();

        assert_eq!(funds.balance_calls(), 1);
        assert_eq!(funds.unspent_calls(), 1);
        assert_eq!(funds.address_calls(), 1);
    }

    #[tokio::test]
    async fn test_payout_math() {
        // balance 10, fee 0.01 per kB, ratio 0.1, one UTXO
        let (engine, _funds) = test_engine(Decimal::from(10)).await;

        assert_eq!(engine.estimate_fee(None, None).await.unwrap(), Decimal::new(1, 2));
        assert_eq!(engine.available_funds().await.unwrap(), Decimal::new(999, 2));
        assert_eq!(engine.current_payout().await.unwrap(), Decimal::new(999, 3));
    }

    #[tokio::test]
    async fn test_payout_capped() {
        let mut config = test_config();
        config.faucet.max_payout = Decimal::new(5, 1);
        let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));
        let engine = PayoutEngine::new(&config, funds, Capabilities::none()).await.unwrap();

        assert_eq!(engine.current_payout().await.unwrap(), Decimal::new(5, 1));
    }

    #[tokio::test]
    async fn test_payout_truncated_to_precision() {
        let funds = Arc::new(MockFundsService::new(Decimal::new(1_234_567_891, 8), "mFaucet"));
        let engine = PayoutEngine::new(&test_config(), funds, Capabilities::none())
            .await
            .unwrap();

        // (12.34567891 - 0.01) * 0.1 = 1.233567891 -> 1.23356789
        assert_eq!(engine.current_payout().await.unwrap(), Decimal::new(123_356_789, 8));
    }

    #[tokio::test]
    async fn test_available_funds_never_negative() {
        let (engine, _funds) = test_engine(Decimal::new(5, 3)).await;
        assert_eq!(engine.available_funds().await.unwrap(), Decimal::ZERO);
        assert_eq!(engine.current_payout().await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_utxo_count_only_counts_own_addresses() {
        let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));
        funds.add_unspent(UnspentOutput {
            address: "mSomeoneElse".to_string(),
            txid: "ff".repeat(32),
            vout: 1,
            amount: Decimal::ONE,
            confirmations: 10,
        });
        funds.add_unspent(UnspentOutput {
            address: "mFaucet".to_string(),
            txid: "ee".repeat(32),
            vout: 0,
            amount: Decimal::ONE,
            confirmations: 0,
        });

        let engine = PayoutEngine::new(&test_config(), funds, Capabilities::none())
            .await
            .unwrap();

        // the unconfirmed output and the foreign one are ignored
        assert_eq!(engine.utxo_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_schedule_payment_queues_amount() {
        let (engine, _funds) = test_engine(Decimal::from(10)).await;

        let amount = engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        assert_eq!(amount, Decimal::new(999, 3));
        assert_eq!(engine.pending_total(), amount);
        assert!(engine.has_pending_requester("10.0.0.1"));
        assert_eq!(engine.metrics().admissions_total.get(), 1);
    }

    #[tokio::test]
    async fn test_second_payout_sees_first() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;

        let first = engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        let second = engine.schedule_payment("mBob", "10.0.0.2").await.unwrap();

        // 10 - 0.999 - fee(1 in, 2 out) = 8.991; 10% of it
        assert_eq!(first, Decimal::new(999, 3));
        assert_eq!(second, Decimal::new(8991, 4));
        // the pending total moved, so the balance was refetched once
        assert_eq!(funds.balance_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;
        funds.reject_address("mBogus");

        let err = engine.schedule_payment("mBogus", "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        assert_eq!(err.http_status(), 400);
        assert_eq!(engine.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_address_then_requester() {
        let (engine, _funds) = test_engine(Decimal::from(10)).await;

        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();

        let err = engine.schedule_payment("mAlice", "10.0.0.2").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress(_)));

        let err = engine.schedule_payment("mBob", "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateRequester(_)));

        assert_eq!(engine.pending_len(), 1);
        assert_eq!(
            engine
                .metrics()
                .rejections_total
                .with_label_values(&["duplicate_requester"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_insufficient_funds_does_not_mutate() {
        let (engine, _funds) = test_engine(Decimal::new(1, 2)).await;
        let before = engine.current_snapshot();

        let err = engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { ref coin } if coin == "test-coin"));
        assert_eq!(err.http_status(), 595);

        assert_eq!(engine.current_snapshot(), before);
        assert!(!engine.has_pending_requester("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_cycle_drains_and_records() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;
        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        engine.schedule_payment("mBob", "10.0.0.2").await.unwrap();
        let total = engine.pending_total();

        let outcome = engine.run_cycle().await.unwrap();
        match outcome {
            CycleOutcome::Disbursed(d) => {
                assert_eq!(d.cycle, 1);
                assert_eq!(d.recipients, 2);
                assert_eq!(d.record.amount, total);
                assert!(d.persisted);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(engine.pending_len(), 0);
        assert!(!engine.has_pending_requester("10.0.0.1"));
        assert_eq!(engine.history().len(), 2);
        assert_eq!(funds.sends().len(), 1);
        assert_eq!(funds.sends()[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;

        let outcome = engine.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Empty { cycle: 1 });
        assert_eq!(engine.cycle_count(), 1);
        assert_eq!(engine.history().len(), 1);
        assert!(funds.sends().is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_keeps_pending() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;
        let amount = engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        let before = engine.current_snapshot();

        let result = engine.drain_with(Utc::now(), |_, _| {
            Err(history_ledger::Error::Corrupt("disk full".to_string()))
        });
        assert!(matches!(result, Err(Error::Ledger(_))));

        // batch survives for the next cycle
        assert_eq!(engine.current_snapshot(), before);
        assert_eq!(engine.pending_payouts().get("mAlice"), Some(&amount));
        assert!(engine.has_pending_requester("10.0.0.1"));
        assert_eq!(engine.history().len(), 1);

        engine.run_cycle().await.unwrap();
        assert_eq!(engine.history()[1].amount, amount);
        assert_eq!(funds.sends().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_record() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;
        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        funds.fail_sends(true);

        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Disbursement { recipients: 1, .. }));

        // drained entries count as paid: no rollback
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.metrics().send_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_verify_requester_disabled_passes() {
        let (engine, _funds) = test_engine(Decimal::from(10)).await;
        engine.verify_requester("", "", "10.0.0.1").await.unwrap();
        assert_eq!(engine.captcha_html(), "");
    }

    #[tokio::test]
    async fn test_reuse_address_mode_fetches_once() {
        let mut config = test_config();
        config.faucet.address_mode = AddressMode::Reuse;
        let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));
        let engine = PayoutEngine::new(&config, funds.clone(), Capabilities::none())
            .await
            .unwrap();

        funds.rotate_address("mFresh");
        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();

        assert_eq!(engine.public_address().await.unwrap(), "mFaucet");
        assert_eq!(funds.address_calls(), 1);
    }

    #[tokio::test]
    async fn test_rotate_address_mode_follows_snapshot() {
        let (engine, funds) = test_engine(Decimal::from(10)).await;

        funds.rotate_address("mFresh");
        // unchanged snapshot: cached address
        assert_eq!(engine.public_address().await.unwrap(), "mFaucet");

        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        assert_eq!(engine.public_address().await.unwrap(), "mFresh");
    }

    #[tokio::test]
    async fn test_fixed_address_must_be_valid() {
        let mut config = test_config();
        config.faucet.fixed_address = Some("bad address".to_string());
        let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));

        let err = PayoutEngine::new(&config, funds, Capabilities::none())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_fixed_address_never_fetched() {
        let mut config = test_config();
        config.faucet.fixed_address = Some("1BoatSLRHtKNngkdXEeobR76b53LETtpyT".to_string());
        let funds = Arc::new(MockFundsService::new(Decimal::from(10), "mFaucet"));

        let engine = PayoutEngine::new(&config, funds.clone(), Capabilities::none())
            .await
            .unwrap();

        assert_eq!(engine.coin().coin, "BTC");
        assert_eq!(funds.address_calls(), 0);
    }

    #[tokio::test]
    async fn test_public_status_projection() {
        let (engine, _funds) = test_engine(Decimal::from(10)).await;
        engine.schedule_payment("mAlice", "10.0.0.1").await.unwrap();
        let pending = engine.pending_total();

        let status = engine.public_status().await.unwrap();
        assert_eq!(status.coin, "test-coin");
        assert_eq!(status.current_address, "mFaucet");
        assert_eq!(status.next_payout_total, pending);
        assert_eq!(status.total_paid, Decimal::ZERO);
        assert_eq!(status.total_pay_periods, 0);
        assert_eq!(status.last_payout_total, Decimal::ZERO);
        assert_eq!(status.last_payout_time, status.start_time);
        assert_eq!(
            status.next_payout_time,
            status.start_time + chrono::Duration::seconds(60)
        );

        engine.run_cycle().await.unwrap();
        let status = engine.public_status().await.unwrap();
        assert_eq!(status.total_paid, pending);
        assert_eq!(status.last_payout_total, pending);
        assert_eq!(status.total_pay_periods, 1);
        assert_eq!(status.next_payout_total, Decimal::ZERO);
    }
}
