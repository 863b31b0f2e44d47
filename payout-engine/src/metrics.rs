//! Metrics collection for observability
//!
//! Prometheus metrics for the payout engine. Each engine owns its registry so
//! several engines (and tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `faucet_admissions_total` - Payout requests admitted
//! - `faucet_rejections_total{reason}` - Payout requests rejected, by reason
//! - `faucet_read_retries_total` - Optimistic payout computations retried
//! - `faucet_cycles_total` - Disbursement cycles run
//! - `faucet_disbursed_amount_total` - Sum of disbursed amounts
//! - `faucet_pending_entries` - Addresses waiting for the next cycle
//! - `faucet_persist_failures_total` - Failed checkpoint writes
//! - `faucet_send_failures_total` - Failed batch transfers

use prometheus::{Counter, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Admitted requests
    pub admissions_total: IntCounter,

    /// Rejected requests by reason
    pub rejections_total: IntCounterVec,

    /// Optimistic read retries
    pub read_retries_total: IntCounter,

    /// Cycles run
    pub cycles_total: IntCounter,

    /// Disbursed amount
    pub disbursed_amount: Counter,

    /// Pending registry size
    pub pending_entries: IntGauge,

    /// Checkpoint write failures
    pub persist_failures_total: IntCounter,

    /// Batch transfer failures
    pub send_failures_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let admissions_total =
            IntCounter::new("faucet_admissions_total", "Payout requests admitted")?;
        registry.register(Box::new(admissions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("faucet_rejections_total", "Payout requests rejected"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let read_retries_total = IntCounter::new(
            "faucet_read_retries_total",
            "Optimistic payout computations retried",
        )?;
        registry.register(Box::new(read_retries_total.clone()))?;

        let cycles_total = IntCounter::new("faucet_cycles_total", "Disbursement cycles run")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let disbursed_amount =
            Counter::new("faucet_disbursed_amount_total", "Sum of disbursed amounts")?;
        registry.register(Box::new(disbursed_amount.clone()))?;

        let pending_entries = IntGauge::new(
            "faucet_pending_entries",
            "Addresses waiting for the next cycle",
        )?;
        registry.register(Box::new(pending_entries.clone()))?;

        let persist_failures_total =
            IntCounter::new("faucet_persist_failures_total", "Failed checkpoint writes")?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        let send_failures_total =
            IntCounter::new("faucet_send_failures_total", "Failed batch transfers")?;
        registry.register(Box::new(send_failures_total.clone()))?;

        Ok(Self {
            admissions_total,
            rejections_total,
            read_retries_total,
            cycles_total,
            disbursed_amount,
            pending_entries,
            persist_failures_total,
            send_failures_total,
            registry,
        })
    }

    /// Record an admitted request
    pub fn record_admission(&self, pending_entries: usize) {
        self.admissions_total.inc();
        self.pending_entries.set(pending_entries as i64);
    }

    /// Record a rejected request
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record an optimistic read retry
    pub fn record_read_retry(&self) {
        self.read_retries_total.inc();
    }

    /// Record a cycle that drained `amount`
    pub fn record_cycle(&self, amount: Decimal) {
        self.cycles_total.inc();
        self.pending_entries.set(0);
        if let Some(amount) = amount.to_f64() {
            if amount > 0.0 {
                self.disbursed_amount.inc_by(amount);
            }
        }
    }

    /// Record a failed checkpoint write
    pub fn record_persist_failure(&self) {
        self.persist_failures_total.inc();
    }

    /// Record a failed batch transfer
    pub fn record_send_failure(&self) {
        self.send_failures_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
