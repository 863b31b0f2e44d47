//! Disbursement scheduler
//!
//! Fires a disbursement cycle every `interval`. The next firing is armed
//! before the cycle runs, and each cycle runs in its own task, so a slow or
//! failed cycle never delays the following one.

use crate::{engine::PayoutEngine, types::CycleOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periodic driver of `PayoutEngine::run_cycle`
#[derive(Debug)]
pub struct DisbursementScheduler {
    engine: Arc<PayoutEngine>,
    interval: Duration,
}

impl DisbursementScheduler {
    /// Create a scheduler firing every `interval`
    pub fn new(engine: Arc<PayoutEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Scheduler using the engine's configured interval
    pub fn for_engine(engine: Arc<PayoutEngine>) -> Self {
        let interval = engine.interval();
        Self::new(engine, interval)
    }

    /// Time between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start scheduler loop (runs for the engine's lifetime)
    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting disbursement scheduler"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                match engine.run_cycle().await {
                    Ok(CycleOutcome::Disbursed(d)) => {
                        debug!(cycle = d.cycle, txid = %d.txid, "Disbursement cycle finished");
                    }
                    Ok(CycleOutcome::Empty { cycle }) => {
                        debug!(cycle, "Disbursement cycle had nothing to send");
                    }
                    Err(e) => {
                        error!("Disbursement cycle failed: {}", e);
                    }
                }
            });
        }
    }

    /// Run the loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(Arc::new(self).start())
    }
}
