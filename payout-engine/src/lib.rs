//! Payout Engine
//!
//! Accounting core of a cryptocurrency faucet: admits payout requests against
//! the funding wallet's balance and disburses them in periodic batches.
//!
//! # Architecture
//!
//! 1. **Admission**: validate the address, enforce one pending entry per
//!    address and per requester, compute the payout from cached wallet reads
//! 2. **Scheduling**: every interval, drain the pending registry into one
//!    history record
//! 3. **Persistence**: checkpoint the history ledger, keeping one backup
//! 4. **Sending**: one batch transfer through the funds service
//!
//! # Payout
//!
//! ```text
//! fee       = ceil(tx_size(utxos, pending + 1) / 1024) * fee_per_kb
//! available = max(0, balance - pending_total - fee)
//! payout    = min(payout_ratio * available, max_payout)
//! ```
//!
//! Wallet reads are cached under the pay-status snapshot and refetched once
//! the snapshot moves.
//!
//! # Example
//!
//! ```no_run
//! use payout_engine::{Capabilities, Config, DisbursementScheduler, PayoutEngine, RpcFundsClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> payout_engine::Result<()> {
//!     let config = Config::from_env()?;
//!     let funds = Arc::new(RpcFundsClient::new(&config.rpc)?);
//!     let engine = Arc::new(PayoutEngine::new(&config, funds, Capabilities::none()).await?);
//!
//!     let scheduler = DisbursementScheduler::for_engine(engine.clone()).spawn();
//!
//!     let amount = engine.schedule_payment("1BoatSLRHtKNngkdXEeobR76b53LETtpyT", "198.51.100.4").await?;
//!     println!("Queued {}", amount);
//!
//!     scheduler.abort();
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod cache;
pub mod fees;
pub mod pending;
pub mod funds;
pub mod capabilities;
pub mod metrics;
pub mod error;
pub mod config;
pub mod engine;
pub mod scheduler;

#[cfg(test)]
mod testing;

// Re-exports
pub use capabilities::{AddressRenderer, Capabilities, HumanVerifier};
pub use config::Config;
pub use engine::PayoutEngine;
pub use error::{Error, Result};
pub use funds::{FundsService, MockFundsService, RpcFundsClient};
pub use history_ledger::PaymentRecord;
pub use metrics::Metrics;
pub use scheduler::DisbursementScheduler;
pub use types::*;
