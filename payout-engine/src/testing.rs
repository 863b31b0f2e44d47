//! Shared fixtures for unit tests

use crate::{Capabilities, Config, MockFundsService, PayoutEngine};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Memory-only config: 10% payout, 0.01 per kB fee, 60 s cycles
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.faucet.payout_ratio = Decimal::new(1, 1);
    config.faucet.tx_fee = Decimal::new(1, 2);
    config.faucet.interval_secs = 60;
    config.faucet.history_file = None;
    config
}

/// Engine over a mock wallet holding `balance` at `mFaucet`
pub(crate) async fn test_engine(balance: Decimal) -> (PayoutEngine, Arc<MockFundsService>) {
    let funds = Arc::new(MockFundsService::new(balance, "mFaucet"));
    let engine = PayoutEngine::new(&test_config(), funds.clone(), Capabilities::none())
        .await
        .expect("test engine");
    (engine, funds)
}
