//! Faucet payout server binary

use anyhow::Context;
use payout_engine::{
    Capabilities, Config, DisbursementScheduler, FundsService, MockFundsService, PayoutEngine,
    RpcFundsClient,
};
use prometheus::{Encoder, TextEncoder};
use rust_decimal::Decimal;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    tracing::info!(
        "Starting {} v{}",
        config.service_name,
        config.service_version
    );

    let funds: Arc<dyn FundsService> = if config.funds.mock_enabled {
        tracing::warn!("Using in-memory mock funds service");
        Arc::new(MockFundsService::new(Decimal::from(100), "mFaucetMockAddress"))
    } else {
        Arc::new(RpcFundsClient::new(&config.rpc)?)
    };

    let engine = Arc::new(PayoutEngine::new(&config, funds, Capabilities::none()).await?);
    let scheduler = DisbursementScheduler::for_engine(engine.clone()).spawn();

    let status = engine.public_status().await?;
    tracing::info!("Faucet status: {}", serde_json::to_string(&status)?);

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down faucet server");
    scheduler.abort();

    if let Err(e) = engine.persist_history().await {
        tracing::error!("Final history checkpoint failed: {}", e);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&engine.metrics().registry().gather(), &mut buffer)?;
    tracing::info!("Final metrics:\n{}", String::from_utf8_lossy(&buffer));

    Ok(())
}
