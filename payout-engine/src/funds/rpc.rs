//! JSON-RPC client for bitcoind-style wallet daemons
//!
//! Speaks JSON-RPC 1.0 over HTTP with basic auth. The daemon answers RPC
//! failures with a non-2xx status *and* a JSON error envelope, so the body is
//! always decoded before the status is considered.

use super::{AddressValidation, FundsService, Payouts, UnspentOutput};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Funds service backed by a wallet daemon's RPC interface
pub struct RpcFundsClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    next_id: AtomicU64,
}

impl std::fmt::Debug for RpcFundsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcFundsClient")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl RpcFundsClient {
    /// Create client from configuration
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(method, id = request.id, "RPC call");

        let mut builder = self.http.post(&self.url).json(&request);
        if !self.user.is_empty() {
            builder = builder.basic_auth(&self.user, Some(&self.password));
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        decode_response(method, status.as_u16(), &body)
    }
}

/// Amount returned by the daemon as a JSON number
#[derive(Debug, Deserialize)]
struct RpcAmount(#[serde(with = "rust_decimal::serde::float")] Decimal);

fn decode_response<T: DeserializeOwned>(method: &str, status: u16, body: &str) -> Result<T> {
    let envelope: RpcResponse<T> = serde_json::from_str(body).map_err(|e| {
        Error::Funds(format!(
            "{}: malformed response (HTTP {}): {}",
            method, status, e
        ))
    })?;

    if let Some(err) = envelope.error {
        return Err(Error::Funds(format!(
            "{} failed ({}): {}",
            method, err.code, err.message
        )));
    }

    envelope
        .result
        .ok_or_else(|| Error::Funds(format!("{} returned no result", method)))
}

/// Daemons expect JSON numbers for amounts
fn amount_value(amount: Decimal) -> Result<Value> {
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| Error::Funds(format!("amount {} not representable", amount)))
}

fn payouts_value(payouts: &Payouts) -> Result<Value> {
    let mut map = serde_json::Map::with_capacity(payouts.len());
    for (address, amount) in payouts {
        map.insert(address.clone(), amount_value(*amount)?);
    }
    Ok(Value::Object(map))
}

#[async_trait]
impl FundsService for RpcFundsClient {
    async fn get_balance(&self, account: &str) -> Result<Decimal> {
        let balance: RpcAmount = self.call("getbalance", vec![json!(account)]).await?;
        Ok(balance.0)
    }

    async fn get_account_address(&self, account: &str) -> Result<String> {
        self.call("getaccountaddress", vec![json!(account)]).await
    }

    async fn validate_address(&self, address: &str) -> Result<AddressValidation> {
        self.call("validateaddress", vec![json!(address)]).await
    }

    async fn list_unspent(&self, min_confirmations: u32) -> Result<Vec<UnspentOutput>> {
        self.call("listunspent", vec![json!(min_confirmations)]).await
    }

    async fn addresses_by_account(&self, account: &str) -> Result<Vec<String>> {
        self.call("getaddressesbyaccount", vec![json!(account)]).await
    }

    async fn send_many(&self, account: &str, payouts: &Payouts) -> Result<String> {
        self.call("sendmany", vec![json!(account), payouts_value(payouts)?])
            .await
    }

    async fn set_tx_fee(&self, fee_per_kb: Decimal) -> Result<()> {
        let accepted: bool = self.call("settxfee", vec![amount_value(fee_per_kb)?]).await?;
        if accepted {
            Ok(())
        } else {
            Err(Error::Funds(format!("settxfee rejected {}", fee_per_kb)))
        }
    }
}
