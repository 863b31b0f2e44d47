//! Configuration for the payout engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Payout engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Wallet daemon RPC endpoint
    pub rpc: RpcConfig,

    /// Funds service selection
    pub funds: FundsConfig,

    /// Faucet accounting parameters
    pub faucet: FaucetConfig,

    /// QR code generation for the donation address
    pub qrcode: QrCodeConfig,

    /// Human verification
    pub captcha: CaptchaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "faucet-server".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rpc: RpcConfig::default(),
            funds: FundsConfig::default(),
            faucet: FaucetConfig::default(),
            qrcode: QrCodeConfig::default(),
            captcha: CaptchaConfig::default(),
        }
    }
}

/// Wallet daemon RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint URL
    pub url: String,

    /// Basic auth user
    pub user: String,

    /// Basic auth password
    pub password: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Funds service selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FundsConfig {
    /// Use the in-memory mock instead of the RPC daemon
    pub mock_enabled: bool,
}

/// How the public donation address is refreshed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// Ask the daemon again whenever the pay status changes
    #[default]
    Rotate,
    /// Ask once, then keep the address for the engine's lifetime
    Reuse,
}

/// Faucet accounting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Wallet account funding the faucet
    pub account: String,

    /// Share of available funds paid per request (0.0 - 1.0]
    pub payout_ratio: Decimal,

    /// Transaction fee per kilobyte
    pub tx_fee: Decimal,

    /// Seconds between disbursement cycles
    pub interval_secs: u64,

    /// Upper bound for a single payout
    pub max_payout: Decimal,

    /// Donation address refresh policy
    pub address_mode: AddressMode,

    /// Fixed donation address; overrides `address_mode` when set
    pub fixed_address: Option<String>,

    /// History checkpoint file (none = memory only)
    pub history_file: Option<PathBuf>,

    /// Confirmations required for an output to count as spendable
    pub min_confirmations: u32,

    /// Decimal places kept on payout amounts
    pub amount_precision: u32,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            account: "faucet".to_string(),
            payout_ratio: Decimal::new(1, 2), // 1% of available funds
            tx_fee: Decimal::new(1, 4),       // 0.0001 per kB
            interval_secs: 600,
            max_payout: Decimal::from(1000),
            address_mode: AddressMode::Rotate,
            fixed_address: None,
            history_file: Some(PathBuf::from("./data/faucet/history.bin")),
            min_confirmations: 1,
            amount_precision: 8, // satoshi
        }
    }
}

/// QR code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrCodeConfig {
    /// Regenerate the QR image whenever the donation address changes
    pub generate: bool,

    /// Output directory
    pub path: PathBuf,

    /// Output file name
    pub file: String,
}

impl Default for QrCodeConfig {
    fn default() -> Self {
        Self {
            generate: false,
            path: PathBuf::from("./static"),
            file: "donate.png".to_string(),
        }
    }
}

/// Human verification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Require human verification before admission
    pub enabled: bool,

    /// Public (site) key
    pub public_key: Option<String>,

    /// Private (secret) key
    pub private_key: Option<String>,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> crate::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        if let Ok(url) = std::env::var("FAUCET_RPC_URL") {
            config.rpc.url = url;
        }

        if let Ok(user) = std::env::var("FAUCET_RPC_USER") {
            config.rpc.user = user;
        }

        if let Ok(password) = std::env::var("FAUCET_RPC_PASSWORD") {
            config.rpc.password = password;
        }

        if let Ok(mock) = std::env::var("FAUCET_MOCK_FUNDS") {
            config.funds.mock_enabled = parse_bool("FAUCET_MOCK_FUNDS", &mock)?;
        }

        if let Ok(account) = std::env::var("FAUCET_ACCOUNT") {
            config.faucet.account = account;
        }

        if let Ok(ratio) = std::env::var("FAUCET_PAYOUT_RATIO") {
            config.faucet.payout_ratio = parse_decimal("FAUCET_PAYOUT_RATIO", &ratio)?;
        }

        if let Ok(fee) = std::env::var("FAUCET_TX_FEE") {
            config.faucet.tx_fee = parse_decimal("FAUCET_TX_FEE", &fee)?;
        }

        if let Ok(max) = std::env::var("FAUCET_MAX_PAYOUT") {
            config.faucet.max_payout = parse_decimal("FAUCET_MAX_PAYOUT", &max)?;
        }

        if let Ok(secs) = std::env::var("FAUCET_INTERVAL_SECS") {
            config.faucet.interval_secs = secs.parse().map_err(|e| {
                crate::Error::Config(format!("FAUCET_INTERVAL_SECS: {}", e))
            })?;
        }

        if let Ok(file) = std::env::var("FAUCET_HISTORY_FILE") {
            config.faucet.history_file = if file.is_empty() {
                None
            } else {
                Some(PathBuf::from(file))
            };
        }

        if let Ok(address) = std::env::var("FAUCET_FIXED_ADDRESS") {
            config.faucet.fixed_address = Some(address);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine can't run with
    pub fn validate(&self) -> crate::Result<()> {
        let faucet = &self.faucet;

        if faucet.interval_secs == 0 {
            return Err(crate::Error::Config(
                "faucet.interval_secs must be positive".to_string(),
            ));
        }

        if faucet.payout_ratio <= Decimal::ZERO || faucet.payout_ratio > Decimal::ONE {
            return Err(crate::Error::Config(format!(
                "faucet.payout_ratio must be in (0, 1], got {}",
                faucet.payout_ratio
            )));
        }

        if faucet.tx_fee < Decimal::ZERO {
            return Err(crate::Error::Config(format!(
                "faucet.tx_fee must not be negative, got {}",
                faucet.tx_fee
            )));
        }

        if faucet.max_payout <= Decimal::ZERO {
            return Err(crate::Error::Config(format!(
                "faucet.max_payout must be positive, got {}",
                faucet.max_payout
            )));
        }

        if faucet.amount_precision > 28 {
            return Err(crate::Error::Config(format!(
                "faucet.amount_precision must be at most 28, got {}",
                faucet.amount_precision
            )));
        }

        if self.qrcode.generate && self.qrcode.file.is_empty() {
            return Err(crate::Error::Config(
                "qrcode.file is required when qrcode.generate is set".to_string(),
            ));
        }

        if self.captcha.enabled && self.captcha.private_key.is_none() {
            return Err(crate::Error::Config(
                "captcha.private_key is required when captcha.enabled is set".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_decimal(name: &str, value: &str) -> crate::Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| crate::Error::Config(format!("{}: {}", name, e)))
}

/// Accepts the usual yes/no spellings
fn parse_bool(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Ok(true),
        "no" | "n" | "false" | "f" | "0" => Ok(false),
        other => Err(crate::Error::Config(format!(
            "{}: expected a boolean, got '{}'",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "faucet-server");
        assert_eq!(config.faucet.address_mode, AddressMode::Rotate);
        assert_eq!(config.faucet.amount_precision, 8);
        assert!(!config.funds.mock_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [faucet]
            account = "donations"
            payout_ratio = "0.1"
            interval_secs = 60
            address_mode = "reuse"

            [funds]
            mock_enabled = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.faucet.account, "donations");
        assert_eq!(config.faucet.payout_ratio, Decimal::new(1, 1));
        assert_eq!(config.faucet.interval_secs, 60);
        assert_eq!(config.faucet.address_mode, AddressMode::Reuse);
        assert!(config.funds.mock_enabled);
        // untouched sections keep their defaults
        assert_eq!(config.faucet.max_payout, Decimal::from(1000));
        assert_eq!(config.qrcode.file, "donate.png");
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("faucet.toml");
        std::fs::write(&path, "[faucet]\ninterval_secs = 30\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.faucet.interval_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = Config::default();
        config.faucet.payout_ratio = Decimal::new(15, 1);
        assert!(config.validate().is_err());

        config.faucet.payout_ratio = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.faucet.interval_secs = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_captcha_needs_key() {
        let mut config = Config::default();
        config.captcha.enabled = true;
        assert!(config.validate().is_err());

        config.captcha.private_key = Some("secret".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(parse_bool("X", " t ").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
