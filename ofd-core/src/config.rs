//! Configuration, environment selection and the merchant profile.
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

use crate::receipt::{Location, MerchantInfo, PaymentType, TaxiInfo, UnknownSellerPolicy};

/// OFD environment selection.
/// - Test: the operator's integration endpoint (`test.ofd.uz`).
/// - Production: the live tax committee endpoint.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use ofd_core::config::EnvironmentType;
///
/// let env = EnvironmentType::from_str("production")?;
/// assert_eq!(env, EnvironmentType::Production);
/// # Ok::<(), ofd_core::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    Test,
    Production,
}

/// Errors raised while reading configuration inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment type: {input}")]
    InvalidEnvironment { input: String },
    #[error("invalid payment type: {input} (expected cash, card or mix)")]
    InvalidPaymentType { input: String },
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FromStr for EnvironmentType {
    type Err = ConfigError;
    fn from_str(env: &str) -> Result<EnvironmentType, ConfigError> {
        match env.to_ascii_lowercase().as_str() {
            "test" => Ok(EnvironmentType::Test),
            "production" => Ok(EnvironmentType::Production),
            _ => Err(ConfigError::InvalidEnvironment {
                input: env.to_string(),
            }),
        }
    }
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Test => "test",
            EnvironmentType::Production => "production",
        }
    }

    pub fn endpoint_url(&self) -> &'static str {
        match self {
            EnvironmentType::Test => "https://test.ofd.uz/emp/v3/receipt",
            EnvironmentType::Production => "https://txkm.soliq.uz/emp/v3/receipt",
        }
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Run configuration: where to send, what to sign with and where state lives.
///
/// # Examples
/// ```rust
/// use ofd_core::config::{Config, EnvironmentType};
///
/// let config = Config::new(EnvironmentType::Test, "certs/merchant.crt", "certs/merchant.key")
///     .with_state_dir("/var/lib/ofd");
/// assert_eq!(config.endpoint_url(), "https://test.ofd.uz/emp/v3/receipt");
/// assert_eq!(config.logs_dir(), std::path::Path::new("/var/lib/ofd/logs"));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    env: EnvironmentType,
    endpoint_override: Option<String>,
    cert_path: PathBuf,
    key_path: PathBuf,
    state_dir: PathBuf,
    timeout: Duration,
}

impl Config {
    pub fn new(
        env: EnvironmentType,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            env,
            endpoint_override: None,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            state_dir: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_override = Some(url.into());
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn endpoint_url(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.env.endpoint_url())
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Documents, responses, handoff files and the sequence counter.
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Signed artifacts.
    pub fn keys_dir(&self) -> PathBuf {
        self.state_dir.join("keys")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(
            EnvironmentType::Test,
            "certificates/merchant.crt",
            "certificates/merchant.key",
        )
    }
}

/// Seller entry used to resolve `seller_id` on order items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    #[serde(rename = "TIN", default)]
    pub tin: String,
    #[serde(rename = "PINFL", default)]
    pub pinfl: String,
    #[serde(rename = "HasVAT", default = "default_has_vat")]
    pub has_vat: bool,
}

fn default_has_vat() -> bool {
    true
}

/// Marketplace details echoed into `ExtraInfo` on sale receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marketplace {
    pub name: String,
    pub address: String,
    pub ep_number: String,
    pub receipt_number: String,
}

/// Delivery line appended to sale receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    #[serde(default = "default_delivery_name")]
    pub name: String,
    pub price: i64,
    #[serde(default = "default_delivery_code")]
    pub barcode: String,
    #[serde(default = "default_delivery_code")]
    pub spic: String,
    #[serde(default = "default_delivery_package")]
    pub package_code: String,
    #[serde(default = "default_vat_percent")]
    pub vat_percent: u32,
    /// Document holding the courier's `TaxiInfo`.
    #[serde(default)]
    pub taxi_info_file: Option<PathBuf>,
}

fn default_delivery_name() -> String {
    "Maxsulotlarni yetkazib berish xizmati".to_string()
}

fn default_delivery_code() -> String {
    "10112006002000000".to_string()
}

fn default_delivery_package() -> String {
    "1209779".to_string()
}

fn default_vat_percent() -> u32 {
    crate::receipt::vat::STANDARD_VAT_PERCENT
}

impl DeliverySettings {
    /// Reads the courier block; a missing or unreadable document yields empty fields.
    pub fn taxi_info(&self) -> TaxiInfo {
        let Some(path) = self.taxi_info_file.as_deref() else {
            return TaxiInfo::default();
        };
        match std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str::<TaxiInfo>(&raw).ok())
        {
            Some(info) => info,
            None => {
                tracing::warn!(path = %path.display(), "delivery document unavailable, using empty TaxiInfo");
                TaxiInfo::default()
            }
        }
    }
}

/// Merchant-side settings shared by every receipt kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptProfile {
    pub merchant: MerchantInfo,
    #[serde(default)]
    pub marketplace: Option<Marketplace>,
    #[serde(default)]
    pub sellers: Vec<Seller>,
    #[serde(default)]
    pub location: Location,
    pub phone_number: String,
    #[serde(default = "default_payment_type")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub delivery: Option<DeliverySettings>,
    #[serde(default)]
    pub unknown_seller: UnknownSellerPolicy,
}

fn default_payment_type() -> PaymentType {
    PaymentType::Card
}

impl ReceiptProfile {
    /// Load a profile from a JSON file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
