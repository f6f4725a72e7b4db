//! OFD HTTP client and response types.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::receipt::{ReceiptRef, string_or_number};

/// Environment variable that overrides the receipt endpoint.
pub const ENDPOINT_ENV: &str = "OFD_RECEIPT_URL";

/// Errors returned by the OFD client.
#[derive(Error, Debug)]
pub enum OfdError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// OFD receipt endpoint client.
///
/// One POST per receipt, no retries.
///
/// # Examples
/// ```rust,no_run
/// use ofd_core::api::OfdClient;
/// use ofd_core::config::Config;
///
/// let client = OfdClient::new(&Config::default())?;
/// # let _ = client;
/// # Ok::<(), ofd_core::api::OfdError>(())
/// ```
#[derive(Debug, Clone)]
pub struct OfdClient {
    client: Client,
    endpoint: String,
}

impl OfdClient {
    /// Create a client for the configured endpoint; [`ENDPOINT_ENV`] wins when set.
    ///
    /// # Errors
    /// Returns [`OfdError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, OfdError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(OfdError::Http)?;
        let endpoint = resolve_endpoint(config, std::env::var(ENDPOINT_ENV).ok());
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload a signed receipt.
    ///
    /// Any HTTP status is returned as a response; only transport failures are errors.
    ///
    /// # Errors
    /// Returns [`OfdError::Network`] when the request cannot be completed.
    pub async fn submit(&self, signed: &[u8]) -> Result<SubmitResponse, OfdError> {
        tracing::info!(endpoint = %self.endpoint, bytes = signed.len(), "submitting receipt");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(signed.to_vec())
            .send()
            .await
            .map_err(|e| OfdError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OfdError::Network(e.to_string()))?;
        tracing::info!(status = status.as_u16(), "OFD responded");
        Ok(SubmitResponse::new(status.as_u16(), body))
    }
}

fn resolve_endpoint(config: &Config, from_env: Option<String>) -> String {
    from_env
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| config.endpoint_url().to_string())
}

/// Raw OFD reply: status code, body text and its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResponse {
    status: u16,
    text: String,
    body: ResponseBody,
}

/// Response body, JSON when it decodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl SubmitResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        let body = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text.clone()),
        };
        Self { status, text, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body exactly as received.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Typed view of a JSON object body.
    pub fn parsed(&self) -> Option<OfdResponse> {
        self.json()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Fields the OFD returns for a registered receipt. Unknown fields are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfdResponse {
    #[serde(rename = "Code", default)]
    code: Option<i64>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "TerminalID", default)]
    terminal_id: Option<String>,
    #[serde(rename = "ReceiptSeq", default, deserialize_with = "optional_string_or_number")]
    receipt_seq: Option<String>,
    #[serde(rename = "DateTime", default)]
    date_time: Option<String>,
    #[serde(rename = "FiscalSign", default, deserialize_with = "optional_string_or_number")]
    fiscal_sign: Option<String>,
    #[serde(rename = "QRCodeURL", default)]
    qr_code_url: Option<String>,
    #[serde(rename = "SaleReceiptInfo", default)]
    sale_receipt_info: Option<ReceiptRef>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl OfdResponse {
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn terminal_id(&self) -> Option<&str> {
        self.terminal_id.as_deref()
    }

    pub fn receipt_seq(&self) -> Option<&str> {
        self.receipt_seq.as_deref()
    }

    pub fn date_time(&self) -> Option<&str> {
        self.date_time.as_deref()
    }

    pub fn fiscal_sign(&self) -> Option<&str> {
        self.fiscal_sign.as_deref()
    }

    /// QR URL as sent, still escaped.
    pub fn qr_code_url(&self) -> Option<&str> {
        self.qr_code_url.as_deref()
    }

    pub fn sale_receipt_info(&self) -> Option<&ReceiptRef> {
        self.sale_receipt_info.as_ref()
    }

    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }

    pub fn is_accepted(&self) -> bool {
        self.code == Some(0)
    }

    /// Reference built from the top-level fields, if all four are present.
    pub fn reference(&self) -> Option<ReceiptRef> {
        Some(ReceiptRef::new(
            self.terminal_id.clone()?,
            self.receipt_seq.clone()?,
            self.date_time.clone()?,
            self.fiscal_sign.clone()?,
        ))
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(value)| value))
}
