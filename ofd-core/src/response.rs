//! Post-submission handling: log files, decoded QR URL and handoff chaining.
use std::path::{Path, PathBuf};

use crate::api::{ResponseBody, SubmitResponse};
use crate::qr::unescape_url;
use crate::receipt::ReceiptKind;
use crate::receipt::document::{self, DocumentError};
use crate::state::{HandoffKey, HandoffStore, StoreError};

/// What a processed response left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedResponse {
    pub status: u16,
    pub code: Option<i64>,
    pub message: Option<String>,
    /// Decoded QR URL, when the body carried one.
    pub qr_code_url: Option<String>,
    /// Handoff slot written for a later receipt.
    pub chained: Option<HandoffKey>,
    pub written: Vec<PathBuf>,
}

/// Writes per-kind response artifacts into the logs directory.
///
/// A body that is not JSON is logged as raw text and never fails the run.
#[derive(Debug, Clone)]
pub struct ResponseProcessor<'a> {
    logs_dir: &'a Path,
    store: &'a HandoffStore,
}

impl<'a> ResponseProcessor<'a> {
    pub fn new(logs_dir: &'a Path, store: &'a HandoffStore) -> Self {
        Self { logs_dir, store }
    }

    /// # Errors
    /// Only local I/O failures are reported.
    pub fn process(
        &self,
        kind: ReceiptKind,
        response: &SubmitResponse,
    ) -> Result<ProcessedResponse, StoreError> {
        let stem = kind.log_stem();
        let mut written = Vec::new();

        let log_path = self.logs_dir.join(format!("{stem}_response.log"));
        let log = format!("Status: {}\n{}", response.status(), response.text());
        document::write_atomic(&log_path, log.as_bytes())?;
        written.push(log_path);

        let mut processed = ProcessedResponse {
            status: response.status(),
            code: None,
            message: None,
            qr_code_url: None,
            chained: None,
            written,
        };

        let value = match response.body() {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => {
                tracing::warn!(status = response.status(), "OFD response is not JSON, keeping raw text");
                let raw_path = self.logs_dir.join(format!("{stem}_response_raw.txt"));
                document::write_atomic(&raw_path, text.as_bytes())?;
                processed.written.push(raw_path);
                return Ok(processed);
            }
        };

        let parsed = response.parsed();
        processed.code = parsed.as_ref().and_then(|p| p.code());
        processed.message = parsed.as_ref().and_then(|p| p.message().map(str::to_string));

        let mut stored = value.clone();
        let qr = value
            .get("QRCodeURL")
            .and_then(serde_json::Value::as_str)
            .filter(|url| !url.is_empty())
            .map(unescape_url);
        if let (Some(url), Some(object)) = (qr.as_ref(), stored.as_object_mut()) {
            object.insert("QRCodeURL".into(), serde_json::Value::String(url.clone()));
        }

        let json_path = self.logs_dir.join(format!("{stem}_response.json"));
        document::write_json(&json_path, &stored)?;
        processed.written.push(json_path);

        if let Some(url) = qr {
            tracing::info!(qr_code_url = %url, "QR code URL");
            let qr_path = self.logs_dir.join(format!("{stem}_qrcode_url.txt"));
            document::write_atomic(&qr_path, format!("{url}\n").as_bytes())?;
            processed.written.push(qr_path);
            processed.qr_code_url = Some(url);
        }

        let handoff = match (kind, parsed.as_ref()) {
            (ReceiptKind::Sale, Some(parsed)) => parsed
                .sale_receipt_info()
                .cloned()
                .or_else(|| parsed.reference())
                .map(|reference| (HandoffKey::LastSale, reference)),
            (ReceiptKind::Credit, Some(parsed)) if parsed.is_accepted() => parsed
                .reference()
                .map(|reference| (HandoffKey::LastCredit, reference)),
            _ => None,
        };
        match handoff {
            Some((key, reference)) => {
                let path = self.store.save(key, &reference)?;
                processed.written.push(path);
                processed.chained = Some(key);
            }
            None if matches!(kind, ReceiptKind::Sale | ReceiptKind::Credit) => {
                tracing::warn!(%kind, code = ?processed.code, "response carries no receipt reference, nothing chained");
            }
            None => {}
        }

        Ok(processed)
    }

    /// Record a transport failure next to the other per-kind logs.
    pub fn write_error(&self, kind: ReceiptKind, detail: &str) -> Result<PathBuf, DocumentError> {
        let path = self.logs_dir.join(format!("{}_error.log", kind.log_stem()));
        document::write_atomic(&path, detail.as_bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, HandoffStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HandoffStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn sale_prefers_nested_reference_and_decodes_qr() {
        let (dir, store) = setup();
        let processor = ResponseProcessor::new(dir.path(), &store);
        let body = r#"{
            "Code": 0,
            "TerminalID": "EZ1", "ReceiptSeq": "9", "DateTime": "20250101000000", "FiscalSign": "1",
            "QRCodeURL": "https:\\/\\/ofd.soliq.uz\\/epi?t=EZ000000000931&r=121",
            "SaleReceiptInfo": {"TerminalID": "EZ000000000931", "ReceiptSeq": 121,
                                "DateTime": "20250924154010", "FiscalSign": "596201067621"}
        }"#;
        let processed = processor
            .process(ReceiptKind::Sale, &SubmitResponse::new(200, body))
            .unwrap();

        assert_eq!(processed.chained, Some(HandoffKey::LastSale));
        assert_eq!(
            processed.qr_code_url.as_deref(),
            Some("https://ofd.soliq.uz/epi?t=EZ000000000931&r=121")
        );
        let saved = store.require(HandoffKey::LastSale).unwrap();
        assert_eq!(saved.receipt_seq(), "121");
        assert_eq!(saved.terminal_id(), "EZ000000000931");

        let qr = std::fs::read_to_string(dir.path().join("sale_qrcode_url.txt")).unwrap();
        assert_eq!(qr, "https://ofd.soliq.uz/epi?t=EZ000000000931&r=121\n");
        let log = std::fs::read_to_string(dir.path().join("sale_response.log")).unwrap();
        assert!(log.starts_with("Status: 200\n{"));
        let stored: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("sale_response.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stored["QRCodeURL"], "https://ofd.soliq.uz/epi?t=EZ000000000931&r=121");
    }

    #[test]
    fn credit_chains_only_when_accepted() {
        let (dir, store) = setup();
        let processor = ResponseProcessor::new(dir.path(), &store);
        let rejected = r#"{"Code": 5, "TerminalID": "EZ1", "ReceiptSeq": 7, "DateTime": "d", "FiscalSign": "f"}"#;
        let processed = processor
            .process(ReceiptKind::Credit, &SubmitResponse::new(200, rejected))
            .unwrap();
        assert_eq!(processed.chained, None);
        assert!(store.load(HandoffKey::LastCredit).unwrap().is_none());

        let accepted = r#"{"Code": 0, "TerminalID": "EZ1", "ReceiptSeq": 7, "DateTime": "d", "FiscalSign": "f"}"#;
        let processed = processor
            .process(ReceiptKind::Credit, &SubmitResponse::new(200, accepted))
            .unwrap();
        assert_eq!(processed.chained, Some(HandoffKey::LastCredit));
        assert_eq!(store.require(HandoffKey::LastCredit).unwrap().receipt_seq(), "7");
    }

    #[test]
    fn plain_text_body_is_kept_raw() {
        let (dir, store) = setup();
        let processor = ResponseProcessor::new(dir.path(), &store);
        let processed = processor
            .process(ReceiptKind::Refund, &SubmitResponse::new(500, "Internal Server Error"))
            .unwrap();
        assert_eq!(processed.status, 500);
        assert!(processed.qr_code_url.is_none());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("refund_response_raw.txt")).unwrap(),
            "Internal Server Error"
        );
        assert!(!dir.path().join("refund_response.json").exists());
    }
}
