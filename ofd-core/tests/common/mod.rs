use chrono::NaiveDateTime;
use ofd_core::config::{Config, EnvironmentType, ReceiptProfile};
use ofd_core::receipt::{
    CommissionInfo, ExtraInfo, LineItem, LineItemPartsFields, Location, MerchantInfo, Payee,
    ReceiptRef,
};
use ofd_core::sign::{ReceiptSigner, SigningError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[allow(dead_code)]
pub fn sample_time() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 9, 24)
        .unwrap()
        .and_hms_opt(15, 40, 10)
        .unwrap()
}

#[allow(dead_code)]
pub fn merchant() -> MerchantInfo {
    MerchantInfo {
        tin: "190261951".into(),
        pinfl: "30747919403015".into(),
        contract_date: "2025-09-21 07:41:09".into(),
        contract_number: "264".into(),
    }
}

#[allow(dead_code)]
pub fn extra_info() -> ExtraInfo {
    ExtraInfo::new("998901234567")
}

#[allow(dead_code)]
pub fn location() -> Location {
    Location::default()
}

#[allow(dead_code)]
pub fn sale_ref() -> ReceiptRef {
    ReceiptRef::new("EZ000000000931", "121", "20250924154010", "596201067621")
}

/// Inline item list with precomputed VAT: 150000/18000 and 250000/30000.
#[allow(dead_code)]
pub fn inline_items() -> Vec<LineItem> {
    vec![
        inline_item("Kompyuter sichqonchasi", "08471012005000000", 150000, 18000),
        inline_item("Klaviatura", "08471012004000000", 250000, 30000),
    ]
}

#[allow(dead_code)]
pub fn inline_item(name: &str, spic: &str, price: i64, vat: i64) -> LineItem {
    LineItem::from_parts(LineItemPartsFields {
        name: name.into(),
        barcode: "1234567890123".into(),
        labels: Vec::new(),
        spic: spic.into(),
        package_code: "1503256".into(),
        good_price: price,
        price,
        quantity: 1.0,
        vat,
        vat_percent: 12,
        discount: 0,
        other: 0,
        voucher: 0,
        payee: Payee::Commission(merchant().commission()),
    })
}

#[allow(dead_code)]
pub fn commission() -> CommissionInfo {
    merchant().commission()
}

#[allow(dead_code)]
pub fn profile_json() -> &'static str {
    r#"{
        "merchant": {"TIN": "190261951", "PINFL": "30747919403015",
                     "ContractDate": "2025-09-21 07:41:09", "ContractNumber": "264"},
        "marketplace": {"name": "My Marketplace", "address": "Toshkent, Chilonzor 1",
                        "ep_number": "EP-0001", "receipt_number": "R-0001"},
        "sellers": [
            {"id": "s1", "TIN": "190261951", "PINFL": "30747919403015", "HasVAT": true},
            {"id": "s2", "TIN": "311439965", "HasVAT": false}
        ],
        "phone_number": "998901234567",
        "payment_type": "card"
    }"#
}

#[allow(dead_code)]
pub fn profile() -> ReceiptProfile {
    serde_json::from_str(profile_json()).expect("profile fixture")
}

#[allow(dead_code)]
pub fn config_for(state_dir: &Path, endpoint: &str) -> Config {
    Config::new(EnvironmentType::Test, "unused.crt", "unused.key")
        .with_state_dir(state_dir)
        .with_endpoint(endpoint)
}

/// Stand-in signer: prefixes the document and counts calls.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeSigner {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeSigner {
    pub const PREFIX: &'static [u8] = b"CMS:";

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReceiptSigner for FakeSigner {
    fn sign(&self, document: &[u8]) -> Result<Vec<u8>, SigningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Self::PREFIX.to_vec();
        out.extend_from_slice(document);
        Ok(out)
    }
}

#[allow(dead_code)]
pub struct FailingSigner;

impl ReceiptSigner for FailingSigner {
    fn sign(&self, _document: &[u8]) -> Result<Vec<u8>, SigningError> {
        Err(SigningError::Failed {
            status: "exit status: 1".into(),
            stderr: "unable to load signing key".into(),
        })
    }
}
