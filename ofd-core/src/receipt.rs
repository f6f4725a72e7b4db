//! Receipt domain types and builders.
mod builder;
pub mod document;
pub mod order;
mod payment;
pub mod vat;
pub use builder::{ReceiptBuilder, RequiredReceiptFields};
pub use payment::{Payment, PaymentSplit, PaymentType};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Quantities travel as thousandths of a unit.
pub const AMOUNT_SCALE: f64 = 1000.0;

/// Receipt-related errors.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("item {index} references unknown seller {seller_id:?}")]
    UnknownSeller { index: usize, seller_id: String },
}

/// Structured validation error with field-level issues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("receipt validation failed: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

/// Single validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: ReceiptField,
    pub kind: ValidationKind,
    pub line_item_index: Option<usize>,
}

#[non_exhaustive]
/// Field associated with a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptField {
    Items,
    ItemName,
    ItemPrice,
    ItemGoodPrice,
    ItemVat,
    ItemAmount,
    ItemAdjustments,
    TotalPrice,
    TotalVat,
    ReceivedCash,
    ReceivedCard,
    AdvanceContractId,
    ReferenceTerminalId,
    ReferenceReceiptSeq,
    ReferenceDateTime,
    ReferenceFiscalSign,
}

#[non_exhaustive]
/// Classification of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    Empty,
    OutOfRange,
    Mismatch,
}

/// Wire discriminant carried in `ReceiptType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReceiptType {
    Sale = 0,
    Advance = 1,
    Credit = 2,
}

impl From<ReceiptType> for u8 {
    fn from(value: ReceiptType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ReceiptType {
    type Error = String;
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ReceiptType::Sale),
            1 => Ok(ReceiptType::Advance),
            2 => Ok(ReceiptType::Credit),
            other => Err(format!("unknown ReceiptType {other}")),
        }
    }
}

/// The five receipt flavours, without their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiptKind {
    Sale,
    Refund,
    Advance,
    Credit,
    CreditRefund,
}

impl ReceiptKind {
    pub const ALL: [ReceiptKind; 5] = [
        ReceiptKind::Sale,
        ReceiptKind::Refund,
        ReceiptKind::Advance,
        ReceiptKind::Credit,
        ReceiptKind::CreditRefund,
    ];

    pub fn receipt_type(&self) -> ReceiptType {
        match self {
            ReceiptKind::Sale | ReceiptKind::Refund => ReceiptType::Sale,
            ReceiptKind::Advance => ReceiptType::Advance,
            ReceiptKind::Credit | ReceiptKind::CreditRefund => ReceiptType::Credit,
        }
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, ReceiptKind::Refund | ReceiptKind::CreditRefund)
    }

    /// Credit receipts go out without `MerchantInfo`.
    pub fn carries_merchant_info(&self) -> bool {
        !matches!(self, ReceiptKind::Credit | ReceiptKind::CreditRefund)
    }

    /// File stem of the unsigned document and the signed artifact.
    pub fn document_name(&self) -> &'static str {
        match self {
            ReceiptKind::Sale => "ReceiptInfo",
            ReceiptKind::Refund => "RefundReceipt",
            ReceiptKind::Advance => "AdvanceReceipt",
            ReceiptKind::Credit => "CreditReceipt",
            ReceiptKind::CreditRefund => "CreditRefund",
        }
    }

    /// Prefix of the per-run log files.
    pub fn log_stem(&self) -> &'static str {
        match self {
            ReceiptKind::Sale => "sale",
            ReceiptKind::Refund => "refund",
            ReceiptKind::Advance => "advance",
            ReceiptKind::Credit => "credit",
            ReceiptKind::CreditRefund => "credit_refund",
        }
    }
}

impl std::fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.log_stem())
    }
}

/// Receipt flavour with the cross-reference block it requires.
///
/// # Examples
/// ```rust
/// use ofd_core::receipt::{ReceiptKind, ReceiptRef, ReceiptVariant};
///
/// let sale = ReceiptRef::new("EZ000000000931", "121", "20250924154010", "596201067621");
/// let variant = ReceiptVariant::Refund { original: sale };
/// assert_eq!(variant.kind(), ReceiptKind::Refund);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptVariant {
    Sale,
    Refund { original: ReceiptRef },
    Advance { contract_id: String },
    Credit { sale: ReceiptRef },
    CreditRefund { credit: ReceiptRef },
}

impl ReceiptVariant {
    pub fn kind(&self) -> ReceiptKind {
        match self {
            ReceiptVariant::Sale => ReceiptKind::Sale,
            ReceiptVariant::Refund { .. } => ReceiptKind::Refund,
            ReceiptVariant::Advance { .. } => ReceiptKind::Advance,
            ReceiptVariant::Credit { .. } => ReceiptKind::Credit,
            ReceiptVariant::CreditRefund { .. } => ReceiptKind::CreditRefund,
        }
    }
}

/// Reference to a receipt already registered by the OFD.
///
/// Serialized as `SaleReceiptInfo` or `RefundInfo`. `ReceiptSeq` is accepted
/// as a string or an integer and always written as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRef {
    #[serde(rename = "TerminalID")]
    terminal_id: String,
    #[serde(rename = "ReceiptSeq", deserialize_with = "string_or_number")]
    receipt_seq: String,
    #[serde(rename = "DateTime")]
    date_time: String,
    #[serde(rename = "FiscalSign", deserialize_with = "string_or_number")]
    fiscal_sign: String,
}

impl ReceiptRef {
    pub fn new(
        terminal_id: impl Into<String>,
        receipt_seq: impl Into<String>,
        date_time: impl Into<String>,
        fiscal_sign: impl Into<String>,
    ) -> Self {
        Self {
            terminal_id: terminal_id.into(),
            receipt_seq: receipt_seq.into(),
            date_time: date_time.into(),
            fiscal_sign: fiscal_sign.into(),
        }
    }

    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    pub fn receipt_seq(&self) -> &str {
        &self.receipt_seq
    }

    pub fn date_time(&self) -> &str {
        &self.date_time
    }

    pub fn fiscal_sign(&self) -> &str {
        &self.fiscal_sign
    }

    pub(crate) fn issues(&self, issues: &mut Vec<ValidationIssue>) {
        let fields = [
            (ReceiptField::ReferenceTerminalId, &self.terminal_id),
            (ReceiptField::ReferenceReceiptSeq, &self.receipt_seq),
            (ReceiptField::ReferenceDateTime, &self.date_time),
            (ReceiptField::ReferenceFiscalSign, &self.fiscal_sign),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                issues.push(ValidationIssue {
                    field,
                    kind: ValidationKind::Empty,
                    line_item_index: None,
                });
            }
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(value) => value,
        Raw::Int(value) => value.to_string(),
        Raw::Unsigned(value) => value.to_string(),
    })
}

/// Payee identity on a marketplace line (commission model).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionInfo {
    #[serde(rename = "TIN", default)]
    pub tin: String,
    #[serde(rename = "PINFL", default)]
    pub pinfl: String,
}

/// Courier identity on a delivery line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxiInfo {
    #[serde(rename = "TIN", default)]
    pub tin: String,
    #[serde(rename = "PINFL", default)]
    pub pinfl: String,
    #[serde(rename = "CarNumber", default)]
    pub car_number: String,
}

/// Exactly one payee block per line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payee {
    #[serde(rename = "CommissionInfo")]
    Commission(CommissionInfo),
    #[serde(rename = "TaxiInfo")]
    Taxi(TaxiInfo),
}

/// Merchant identity attached to sale, refund and advance receipts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantInfo {
    #[serde(rename = "TIN")]
    pub tin: String,
    #[serde(rename = "PINFL", default)]
    pub pinfl: String,
    #[serde(rename = "ContractDate", default)]
    pub contract_date: String,
    #[serde(rename = "ContractNumber", default)]
    pub contract_number: String,
}

impl MerchantInfo {
    pub fn commission(&self) -> CommissionInfo {
        CommissionInfo {
            tin: self.tin.clone(),
            pinfl: self.pinfl.clone(),
        }
    }
}

/// Point of sale coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: 41.2967745,
            longitude: 69.2179078,
        }
    }
}

/// Free-form block; only `PhoneNumber` is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfo {
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "MarketplaceName", default, skip_serializing_if = "Option::is_none")]
    pub marketplace_name: Option<String>,
    #[serde(rename = "MarketplaceAddress", default, skip_serializing_if = "Option::is_none")]
    pub marketplace_address: Option<String>,
    #[serde(rename = "EPNumber", default, skip_serializing_if = "Option::is_none")]
    pub ep_number: Option<String>,
    #[serde(rename = "ReceiptNumber", default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    #[serde(rename = "RequestTime", default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<String>,
    #[serde(rename = "CreatedTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

impl ExtraInfo {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            ..Default::default()
        }
    }
}

/// What to do with an order line whose `seller_id` is not configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSellerPolicy {
    #[default]
    Reject,
    Skip,
}

/// Single receipt line item.
///
/// `Price` is the VAT-inclusive line price, `GoodPrice` the unit price and
/// `Amount` the quantity in thousandths.
///
/// # Examples
/// ```rust
/// use ofd_core::receipt::{CommissionInfo, LineItem, LineItemFields, Payee};
///
/// let item = LineItem::new(LineItemFields {
///     name: "Klaviatura".into(),
///     barcode: "2345678901234".into(),
///     labels: Vec::new(),
///     spic: "08471012004000000".into(),
///     package_code: "1503267".into(),
///     good_price: 250000,
///     price: 250000,
///     quantity: 1.0,
///     vat_percent: 12,
///     payee: Payee::Commission(CommissionInfo::default()),
/// });
/// assert_eq!(item.vat(), 26786);
/// assert_eq!(item.amount(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Barcode", default)]
    barcode: String,
    #[serde(rename = "Labels", default)]
    labels: Vec<String>,
    #[serde(rename = "SPIC", default)]
    spic: String,
    #[serde(rename = "PackageCode", default)]
    package_code: String,
    #[serde(rename = "OwnerType", default)]
    owner_type: u8,
    #[serde(rename = "GoodPrice")]
    good_price: i64,
    #[serde(rename = "Price")]
    price: i64,
    #[serde(rename = "VAT")]
    vat: i64,
    #[serde(rename = "VATPercent")]
    vat_percent: u32,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "Discount", default)]
    discount: i64,
    #[serde(rename = "Other", default)]
    other: i64,
    #[serde(rename = "Voucher", default)]
    voucher: i64,
    #[serde(flatten)]
    payee: Payee,
}

/// Fields for a line whose VAT is computed from a VAT-inclusive price.
/// A zero percent means the seller is not a VAT payer.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemFields {
    pub name: String,
    pub barcode: String,
    pub labels: Vec<String>,
    pub spic: String,
    pub package_code: String,
    pub good_price: i64,
    pub price: i64,
    pub quantity: f64,
    pub vat_percent: u32,
    pub payee: Payee,
}

/// Fields for a line with a precomputed VAT amount and adjustments.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemPartsFields {
    pub name: String,
    pub barcode: String,
    pub labels: Vec<String>,
    pub spic: String,
    pub package_code: String,
    pub good_price: i64,
    pub price: i64,
    pub quantity: f64,
    pub vat: i64,
    pub vat_percent: u32,
    pub discount: i64,
    pub other: i64,
    pub voucher: i64,
    pub payee: Payee,
}

impl LineItem {
    pub fn new(fields: LineItemFields) -> Self {
        let split = vat::compute(fields.price, fields.vat_percent, fields.vat_percent > 0);
        Self {
            name: fields.name,
            barcode: fields.barcode,
            labels: fields.labels,
            spic: fields.spic,
            package_code: fields.package_code,
            owner_type: 0,
            good_price: fields.good_price,
            price: split.price,
            vat: split.vat,
            vat_percent: fields.vat_percent,
            amount: scale_quantity(fields.quantity),
            discount: 0,
            other: 0,
            voucher: 0,
            payee: fields.payee,
        }
    }

    pub fn from_parts(fields: LineItemPartsFields) -> Self {
        Self {
            name: fields.name,
            barcode: fields.barcode,
            labels: fields.labels,
            spic: fields.spic,
            package_code: fields.package_code,
            owner_type: 0,
            good_price: fields.good_price,
            price: fields.price,
            vat: fields.vat,
            vat_percent: fields.vat_percent,
            amount: scale_quantity(fields.quantity),
            discount: fields.discount,
            other: fields.other,
            voucher: fields.voucher,
            payee: fields.payee,
        }
    }

    pub fn with_adjustments(mut self, discount: i64, other: i64, voucher: i64) -> Self {
        self.discount = discount;
        self.other = other;
        self.voucher = voucher;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn spic(&self) -> &str {
        &self.spic
    }

    pub fn package_code(&self) -> &str {
        &self.package_code
    }

    pub fn good_price(&self) -> i64 {
        self.good_price
    }

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn vat(&self) -> i64 {
        self.vat
    }

    pub fn vat_percent(&self) -> u32 {
        self.vat_percent
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn discount(&self) -> i64 {
        self.discount
    }

    pub fn other(&self) -> i64 {
        self.other
    }

    pub fn voucher(&self) -> i64 {
        self.voucher
    }

    pub fn payee(&self) -> &Payee {
        &self.payee
    }

    pub(crate) fn issues(&self, index: usize, issues: &mut Vec<ValidationIssue>) {
        let mut push = |field, kind| {
            issues.push(ValidationIssue {
                field,
                kind,
                line_item_index: Some(index),
            })
        };
        if self.name.trim().is_empty() {
            push(ReceiptField::ItemName, ValidationKind::Empty);
        }
        if self.price < 0 {
            push(ReceiptField::ItemPrice, ValidationKind::OutOfRange);
        }
        if self.good_price < 0 {
            push(ReceiptField::ItemGoodPrice, ValidationKind::OutOfRange);
        }
        if self.amount <= 0 {
            push(ReceiptField::ItemAmount, ValidationKind::OutOfRange);
        }
        if self.vat < 0 || self.vat > self.price {
            push(ReceiptField::ItemVat, ValidationKind::OutOfRange);
        }
        if self.vat_percent == 0 && self.vat != 0 {
            push(ReceiptField::ItemVat, ValidationKind::Mismatch);
        }
        if self.discount < 0 || self.other < 0 || self.voucher < 0 {
            push(ReceiptField::ItemAdjustments, ValidationKind::OutOfRange);
        }
    }
}

pub(crate) fn scale_quantity(quantity: f64) -> i64 {
    (quantity * AMOUNT_SCALE).round() as i64
}

/// The receipt exactly as it is written to disk and signed.
///
/// Instances come from [`ReceiptBuilder`] or from parsing a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    #[serde(rename = "ReceiptSeq")]
    receipt_seq: u64,
    #[serde(rename = "IsRefund", with = "refund_flag")]
    is_refund: bool,
    #[serde(rename = "Items")]
    items: Vec<LineItem>,
    #[serde(rename = "ReceivedCash")]
    received_cash: i64,
    #[serde(rename = "ReceivedCard")]
    received_card: i64,
    #[serde(rename = "TotalVAT")]
    total_vat: i64,
    #[serde(rename = "Time", with = "receipt_time")]
    time: NaiveDateTime,
    #[serde(rename = "ReceiptType")]
    receipt_type: ReceiptType,
    #[serde(rename = "AdvanceContractID", default, skip_serializing_if = "Option::is_none")]
    advance_contract_id: Option<String>,
    #[serde(rename = "RefundInfo", default, skip_serializing_if = "Option::is_none")]
    refund_info: Option<ReceiptRef>,
    #[serde(rename = "Location")]
    location: Location,
    #[serde(rename = "ExtraInfo")]
    extra_info: ExtraInfo,
    #[serde(rename = "MerchantInfo", default, skip_serializing_if = "Option::is_none")]
    merchant_info: Option<MerchantInfo>,
    #[serde(rename = "SaleReceiptInfo", default, skip_serializing_if = "Option::is_none")]
    sale_receipt_info: Option<ReceiptRef>,
}

impl ReceiptDocument {
    /// Stamp the sequence number once the counter has been advanced.
    pub(crate) fn with_receipt_seq(mut self, receipt_seq: u64) -> Self {
        self.receipt_seq = receipt_seq;
        self
    }

    pub fn receipt_seq(&self) -> u64 {
        self.receipt_seq
    }

    pub fn is_refund(&self) -> bool {
        self.is_refund
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn received_cash(&self) -> i64 {
        self.received_cash
    }

    pub fn received_card(&self) -> i64 {
        self.received_card
    }

    pub fn total_vat(&self) -> i64 {
        self.total_vat
    }

    /// Sum of line prices; not transmitted, drives the payment split.
    pub fn total_price(&self) -> i64 {
        self.items.iter().map(LineItem::price).sum()
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn receipt_type(&self) -> ReceiptType {
        self.receipt_type
    }

    pub fn advance_contract_id(&self) -> Option<&str> {
        self.advance_contract_id.as_deref()
    }

    pub fn refund_info(&self) -> Option<&ReceiptRef> {
        self.refund_info.as_ref()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn extra_info(&self) -> &ExtraInfo {
        &self.extra_info
    }

    pub fn merchant_info(&self) -> Option<&MerchantInfo> {
        self.merchant_info.as_ref()
    }

    pub fn sale_receipt_info(&self) -> Option<&ReceiptRef> {
        self.sale_receipt_info.as_ref()
    }
}

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

mod receipt_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(super::TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, super::TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

mod refund_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match u8::deserialize(d)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!(
                "IsRefund must be 0 or 1, got {other}"
            ))),
        }
    }
}
