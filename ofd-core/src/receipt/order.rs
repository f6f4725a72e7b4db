//! Order documents: the item source a receipt is assembled from.
//!
//! ```json
//! {"items": [{"Name": "Klaviatura", "Price": 250000, "Amount": 2, "seller_id": "s2"}]}
//! ```
//!
//! `Amount` is a unit count and is scaled to thousandths on the way into a
//! [`LineItem`]. Each line gets its payee from an explicit `CommissionInfo`,
//! else from the configured seller named by `seller_id`, else from the
//! fallback commission block passed by the caller.
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::document::{self, DocumentError};
use super::vat::STANDARD_VAT_PERCENT;
use super::{
    CommissionInfo, LineItem, LineItemFields, LineItemPartsFields, Payee, ReceiptError,
    UnknownSellerPolicy,
};
use crate::config::{DeliverySettings, Seller};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDocument {
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Barcode", default)]
    pub barcode: String,
    #[serde(rename = "Labels", default)]
    pub labels: Vec<String>,
    #[serde(rename = "SPIC", default)]
    pub spic: String,
    #[serde(rename = "PackageCode", default)]
    pub package_code: String,
    #[serde(rename = "Price")]
    pub price: i64,
    #[serde(rename = "GoodPrice", default)]
    pub good_price: Option<i64>,
    #[serde(rename = "Amount", default = "one")]
    pub amount: f64,
    #[serde(rename = "VAT", default)]
    pub vat: Option<i64>,
    #[serde(rename = "VATPercent", default)]
    pub vat_percent: Option<u32>,
    #[serde(rename = "Discount", default)]
    pub discount: i64,
    #[serde(rename = "Other", default)]
    pub other: i64,
    #[serde(rename = "Voucher", default)]
    pub voucher: i64,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(rename = "CommissionInfo", default)]
    pub commission_info: Option<CommissionInfo>,
}

fn one() -> f64 {
    1.0
}

/// Inputs for turning order lines into receipt lines.
pub struct ItemResolver<'a> {
    pub sellers: &'a [Seller],
    pub fallback: &'a CommissionInfo,
    pub unknown_seller: UnknownSellerPolicy,
}

impl OrderDocument {
    /// # Errors
    /// Returns [`DocumentError`] if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        document::read_json(path.as_ref())
    }

    /// Resolve every order line into a [`LineItem`].
    ///
    /// # Errors
    /// Returns [`ReceiptError::UnknownSeller`] for an unconfigured `seller_id`
    /// under [`UnknownSellerPolicy::Reject`].
    pub fn line_items(&self, resolver: &ItemResolver<'_>) -> Result<Vec<LineItem>, ReceiptError> {
        let mut lines = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            let seller = match item.seller_id.as_deref() {
                Some(id) => match resolver.sellers.iter().find(|s| s.id == id) {
                    Some(seller) => Some(seller),
                    None => match resolver.unknown_seller {
                        UnknownSellerPolicy::Reject => {
                            return Err(ReceiptError::UnknownSeller {
                                index,
                                seller_id: id.to_string(),
                            });
                        }
                        UnknownSellerPolicy::Skip => {
                            tracing::warn!(index, seller_id = id, name = %item.name, "dropping item with unknown seller");
                            continue;
                        }
                    },
                },
                None => None,
            };
            lines.push(item.to_line_item(seller, resolver.fallback));
        }
        Ok(lines)
    }
}

impl OrderItem {
    fn to_line_item(&self, seller: Option<&Seller>, fallback: &CommissionInfo) -> LineItem {
        let commission = match (&self.commission_info, seller) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(seller)) => CommissionInfo {
                tin: seller.tin.clone(),
                pinfl: seller.pinfl.clone(),
            },
            (None, None) => fallback.clone(),
        };
        let vat_percent = self.vat_percent.unwrap_or(match seller {
            Some(seller) if !seller.has_vat => 0,
            _ => STANDARD_VAT_PERCENT,
        });
        let good_price = self.good_price.unwrap_or(self.price);
        let payee = Payee::Commission(commission);

        match self.vat {
            Some(vat) => LineItem::from_parts(LineItemPartsFields {
                name: self.name.clone(),
                barcode: self.barcode.clone(),
                labels: self.labels.clone(),
                spic: self.spic.clone(),
                package_code: self.package_code.clone(),
                good_price,
                price: self.price,
                quantity: self.amount,
                vat,
                vat_percent,
                discount: self.discount,
                other: self.other,
                voucher: self.voucher,
                payee,
            }),
            None => LineItem::new(LineItemFields {
                name: self.name.clone(),
                barcode: self.barcode.clone(),
                labels: self.labels.clone(),
                spic: self.spic.clone(),
                package_code: self.package_code.clone(),
                good_price,
                price: self.price,
                quantity: self.amount,
                vat_percent,
                payee,
            })
            .with_adjustments(self.discount, self.other, self.voucher),
        }
    }
}

/// The delivery line appended to sale receipts.
pub fn delivery_line(settings: &DeliverySettings) -> LineItem {
    LineItem::new(LineItemFields {
        name: settings.name.clone(),
        barcode: settings.barcode.clone(),
        labels: Vec::new(),
        spic: settings.spic.clone(),
        package_code: settings.package_code.clone(),
        good_price: settings.price,
        price: settings.price,
        quantity: 1.0,
        vat_percent: settings.vat_percent,
        payee: Payee::Taxi(settings.taxi_info()),
    })
}
