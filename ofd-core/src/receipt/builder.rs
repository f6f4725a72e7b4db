use super::{
    ExtraInfo, LineItem, Location, MerchantInfo, Payment, ReceiptDocument, ReceiptError,
    ReceiptField, ReceiptVariant, ValidationError, ValidationIssue, ValidationKind,
};
use chrono::NaiveDateTime;

/// Everything a receipt cannot go out without.
#[derive(Debug, Clone)]
pub struct RequiredReceiptFields {
    pub variant: ReceiptVariant,
    pub receipt_seq: u64,
    pub time: NaiveDateTime,
    pub items: Vec<LineItem>,
    pub payment: Payment,
    pub location: Location,
    pub extra_info: ExtraInfo,
}

pub struct ReceiptBuilder {
    fields: RequiredReceiptFields,
    merchant_info: Option<MerchantInfo>,
}

impl ReceiptBuilder {
    pub fn new(fields: RequiredReceiptFields) -> Self {
        Self {
            fields,
            merchant_info: None,
        }
    }

    pub fn merchant_info(mut self, merchant: MerchantInfo) -> Self {
        self.merchant_info = Some(merchant);
        self
    }

    /// Validate the inputs, compute totals and the payment split, and lay out
    /// the cross-reference block the variant requires.
    ///
    /// # Errors
    /// Returns [`ReceiptError::Validation`] listing every issue found.
    pub fn build(self) -> Result<ReceiptDocument, ReceiptError> {
        let RequiredReceiptFields {
            variant,
            receipt_seq,
            time,
            items,
            payment,
            location,
            extra_info,
        } = self.fields;

        let mut issues = Vec::new();
        if items.is_empty() {
            issues.push(ValidationIssue {
                field: ReceiptField::Items,
                kind: ValidationKind::Empty,
                line_item_index: None,
            });
        }
        for (index, item) in items.iter().enumerate() {
            item.issues(index, &mut issues);
        }

        let total_price = checked_total(&items, LineItem::price).unwrap_or_else(|| {
            issues.push(ValidationIssue {
                field: ReceiptField::TotalPrice,
                kind: ValidationKind::OutOfRange,
                line_item_index: None,
            });
            0
        });
        let total_vat = checked_total(&items, LineItem::vat).unwrap_or_else(|| {
            issues.push(ValidationIssue {
                field: ReceiptField::TotalVat,
                kind: ValidationKind::OutOfRange,
                line_item_index: None,
            });
            0
        });
        let split = payment.split(total_price);
        if let Payment::Received { cash, card } = payment {
            if cash < 0 {
                issues.push(ValidationIssue {
                    field: ReceiptField::ReceivedCash,
                    kind: ValidationKind::OutOfRange,
                    line_item_index: None,
                });
            }
            if card < 0 {
                issues.push(ValidationIssue {
                    field: ReceiptField::ReceivedCard,
                    kind: ValidationKind::OutOfRange,
                    line_item_index: None,
                });
            }
            match cash.checked_add(card) {
                Some(received) if received <= total_price => {}
                Some(_) => issues.push(ValidationIssue {
                    field: ReceiptField::ReceivedCard,
                    kind: ValidationKind::Mismatch,
                    line_item_index: None,
                }),
                None => issues.push(ValidationIssue {
                    field: ReceiptField::ReceivedCard,
                    kind: ValidationKind::OutOfRange,
                    line_item_index: None,
                }),
            }
        }

        let kind = variant.kind();
        let mut advance_contract_id = None;
        let mut refund_info = None;
        let mut sale_receipt_info = None;
        match variant {
            ReceiptVariant::Sale => {}
            ReceiptVariant::Refund { original } => {
                original.issues(&mut issues);
                refund_info = Some(original);
            }
            ReceiptVariant::Advance { contract_id } => {
                if contract_id.trim().is_empty() {
                    issues.push(ValidationIssue {
                        field: ReceiptField::AdvanceContractId,
                        kind: ValidationKind::Empty,
                        line_item_index: None,
                    });
                }
                advance_contract_id = Some(contract_id);
            }
            ReceiptVariant::Credit { sale: reference }
            | ReceiptVariant::CreditRefund { credit: reference } => {
                reference.issues(&mut issues);
                sale_receipt_info = Some(reference);
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError::new(issues).into());
        }

        tracing::debug!(
            %kind,
            receipt_seq,
            items = items.len(),
            total_price,
            total_vat,
            cash = split.cash,
            card = split.card,
            "receipt assembled"
        );

        Ok(ReceiptDocument {
            receipt_seq,
            is_refund: kind.is_refund(),
            items,
            received_cash: split.cash,
            received_card: split.card,
            total_vat,
            time,
            receipt_type: kind.receipt_type(),
            advance_contract_id,
            refund_info,
            location,
            extra_info,
            merchant_info: self.merchant_info,
            sale_receipt_info,
        })
    }
}

fn checked_total(items: &[LineItem], value: fn(&LineItem) -> i64) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(value(item)))
}
