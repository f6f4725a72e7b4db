mod common;

use ofd_core::receipt::{
    Payment, PaymentType, ReceiptBuilder, ReceiptError, ReceiptField, ReceiptKind, ReceiptType,
    ReceiptVariant, RequiredReceiptFields, ValidationKind,
};

fn fields(variant: ReceiptVariant, payment: Payment) -> RequiredReceiptFields {
    RequiredReceiptFields {
        variant,
        receipt_seq: 7,
        time: common::sample_time(),
        items: common::inline_items(),
        payment,
        location: common::location(),
        extra_info: common::extra_info(),
    }
}

#[test]
fn sale_with_inline_items_totals_vat_and_pays_by_card() {
    let receipt = ReceiptBuilder::new(fields(
        ReceiptVariant::Sale,
        Payment::Policy(PaymentType::Card),
    ))
    .merchant_info(common::merchant())
    .build()
    .expect("valid sale");

    assert_eq!(receipt.total_vat(), 48000);
    assert_eq!(receipt.received_card(), 400000);
    assert_eq!(receipt.received_cash(), 0);
    assert_eq!(receipt.receipt_type(), ReceiptType::Sale);
    assert!(!receipt.is_refund());
    assert!(receipt.refund_info().is_none());
    assert!(receipt.sale_receipt_info().is_none());
    assert_eq!(receipt.merchant_info(), Some(&common::merchant()));
}

#[test]
fn mix_payment_splits_floor_half_to_cash() {
    let receipt = ReceiptBuilder::new(fields(
        ReceiptVariant::Sale,
        Payment::Policy(PaymentType::Mix),
    ))
    .build()
    .unwrap();
    assert_eq!(receipt.received_cash(), 200000);
    assert_eq!(receipt.received_card(), 200000);
    assert_eq!(receipt.received_cash() + receipt.received_card(), receipt.total_price());
}

#[test]
fn refund_copies_reference_fields_unmodified() {
    let original = common::sale_ref();
    let receipt = ReceiptBuilder::new(fields(
        ReceiptVariant::Refund {
            original: original.clone(),
        },
        Payment::Policy(PaymentType::Card),
    ))
    .build()
    .unwrap();

    assert!(receipt.is_refund());
    assert_eq!(receipt.receipt_type(), ReceiptType::Sale);
    let info = receipt.refund_info().expect("RefundInfo");
    assert_eq!(info, &original);
    assert_eq!(info.terminal_id(), "EZ000000000931");
    assert_eq!(info.receipt_seq(), "121");
    assert_eq!(info.date_time(), "20250924154010");
    assert_eq!(info.fiscal_sign(), "596201067621");
}

#[test]
fn credit_kinds_carry_sale_receipt_info() {
    let credit = ReceiptBuilder::new(fields(
        ReceiptVariant::Credit {
            sale: common::sale_ref(),
        },
        Payment::Received { cash: 0, card: 0 },
    ))
    .build()
    .unwrap();
    assert_eq!(credit.receipt_type(), ReceiptType::Credit);
    assert!(!credit.is_refund());
    assert_eq!(credit.sale_receipt_info(), Some(&common::sale_ref()));
    assert_eq!((credit.received_cash(), credit.received_card()), (0, 0));

    let refund = ReceiptBuilder::new(fields(
        ReceiptVariant::CreditRefund {
            credit: common::sale_ref(),
        },
        Payment::Received { cash: 0, card: 0 },
    ))
    .build()
    .unwrap();
    assert_eq!(refund.receipt_type(), ReceiptType::Credit);
    assert!(refund.is_refund());
    assert!(refund.refund_info().is_none());
}

#[test]
fn advance_keeps_contract_and_partial_payment() {
    let receipt = ReceiptBuilder::new(fields(
        ReceiptVariant::Advance {
            contract_id: "CONTRACT-2025-0001".into(),
        },
        Payment::Received {
            cash: 0,
            card: 250114,
        },
    ))
    .build()
    .unwrap();
    assert_eq!(receipt.receipt_type(), ReceiptType::Advance);
    assert_eq!(receipt.advance_contract_id(), Some("CONTRACT-2025-0001"));
    assert_eq!(receipt.received_card(), 250114);
}

#[test]
fn build_reports_every_issue() {
    let mut required = fields(
        ReceiptVariant::Advance {
            contract_id: "  ".into(),
        },
        Payment::Received {
            cash: -1,
            card: 500000,
        },
    );
    required.items.push(common::inline_item("", "", 1000, 2000));

    let err = ReceiptBuilder::new(required).build().expect_err("invalid");
    let ReceiptError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    let found: Vec<_> = validation
        .issues
        .iter()
        .map(|issue| (issue.field, issue.kind, issue.line_item_index))
        .collect();
    assert!(found.contains(&(ReceiptField::AdvanceContractId, ValidationKind::Empty, None)));
    assert!(found.contains(&(ReceiptField::ReceivedCash, ValidationKind::OutOfRange, None)));
    assert!(found.contains(&(ReceiptField::ItemName, ValidationKind::Empty, Some(2))));
    assert!(found.contains(&(ReceiptField::ItemVat, ValidationKind::OutOfRange, Some(2))));
}

fn issue_set(err: ReceiptError) -> Vec<(ReceiptField, ValidationKind, Option<usize>)> {
    let ReceiptError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    validation
        .issues
        .iter()
        .map(|issue| (issue.field, issue.kind, issue.line_item_index))
        .collect()
}

#[test]
fn received_amounts_beyond_i64_are_out_of_range() {
    let err = ReceiptBuilder::new(fields(
        ReceiptVariant::Advance {
            contract_id: "CONTRACT-2025-0001".into(),
        },
        Payment::Received {
            cash: i64::MAX,
            card: 1,
        },
    ))
    .build()
    .expect_err("overflowing payment");
    assert_eq!(
        issue_set(err),
        vec![(ReceiptField::ReceivedCard, ValidationKind::OutOfRange, None)]
    );
}

#[test]
fn totals_beyond_i64_are_out_of_range() {
    let mut required = fields(ReceiptVariant::Sale, Payment::Policy(PaymentType::Mix));
    required.items = vec![
        common::inline_item("Server", "08471012001000000", i64::MAX, i64::MAX),
        common::inline_item("Server", "08471012001000000", i64::MAX, i64::MAX),
    ];

    let found = issue_set(ReceiptBuilder::new(required).build().expect_err("overflowing totals"));
    assert!(found.contains(&(ReceiptField::TotalPrice, ValidationKind::OutOfRange, None)));
    assert!(found.contains(&(ReceiptField::TotalVat, ValidationKind::OutOfRange, None)));
}

#[test]
fn empty_items_and_blank_reference_are_rejected() {
    let mut required = fields(
        ReceiptVariant::Refund {
            original: ofd_core::receipt::ReceiptRef::new("", "121", "", "596201067621"),
        },
        Payment::Policy(PaymentType::Cash),
    );
    required.items.clear();

    let ReceiptError::Validation(validation) = ReceiptBuilder::new(required).build().unwrap_err()
    else {
        panic!("expected validation error");
    };
    let found: Vec<_> = validation.issues.iter().map(|i| i.field).collect();
    assert!(found.contains(&ReceiptField::Items));
    assert!(found.contains(&ReceiptField::ReferenceTerminalId));
    assert!(found.contains(&ReceiptField::ReferenceDateTime));
    assert!(!found.contains(&ReceiptField::ReferenceReceiptSeq));
}

#[test]
fn kind_follows_variant() {
    for (variant, kind) in [
        (ReceiptVariant::Sale, ReceiptKind::Sale),
        (
            ReceiptVariant::Credit {
                sale: common::sale_ref(),
            },
            ReceiptKind::Credit,
        ),
    ] {
        assert_eq!(variant.kind(), kind);
    }
}
