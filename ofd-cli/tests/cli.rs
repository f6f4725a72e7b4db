use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cli_exe() -> &'static str {
    env!("CARGO_BIN_EXE_ofd")
}

const PROFILE: &str = r#"{
    "merchant": {"TIN": "190261951", "PINFL": "30747919403015",
                 "ContractDate": "2025-09-21 07:41:09", "ContractNumber": "264"},
    "sellers": [{"id": "s1", "TIN": "190261951", "PINFL": "30747919403015"}],
    "phone_number": "998901234567"
}"#;

const ORDER: &str = r#"{"items": [
    {"Name": "Kompyuter sichqonchasi", "Price": 150000, "Amount": 1, "seller_id": "s1"}
]}"#;

fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let profile = dir.join("profile.json");
    let items = dir.join("order.json");
    std::fs::write(&profile, PROFILE).expect("write profile");
    std::fs::write(&items, ORDER).expect("write order");
    (profile, items)
}

fn run(dir: &Path, args: &[&str]) -> Output {
    let (profile, items) = write_inputs(dir);
    Command::new(cli_exe())
        .args(args)
        .arg("--profile")
        .arg(&profile)
        .arg("--items")
        .arg(&items)
        .arg("--state-dir")
        .arg(dir)
        .arg("--url")
        .arg("http://127.0.0.1:1/receipt")
        .env_remove("OFD_RECEIPT_URL")
        .env_remove("OFD_PAYMENT_TYPE")
        .output()
        .expect("run ofd")
}

#[test]
fn qr_command_decodes_escaped_url() {
    let output = Command::new(cli_exe())
        .args(["qr", r"https:\/\/ofd.soliq.uz\/epi?t=EZ000000000931&r=121"])
        .output()
        .expect("run qr command");

    assert!(
        output.status.success(),
        "qr command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "https://ofd.soliq.uz/epi?t=EZ000000000931&r=121");
}

#[test]
fn credit_without_prior_sale_fails_without_touching_counter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run(dir.path(), &["credit"]);

    assert!(!output.status.success(), "credit unexpectedly succeeded");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("last_sale_info.json"),
        "missing prerequisite not reported: {stderr}"
    );
    assert!(!dir.path().join("logs").join("last_seq.txt").exists());
    assert!(!dir.path().join("logs").join("CreditReceipt.json").exists());
}

#[test]
fn credit_refund_without_prior_credit_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("logs")).unwrap();
    std::fs::write(
        dir.path().join("logs").join("last_sale_info.json"),
        r#"{"TerminalID": "EZ000000000931", "ReceiptSeq": "121",
            "DateTime": "20250924154010", "FiscalSign": "596201067621"}"#,
    )
    .unwrap();

    let output = run(dir.path(), &["credit-refund"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("last_credit_info.json"), "{stderr}");
    assert!(!dir.path().join("logs").join("last_seq.txt").exists());
}

#[test]
fn unknown_payment_type_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run(dir.path(), &["sale", "--payment-type", "crypto"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("crypto"), "{stderr}");
}

#[test]
fn advance_requires_contract_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(cli_exe())
        .args(["advance"])
        .env_remove("OFD_ADVANCE_CONTRACT_ID")
        .current_dir(dir.path())
        .output()
        .expect("run advance");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--contract-id"));
}
