mod common;

use ofd_core::receipt::{
    Payment, PaymentType, ReceiptBuilder, ReceiptVariant, RequiredReceiptFields,
};
use ofd_core::sign::{OpensslCmsSigner, ReceiptSigner, SigningError};
use std::path::Path;
use std::process::Command;

fn openssl_available() -> bool {
    Command::new("openssl")
        .arg("version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn self_signed_pair(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let cert = dir.join("merchant.crt");
    let key = dir.join("merchant.key");
    let status = Command::new("openssl")
        .args(["req", "-x509", "-newkey", "rsa:2048", "-nodes", "-days", "1"])
        .args(["-subj", "/CN=EZ000000000931/O=Test Merchant/C=UZ"])
        .arg("-keyout")
        .arg(&key)
        .arg("-out")
        .arg(&cert)
        .output()
        .expect("openssl req");
    assert!(
        status.status.success(),
        "certificate generation failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
    (cert, key)
}

#[test]
fn openssl_signer_embeds_receipt_in_der() {
    if !openssl_available() {
        eprintln!("openssl not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let (cert, key) = self_signed_pair(dir.path());

    let receipt = ReceiptBuilder::new(RequiredReceiptFields {
        variant: ReceiptVariant::Sale,
        receipt_seq: 1,
        time: common::sample_time(),
        items: common::inline_items(),
        payment: Payment::Policy(PaymentType::Card),
        location: common::location(),
        extra_info: common::extra_info(),
    })
    .build()
    .expect("sale");
    let bytes = receipt.to_json_bytes().expect("json");

    let signed = OpensslCmsSigner::new(&cert, &key)
        .sign(&bytes)
        .expect("sign receipt");

    // DER SEQUENCE with the JSON carried as eContent.
    assert_eq!(signed[0], 0x30);
    let needle = b"\"TotalVAT\": 48000";
    assert!(
        signed.windows(needle.len()).any(|window| window == needle),
        "receipt content not embedded"
    );

    let verify = Command::new("openssl")
        .args(["cms", "-verify", "-noverify", "-inform", "der", "-certfile"])
        .arg(&cert)
        .arg("-in")
        .arg({
            let path = dir.path().join("ReceiptInfo.p7b");
            std::fs::write(&path, &signed).expect("write artifact");
            path
        })
        .output()
        .expect("openssl verify");
    assert!(
        verify.status.success(),
        "verification failed: {}",
        String::from_utf8_lossy(&verify.stderr)
    );
}

#[test]
fn openssl_signer_reports_bad_key() {
    if !openssl_available() {
        eprintln!("openssl not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let (cert, _key) = self_signed_pair(dir.path());
    let bogus = dir.path().join("bogus.key");
    std::fs::write(&bogus, "not a key").unwrap();

    let err = OpensslCmsSigner::new(&cert, &bogus)
        .sign(b"{}")
        .expect_err("bad key");
    assert!(matches!(err, SigningError::Failed { .. }));
}
