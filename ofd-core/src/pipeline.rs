//! One receipt, end to end.
//!
//! Prerequisite lookup, validation, sequence number, document on disk,
//! signature, submission, response processing. Everything up to the sequence
//! number is checked first, so a run that cannot proceed leaves the counter
//! untouched.
use base64ct::{Base64, Encoding};
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::Error;
use crate::api::{OfdClient, SubmitResponse};
use crate::config::{Config, ReceiptProfile};
use crate::receipt::document::{self, DocumentError};
use crate::receipt::order::{ItemResolver, OrderDocument, delivery_line};
use crate::receipt::{
    ExtraInfo, LineItem, Location, MerchantInfo, Payment, ReceiptBuilder, ReceiptDocument,
    ReceiptError, ReceiptKind, ReceiptVariant, RequiredReceiptFields, TIME_FORMAT,
};
use crate::response::{ProcessedResponse, ResponseProcessor};
use crate::sign::{OpensslCmsSigner, ReceiptSigner};
use crate::state::{FileSequence, HandoffKey, HandoffStore, ReceiptSequence};

/// Inputs for a single run. The cross-reference block is not part of the
/// request; it is read from the handoff store.
#[derive(Debug, Clone)]
pub struct ReceiptRequest {
    pub kind: ReceiptKind,
    pub items: Vec<LineItem>,
    pub payment: Payment,
    pub location: Location,
    pub extra_info: ExtraInfo,
    pub merchant_info: Option<MerchantInfo>,
    pub advance_contract_id: Option<String>,
    /// Receipt time; local now when unset.
    pub time: Option<NaiveDateTime>,
}

impl ReceiptRequest {
    /// Request with profile defaults for `kind`.
    ///
    /// Sale and refund pay by the profile's payment type, credit kinds record
    /// nothing received. Sale carries the marketplace block; sale and advance
    /// stamp `RequestTime` and `CreatedTime`.
    pub fn from_profile(
        kind: ReceiptKind,
        profile: &ReceiptProfile,
        items: Vec<LineItem>,
        time: NaiveDateTime,
    ) -> Self {
        let stamp = time.format(TIME_FORMAT).to_string();
        let mut extra_info = ExtraInfo::new(profile.phone_number.clone());
        match kind {
            ReceiptKind::Sale => {
                if let Some(marketplace) = &profile.marketplace {
                    extra_info.marketplace_name = Some(marketplace.name.clone());
                    extra_info.marketplace_address = Some(marketplace.address.clone());
                    extra_info.ep_number = Some(marketplace.ep_number.clone());
                    extra_info.receipt_number = Some(marketplace.receipt_number.clone());
                }
                extra_info.request_time = Some(stamp.clone());
                extra_info.created_time = Some(stamp);
            }
            ReceiptKind::Advance => {
                extra_info.request_time = Some(stamp.clone());
                extra_info.created_time = Some(stamp);
            }
            ReceiptKind::Refund | ReceiptKind::Credit | ReceiptKind::CreditRefund => {}
        }

        let payment = match kind {
            ReceiptKind::Credit | ReceiptKind::CreditRefund => {
                Payment::Received { cash: 0, card: 0 }
            }
            _ => Payment::Policy(profile.payment_type),
        };

        Self {
            kind,
            items,
            payment,
            location: profile.location,
            extra_info,
            merchant_info: Some(profile.merchant.clone()),
            advance_contract_id: None,
            time: Some(time),
        }
    }
}

/// Resolve an order into line items using the profile's sellers; sale
/// receipts also get the configured delivery line.
///
/// # Errors
/// See [`OrderDocument::line_items`].
pub fn order_items(
    kind: ReceiptKind,
    profile: &ReceiptProfile,
    order: &OrderDocument,
) -> Result<Vec<LineItem>, ReceiptError> {
    let fallback = profile.merchant.commission();
    let resolver = ItemResolver {
        sellers: &profile.sellers,
        fallback: &fallback,
        unknown_seller: profile.unknown_seller,
    };
    let mut items = order.line_items(&resolver)?;
    if kind == ReceiptKind::Sale {
        if let Some(delivery) = &profile.delivery {
            items.push(delivery_line(delivery));
        }
    }
    Ok(items)
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub kind: ReceiptKind,
    pub receipt_seq: u64,
    pub document: ReceiptDocument,
    pub document_path: PathBuf,
    pub signed_path: PathBuf,
    /// Base64 SHA-256 of the signed artifact.
    pub signed_sha256: String,
    pub response: SubmitResponse,
    pub processed: ProcessedResponse,
}

/// Wires the sequence counter, signer, client and handoff store together.
pub struct ReceiptRun<S, Q> {
    config: Config,
    signer: S,
    sequence: Q,
    client: OfdClient,
    store: HandoffStore,
}

impl ReceiptRun<OpensslCmsSigner, FileSequence> {
    /// `openssl` signer and the file counter under the logs directory.
    ///
    /// # Errors
    /// Returns [`Error::Api`] if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let signer = OpensslCmsSigner::new(config.cert_path(), config.key_path());
        let sequence = FileSequence::in_dir(&config.logs_dir());
        Self::new(config, signer, sequence)
    }
}

impl<S: ReceiptSigner, Q: ReceiptSequence> ReceiptRun<S, Q> {
    /// # Errors
    /// Returns [`Error::Api`] if the HTTP client cannot be built.
    pub fn new(config: Config, signer: S, sequence: Q) -> Result<Self, Error> {
        let client = OfdClient::new(&config)?;
        let store = HandoffStore::new(config.logs_dir());
        Ok(Self {
            config,
            signer,
            sequence,
            client,
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &OfdClient {
        &self.client
    }

    pub fn store(&self) -> &HandoffStore {
        &self.store
    }

    /// Issue one receipt.
    ///
    /// # Errors
    /// Fails before the counter moves on a missing prerequisite or invalid
    /// input; afterwards on local I/O, signing or transport failure. A
    /// transport failure is also written to `<kind>_error.log`.
    pub async fn execute(&self, request: ReceiptRequest) -> Result<RunOutcome, Error> {
        let kind = request.kind;
        tracing::info!(%kind, endpoint = %self.client.endpoint(), "starting receipt run");

        let variant = match kind {
            ReceiptKind::Sale => ReceiptVariant::Sale,
            ReceiptKind::Advance => ReceiptVariant::Advance {
                contract_id: request.advance_contract_id.unwrap_or_default(),
            },
            ReceiptKind::Refund => ReceiptVariant::Refund {
                original: self.store.require(HandoffKey::LastSale)?,
            },
            ReceiptKind::Credit => ReceiptVariant::Credit {
                sale: self.store.require(HandoffKey::LastSale)?,
            },
            ReceiptKind::CreditRefund => ReceiptVariant::CreditRefund {
                credit: self.store.require(HandoffKey::LastCredit)?,
            },
        };

        let time = request
            .time
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let mut builder = ReceiptBuilder::new(RequiredReceiptFields {
            variant,
            receipt_seq: 0,
            time,
            items: request.items,
            payment: request.payment,
            location: request.location,
            extra_info: request.extra_info,
        });
        if kind.carries_merchant_info() {
            if let Some(merchant) = request.merchant_info {
                builder = builder.merchant_info(merchant);
            }
        }
        let draft = builder.build()?;

        let receipt_seq = self.sequence.next_sequence()?;
        let document = draft.with_receipt_seq(receipt_seq);
        tracing::info!(%kind, receipt_seq, total_vat = document.total_vat(), "receipt built");

        let logs_dir = self.config.logs_dir();
        let document_path = logs_dir.join(format!("{}.json", kind.document_name()));
        let bytes = document
            .to_json_bytes()
            .map_err(|source| DocumentError::Json {
                path: document_path.clone(),
                source,
            })?;
        document::write_atomic(&document_path, &bytes)?;
        tracing::info!(path = %document_path.display(), "receipt document written");

        let signed = self.signer.sign(&bytes)?;
        let signed_path = self
            .config
            .keys_dir()
            .join(format!("{}.p7b", kind.document_name()));
        document::write_atomic(&signed_path, &signed)?;
        let signed_sha256 = Base64::encode_string(&Sha256::digest(&signed));
        tracing::info!(
            path = %signed_path.display(),
            bytes = signed.len(),
            sha256 = %signed_sha256,
            "receipt signed"
        );

        let processor = ResponseProcessor::new(&logs_dir, &self.store);
        let response = match self.client.submit(&signed).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%kind, error = %err, "submission failed");
                if let Err(log_err) = processor.write_error(kind, &err.to_string()) {
                    tracing::warn!(error = %log_err, "could not write error log");
                }
                return Err(err.into());
            }
        };
        let processed = processor.process(kind, &response)?;
        tracing::info!(
            %kind,
            status = processed.status,
            code = ?processed.code,
            chained = ?processed.chained,
            "receipt run finished"
        );

        Ok(RunOutcome {
            kind,
            receipt_seq,
            document,
            document_path,
            signed_path,
            signed_sha256,
            response,
            processed,
        })
    }
}
