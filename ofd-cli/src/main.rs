use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ofd_core::config::{Config, EnvironmentType, ReceiptProfile};
use ofd_core::pipeline::{ReceiptRequest, ReceiptRun, RunOutcome, order_items};
use ofd_core::qr::unescape_url;
use ofd_core::receipt::order::OrderDocument;
use ofd_core::receipt::{Payment, PaymentType, ReceiptKind};

#[derive(Parser)]
#[command(name = "ofd")]
#[command(about = "Build, sign and submit fiscal receipts to the OFD")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Merchant profile (JSON).
    #[arg(long, global = true, env = "OFD_PROFILE", default_value = "config/profile.json")]
    profile: PathBuf,
    /// Order document with the receipt items (JSON).
    #[arg(long, global = true, env = "OFD_ITEMS", default_value = "db/order_default.json")]
    items: PathBuf,
    #[arg(long, global = true, env = "OFD_ENV", default_value = "test", value_parser = EnvironmentType::from_str)]
    env: EnvironmentType,
    /// Receipt endpoint; overrides the environment default.
    #[arg(long, global = true, env = "OFD_RECEIPT_URL")]
    url: Option<String>,
    #[arg(long, global = true, env = "OFD_CERT", default_value = "certificates/merchant.crt")]
    cert: PathBuf,
    #[arg(long, global = true, env = "OFD_KEY", default_value = "certificates/merchant.key")]
    key: PathBuf,
    /// Directory holding `logs/` and `keys/`.
    #[arg(long, global = true, env = "OFD_STATE_DIR", default_value = ".")]
    state_dir: PathBuf,
    /// Overrides the profile's payment type.
    #[arg(long, global = true, env = "OFD_PAYMENT_TYPE", value_parser = PaymentType::from_str)]
    payment_type: Option<PaymentType>,
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,
}

impl GlobalArgs {
    fn config(&self) -> Config {
        let mut config = Config::new(self.env, &self.cert, &self.key)
            .with_state_dir(&self.state_dir)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(url) = &self.url {
            config = config.with_endpoint(url);
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sale receipt; chains into later refund and credit receipts.
    Sale,
    /// Refund of the last sale.
    Refund,
    /// Advance (prepayment) receipt.
    Advance {
        #[arg(long, env = "OFD_ADVANCE_CONTRACT_ID")]
        contract_id: String,
        #[arg(long)]
        received_cash: Option<i64>,
        #[arg(long)]
        received_card: Option<i64>,
    },
    /// Credit receipt against the last sale.
    Credit,
    /// Refund of the last credit receipt.
    CreditRefund,
    /// Decode an escaped QR code URL.
    Qr {
        /// URL as returned in `QRCodeURL`.
        escaped: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ofd_cli=info,ofd_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sale => run_receipt(&cli.global, ReceiptKind::Sale, None).await?,
        Commands::Refund => run_receipt(&cli.global, ReceiptKind::Refund, None).await?,
        Commands::Advance {
            contract_id,
            received_cash,
            received_card,
        } => {
            let advance = Advance {
                contract_id,
                received_cash,
                received_card,
            };
            run_receipt(&cli.global, ReceiptKind::Advance, Some(advance)).await?
        }
        Commands::Credit => run_receipt(&cli.global, ReceiptKind::Credit, None).await?,
        Commands::CreditRefund => {
            run_receipt(&cli.global, ReceiptKind::CreditRefund, None).await?
        }
        Commands::Qr { escaped } => {
            println!("{}", unescape_url(&escaped));
        }
    }

    Ok(())
}

struct Advance {
    contract_id: String,
    received_cash: Option<i64>,
    received_card: Option<i64>,
}

async fn run_receipt(global: &GlobalArgs, kind: ReceiptKind, advance: Option<Advance>) -> Result<()> {
    let profile = ReceiptProfile::load(&global.profile)
        .with_context(|| format!("loading profile {}", global.profile.display()))?;
    let order = OrderDocument::load(&global.items)
        .with_context(|| format!("loading items {}", global.items.display()))?;
    let items = order_items(kind, &profile, &order)?;

    let mut request =
        ReceiptRequest::from_profile(kind, &profile, items, chrono::Local::now().naive_local());
    if let (Some(payment_type), Payment::Policy(_)) = (global.payment_type, request.payment) {
        request.payment = Payment::Policy(payment_type);
    }
    if let Some(advance) = advance {
        request.advance_contract_id = Some(advance.contract_id);
        if advance.received_cash.is_some() || advance.received_card.is_some() {
            request.payment = Payment::Received {
                cash: advance.received_cash.unwrap_or(0),
                card: advance.received_card.unwrap_or(0),
            };
        }
    }

    tracing::debug!(%kind, items = request.items.len(), payment = ?request.payment, "request prepared");

    let run = ReceiptRun::from_config(global.config())?;
    let outcome = run
        .execute(request)
        .await
        .with_context(|| format!("{kind} receipt failed"))?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &RunOutcome) {
    println!("Receipt: {} #{}", outcome.kind, outcome.receipt_seq);
    println!("Document: {}", outcome.document_path.display());
    println!("Signed: {} (sha256 {})", outcome.signed_path.display(), outcome.signed_sha256);
    println!("Status: {}", outcome.processed.status);
    if let Some(code) = outcome.processed.code {
        println!("Code: {code}");
    }
    if let Some(message) = &outcome.processed.message {
        println!("Message: {message}");
    }
    if let Some(url) = &outcome.processed.qr_code_url {
        println!("QRCodeURL: {url}");
    }
    if let Some(key) = outcome.processed.chained {
        println!("Saved: {}", key.file_name());
    }
}
