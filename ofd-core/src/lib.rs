//! Fiscal receipt toolkit for OFD submission: build, sign, submit and chain
//! sale, refund, advance, credit and credit-refund receipts.
//!
//! # Examples
//! ```rust
//! use ofd_core::config::{Config, EnvironmentType};
//!
//! let config = Config::new(EnvironmentType::Test, "certificates/merchant.crt", "certificates/merchant.key");
//! # let _ = config;
//! ```
pub mod api;
pub mod config;
pub mod pipeline;
pub mod qr;
pub mod receipt;
pub mod response;
pub mod sign;
pub mod state;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Receipt(#[from] receipt::ReceiptError),
    #[error(transparent)]
    Document(#[from] receipt::document::DocumentError),
    #[error(transparent)]
    Store(#[from] state::StoreError),
    #[error(transparent)]
    Signing(#[from] sign::SigningError),
    #[error(transparent)]
    Api(#[from] api::OfdError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl From<receipt::ValidationError> for Error {
    fn from(err: receipt::ValidationError) -> Self {
        Error::Receipt(err.into())
    }
}
