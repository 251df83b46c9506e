//! Wallet keystore error type.

use strand_core::error::{AddressError, CryptoError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("keystore i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("keystore serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no wallet found for address: {0}")]
    NotFound(String),
    #[error("malformed private key data for address {address}: {source}")]
    InvalidKeyData {
        address: String,
        source: CryptoError,
    },
    #[error(transparent)]
    Address(#[from] AddressError),
}
