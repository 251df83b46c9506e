//! Error types for the Strand ledger protocol.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("invalid address length: {0}")]
    InvalidLength(usize),
    #[error("unsupported address version: {0}")]
    InvalidVersion(u8),
    #[error("checksum mismatch")]
    InvalidChecksum,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key bytes")]
    InvalidPrivateKey,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("missing previous transaction: {0}")]
    MissingPrevTx(String),
    #[error("output index {index} out of range for tx {txid} ({len} outputs)")]
    OutputIndexOutOfRange { txid: String, index: i64, len: usize },
    #[error("invalid signature on input {index}")]
    InvalidSignature { index: usize },
    #[error("pubkey hash does not match referenced output at input {index}")]
    PubkeyHashMismatch { index: usize },
    #[error("conservation violated: inputs sum {inputs} != outputs sum {outputs}")]
    Unbalanced { inputs: u64, outputs: u64 },
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("proof-of-work nonce space exhausted")]
    NonceExhausted,
    #[error("block has no transactions")]
    EmptyTransactions,
    #[error("first transaction is not coinbase")]
    FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")]
    MultipleCoinbase,
}
