//! Chain-level error type, folding in storage and core-type errors.

use strand_core::error::{BlockError, TransactionError};
use strand_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("a chain already exists in this store")]
    AlreadyExists,
    #[error("no chain found in this store")]
    NotFound,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
}
