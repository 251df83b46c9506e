//! Storage error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("failed to unlock database: {0}")]
    LockRetryFailed(String),
}
