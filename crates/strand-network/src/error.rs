//! Network-layer error type.

use strand_chain::ChainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("malformed wire message: {0}")]
    MalformedMessage(String),
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
