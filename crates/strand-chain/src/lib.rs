//! Chain state: block storage and the tip pointer, the incrementally
//! maintained UTXO index, and the pending-transaction mempool.

pub mod chain;
pub mod error;
pub mod mempool;
pub mod utxo;

pub use chain::{Chain, ChainIterator, UtxoSnapshot};
pub use error::ChainError;
pub use mempool::Mempool;
pub use utxo::UtxoIndex;
