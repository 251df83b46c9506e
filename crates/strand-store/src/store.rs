//! The key-value abstraction the chain, UTXO index, and wallet keystore are
//! built on. A single implementation ([`crate::RocksStore`]) backs it, but
//! keeping the chain logic behind this trait keeps storage concerns (column
//! families, batching, lock recovery) out of `strand-chain`.

use crate::error::StoreError;

/// A read/write handle into an in-progress transaction.
///
/// Reads inside a transaction observe prior writes made through the same
/// handle (read-your-own-writes), even before the transaction commits.
pub trait Txn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// A read-only handle into a consistent snapshot.
pub trait ReadTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// A flat key-value store with transactional update/view scopes.
///
/// Every key lives in a single flat namespace: block hashes, the `"lh"`
/// chain-tip pointer, and `"utxo-" ‖ txid` UTXO records all share it,
/// distinguished only by key prefix.
pub trait Store: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;
    fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Run `f` against a writable transaction, committing its writes
    /// atomically if `f` returns `Ok`.
    fn update(&self, f: impl FnOnce(&mut dyn Txn) -> Result<(), StoreError>) -> Result<(), StoreError>;

    /// Run `f` against a read-only, consistent view of the store.
    fn view(&self, f: impl FnOnce(&dyn ReadTxn) -> Result<(), StoreError>) -> Result<(), StoreError>;

    /// Delete every key with the given prefix, batching commits so no
    /// single transaction grows unbounded. Returns the number of keys
    /// deleted.
    fn delete_by_prefix(&self, prefix: &[u8]) -> Result<usize, StoreError>;

    /// Flush any buffered writes to disk. Called on shutdown so a
    /// `std::process::exit` after a signal doesn't drop writes the backend
    /// hadn't yet synced.
    fn close(&self) -> Result<(), StoreError>;
}
