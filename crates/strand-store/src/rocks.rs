//! RocksDB-backed [`Store`] implementation.
//!
//! Ported from the original tutorial's BadgerDB usage: on open, a
//! lock-contention error (a stale `LOCK` file left behind by a process that
//! didn't shut down cleanly) is treated as recoverable — the lock file is
//! removed once and the open is retried. A second failure is fatal.

use std::collections::HashMap;
use std::path::Path;

use rocksdb::{Options, WriteBatch, DB};
use tracing::warn;

use strand_core::constants::DELETE_BATCH_SIZE;

use crate::error::StoreError;
use crate::store::{ReadTxn, Store, Txn};

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        match DB::open(&opts, path) {
            Ok(db) => Ok(Self { db }),
            Err(e) if e.to_string().contains("LOCK") => {
                warn!(error = %e, "database locked on open, removing stale LOCK file and retrying");
                let lock_path = path.join("LOCK");
                std::fs::remove_file(&lock_path)
                    .map_err(|e| StoreError::LockRetryFailed(e.to_string()))?;
                let db = DB::open(&opts, path)
                    .map_err(|e| StoreError::LockRetryFailed(e.to_string()))?;
                warn!("database unlocked after retry");
                Ok(Self { db })
            }
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }
}

struct RocksReadTxn<'a> {
    db: &'a DB,
}

impl ReadTxn for RocksReadTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        collect_prefix(self.db, prefix, None)
    }
}

/// A writable transaction: reads observe prior writes made through this
/// same handle before the batch is committed.
struct RocksTxn<'a> {
    db: &'a DB,
    batch: WriteBatch,
    pending: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Txn for RocksTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.pending.get(key) {
            return Ok(value.clone());
        }
        self.db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.batch.put(key, value);
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.batch.delete(key);
        self.pending.insert(key.to_vec(), None);
    }
}

impl Store for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db
            .put(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db
            .delete(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        collect_prefix(&self.db, prefix, None)
    }

    fn update(
        &self,
        f: impl FnOnce(&mut dyn Txn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut txn = RocksTxn {
            db: &self.db,
            batch: WriteBatch::default(),
            pending: HashMap::new(),
        };
        f(&mut txn)?;
        self.db
            .write(txn.batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn view(&self, f: impl FnOnce(&dyn ReadTxn) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let txn = RocksReadTxn { db: &self.db };
        f(&txn)
    }

    fn delete_by_prefix(&self, prefix: &[u8]) -> Result<usize, StoreError> {
        let mut total = 0usize;
        loop {
            let keys = collect_prefix(&self.db, prefix, Some(DELETE_BATCH_SIZE))?;
            if keys.is_empty() {
                break;
            }
            let mut batch = WriteBatch::default();
            for (key, _) in &keys {
                batch.delete(key);
            }
            self.db
                .write(batch)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let count = keys.len();
            total += count;
            if count < DELETE_BATCH_SIZE {
                break;
            }
        }
        Ok(total)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn collect_prefix(
    db: &DB,
    prefix: &[u8],
    limit: Option<usize>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let mut out = Vec::new();
    for item in db.prefix_iterator(prefix) {
        let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
        if !key.starts_with(prefix) {
            break;
        }
        out.push((key.to_vec(), value.to_vec()));
        if let Some(limit) = limit {
            if out.len() >= limit {
                break;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn get_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn delete_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.set(b"k", b"v").unwrap();
        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn iterate_prefix_returns_matching_keys_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.set(b"utxo-a", b"1").unwrap();
        store.set(b"utxo-b", b"2").unwrap();
        store.set(b"other", b"3").unwrap();

        let mut found = store.iterate_prefix(b"utxo-").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![
                (b"utxo-a".to_vec(), b"1".to_vec()),
                (b"utxo-b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn update_commits_all_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store
            .update(|txn| {
                txn.put(b"a", b"1");
                txn.put(b"b", b"2");
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn update_rolls_back_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let result = store.update(|txn| {
            txn.put(b"a", b"1");
            Err(StoreError::Backend("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn update_sees_its_own_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store
            .update(|txn| {
                txn.put(b"a", b"1");
                assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));
                txn.delete(b"a");
                assert_eq!(txn.get(b"a").unwrap(), None);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn delete_by_prefix_removes_all_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        for i in 0..10u8 {
            store.set(&[b"utxo-", &[i][..]].concat(), b"v").unwrap();
        }
        store.set(b"keep", b"v").unwrap();

        let deleted = store.delete_by_prefix(b"utxo-").unwrap();
        assert_eq!(deleted, 10);
        assert!(store.iterate_prefix(b"utxo-").unwrap().is_empty());
        assert_eq!(store.get(b"keep").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn reopen_after_clean_close_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.set(b"k", b"v").unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn close_flushes_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.set(b"k", b"v").unwrap();
        store.close().unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
