//! The in-memory pool of transactions waiting to be mined.

use std::collections::HashMap;

use parking_lot::Mutex;
use strand_core::hash::Hash256;
use strand_core::transaction::Transaction;

/// A thread-safe pool of pending transactions, keyed by id.
#[derive(Default)]
pub struct Mempool {
    transactions: Mutex<HashMap<Hash256, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction) {
        self.transactions.lock().insert(tx.id, tx);
    }

    pub fn remove(&self, id: Hash256) -> Option<Transaction> {
        self.transactions.lock().remove(&id)
    }

    pub fn get(&self, id: Hash256) -> Option<Transaction> {
        self.transactions.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: Hash256) -> bool {
        self.transactions.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.lock().is_empty()
    }

    /// Remove and return every pending transaction.
    pub fn drain(&self) -> Vec<Transaction> {
        self.transactions.lock().drain().map(|(_, tx)| tx).collect()
    }
}
