//! The chain itself: genesis, block storage, the tip pointer, and the
//! signing/verification glue that looks up a transaction's referenced
//! previous transactions by walking the chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use strand_core::address::Address;
use strand_core::block::Block;
use strand_core::constants::TIP_KEY;
use strand_core::hash::Hash256;
use strand_core::keys::KeyPair;
use strand_core::transaction::{Transaction, TxOutput};
use strand_store::{Store, StoreError};
use tracing::info;

use crate::error::ChainError;

/// Unspent outputs discovered by a full chain scan, keyed by the
/// transaction that created them. Each entry pairs an output's original
/// index within that transaction with the output itself, so indices
/// survive even when earlier outputs of the same transaction have already
/// been spent.
pub type UtxoSnapshot = HashMap<Hash256, Vec<(i64, TxOutput)>>;

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

pub(crate) fn encode_block(block: &Block) -> Vec<u8> {
    bincode::encode_to_vec(block, bincode::config::standard())
        .expect("encoding a block cannot fail")
}

pub(crate) fn decode_block(bytes: &[u8]) -> Result<Block, String> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(block, _)| block)
        .map_err(|e| e.to_string())
}

fn hash_from_key_bytes(bytes: &[u8]) -> Result<Hash256, ChainError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ChainError::Corrupt("tip pointer is not 32 bytes".into()))?;
    Ok(Hash256::from_bytes(array))
}

/// A handle onto a chain persisted in `S`.
pub struct Chain<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Chain<S> {
    /// Create a brand-new chain: mints the genesis block crediting
    /// `address` and writes it as both the sole block and the tip.
    ///
    /// Fails with [`ChainError::AlreadyExists`] if the store already has a
    /// tip pointer.
    pub fn init(store: Arc<S>, address: &Address) -> Result<Self, ChainError> {
        if store.get(TIP_KEY)?.is_some() {
            return Err(ChainError::AlreadyExists);
        }

        let coinbase = Transaction::coinbase(address, b"genesis".to_vec());
        let genesis = Block::genesis(coinbase, now_ts())?;
        let hash_bytes = *genesis.hash.as_bytes();

        store.update(|txn| {
            txn.put(genesis.hash.as_bytes(), &encode_block(&genesis));
            txn.put(TIP_KEY, &hash_bytes);
            Ok(())
        })?;

        info!(hash = %genesis.hash, "created genesis block");
        Ok(Self { store })
    }

    /// Open a chain that must already exist in the store.
    pub fn continue_chain(store: Arc<S>) -> Result<Self, ChainError> {
        if store.get(TIP_KEY)?.is_none() {
            return Err(ChainError::NotFound);
        }
        Ok(Self { store })
    }

    /// Flush the underlying store. Called from the node's signal handler
    /// before the process exits, so a `std::process::exit` doesn't skip the
    /// backend's own `Drop`-based cleanup.
    pub fn close_store(&self) -> Result<(), ChainError> {
        self.store.close()?;
        Ok(())
    }

    fn tip_hash(&self) -> Result<Hash256, ChainError> {
        let bytes = self
            .store
            .get(TIP_KEY)?
            .ok_or(ChainError::NotFound)?;
        hash_from_key_bytes(&bytes)
    }

    /// Fetch a block by hash.
    pub fn get_block(&self, hash: Hash256) -> Result<Option<Block>, ChainError> {
        match self.store.get(hash.as_bytes())? {
            Some(bytes) => decode_block(&bytes).map(Some).map_err(ChainError::Corrupt),
            None => Ok(None),
        }
    }

    /// Height of the current tip.
    pub fn get_best_height(&self) -> Result<u64, ChainError> {
        let tip_hash = self.tip_hash()?;
        let tip = self
            .get_block(tip_hash)?
            .ok_or_else(|| ChainError::Corrupt("tip block missing from store".into()))?;
        Ok(tip.height)
    }

    /// Every block hash from the tip back to genesis, tip first.
    pub fn get_block_hashes(&self) -> Result<Vec<Hash256>, ChainError> {
        self.iterator().map(|b| b.map(|block| block.hash)).collect()
    }

    /// A finite, non-restartable iterator over blocks from the tip back to
    /// (and including) genesis.
    pub fn iterator(&self) -> ChainIterator<'_, S> {
        ChainIterator {
            store: &self.store,
            next_hash: self.tip_hash().ok(),
        }
    }

    /// Assemble and mine a block containing `txs`, atomically advancing the
    /// tip. The tip is read and the new block/tip are written inside a
    /// single store transaction, so two concurrent miners can't both read
    /// the same tip and then both successfully advance it.
    pub fn mine_block(&self, txs: &[Transaction]) -> Result<Block, ChainError> {
        for tx in txs {
            if !tx.is_coinbase() {
                self.verify_transaction(tx)?;
            }
        }

        let txs_owned = txs.to_vec();
        let timestamp = now_ts();
        let mut mined: Option<Block> = None;

        self.store.update(|txn| {
            let tip_bytes = txn
                .get(TIP_KEY)?
                .ok_or_else(|| StoreError::Backend("missing chain tip".into()))?;
            let tip_hash_array: [u8; 32] = tip_bytes
                .as_slice()
                .try_into()
                .map_err(|_| StoreError::Backend("tip pointer is not 32 bytes".into()))?;
            let tip_hash = Hash256::from_bytes(tip_hash_array);

            let tip_block_bytes = txn
                .get(tip_hash.as_bytes())?
                .ok_or_else(|| StoreError::Backend("tip block missing from store".into()))?;
            let tip_block =
                decode_block(&tip_block_bytes).map_err(StoreError::Backend)?;

            let new_block = Block::new(txs_owned.clone(), tip_hash, tip_block.height + 1, timestamp)
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            txn.put(new_block.hash.as_bytes(), &encode_block(&new_block));
            txn.put(TIP_KEY, new_block.hash.as_bytes());

            mined = Some(new_block);
            Ok(())
        })?;

        let block = mined.ok_or_else(|| ChainError::Corrupt("mine_block produced no block".into()))?;
        info!(hash = %block.hash, height = block.height, "mined block");
        Ok(block)
    }

    /// Accept a block received from a peer. Idempotent if the hash is
    /// already known; otherwise persists it and advances the tip only if
    /// its height exceeds the current tip's (the chain's sole fork-choice
    /// rule). The tip is read and compared inside the same transaction that
    /// writes the block and (conditionally) the tip pointer, so two
    /// concurrent `add_block` calls can't both read a stale tip and disagree
    /// about who should win.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        if self.store.get(block.hash.as_bytes())?.is_some() {
            return Ok(());
        }

        let hash_bytes = *block.hash.as_bytes();
        let encoded = encode_block(&block);
        let mut raised_tip = false;

        self.store.update(|txn| {
            let current_height = match txn.get(TIP_KEY)? {
                Some(tip_bytes) => {
                    let tip_hash_array: [u8; 32] = tip_bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| StoreError::Backend("tip pointer is not 32 bytes".into()))?;
                    let tip_hash = Hash256::from_bytes(tip_hash_array);
                    let tip_block_bytes = txn
                        .get(tip_hash.as_bytes())?
                        .ok_or_else(|| StoreError::Backend("tip block missing from store".into()))?;
                    decode_block(&tip_block_bytes)
                        .map_err(StoreError::Backend)?
                        .height
                }
                None => 0,
            };

            txn.put(&hash_bytes, &encoded);
            if block.height > current_height {
                txn.put(TIP_KEY, &hash_bytes);
                raised_tip = true;
            }
            Ok(())
        })?;

        if raised_tip {
            info!(hash = %block.hash, height = block.height, "accepted block, advanced tip");
        }
        Ok(())
    }

    /// Find a transaction by id, walking the chain from the tip.
    pub fn find_transaction(&self, id: Hash256) -> Result<Transaction, ChainError> {
        for block in self.iterator() {
            let block = block?;
            if let Some(tx) = block.transactions.into_iter().find(|tx| tx.id == id) {
                return Ok(tx);
            }
        }
        Err(ChainError::TransactionNotFound(id.to_string()))
    }

    /// Full scan of every block, returning every output not yet referenced
    /// by a later input. This is the ground truth
    /// [`crate::utxo::UtxoIndex::reindex`] rebuilds its persisted index
    /// from.
    pub fn find_utxo(&self) -> Result<UtxoSnapshot, ChainError> {
        let mut spent: HashMap<Hash256, Vec<i64>> = HashMap::new();
        let mut utxo: UtxoSnapshot = HashMap::new();

        for block in self.iterator() {
            let block = block?;
            for tx in &block.transactions {
                'outputs: for (idx, out) in tx.outputs.iter().enumerate() {
                    let idx = idx as i64;
                    if let Some(spent_indices) = spent.get(&tx.id) {
                        if spent_indices.contains(&idx) {
                            continue 'outputs;
                        }
                    }
                    utxo.entry(tx.id).or_default().push((idx, *out));
                }

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent.entry(input.ref_txid).or_default().push(input.out_index);
                    }
                }
            }
        }

        Ok(utxo)
    }

    /// Collect every transaction this transaction's inputs reference, keyed
    /// by txid, as required by [`Transaction::sign`] / [`Transaction::verify`].
    fn collect_prev_txs(
        &self,
        tx: &Transaction,
    ) -> Result<HashMap<Hash256, Transaction>, ChainError> {
        let mut prev_txs = HashMap::new();
        for input in &tx.inputs {
            if !prev_txs.contains_key(&input.ref_txid) {
                let prev = self.find_transaction(input.ref_txid)?;
                prev_txs.insert(input.ref_txid, prev);
            }
        }
        Ok(prev_txs)
    }

    /// Sign every input of `tx` against the transactions it references.
    pub fn sign_transaction(&self, tx: &mut Transaction, priv_key: &KeyPair) -> Result<(), ChainError> {
        let prev_txs = self.collect_prev_txs(tx)?;
        tx.sign(priv_key, &prev_txs)?;
        Ok(())
    }

    /// Verify `tx` against the transactions it references.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<(), ChainError> {
        if tx.is_coinbase() {
            return Ok(());
        }
        let prev_txs = self.collect_prev_txs(tx)?;
        tx.verify(&prev_txs)?;
        Ok(())
    }
}

/// A finite, non-restartable iterator over a chain's blocks, tip-to-genesis.
pub struct ChainIterator<'a, S: Store> {
    store: &'a Arc<S>,
    next_hash: Option<Hash256>,
}

impl<S: Store> Iterator for ChainIterator<'_, S> {
    type Item = Result<Block, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash?;

        let bytes = match self.store.get(hash.as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.next_hash = None;
                return Some(Err(ChainError::Corrupt(format!(
                    "block {hash} missing from store"
                ))));
            }
            Err(e) => {
                self.next_hash = None;
                return Some(Err(ChainError::from(e)));
            }
        };

        match decode_block(&bytes) {
            Ok(block) => {
                self.next_hash = if block.prev_hash.is_zero() {
                    None
                } else {
                    Some(block.prev_hash)
                };
                Some(Ok(block))
            }
            Err(e) => {
                self.next_hash = None;
                Some(Err(ChainError::Corrupt(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::keys::KeyPair;
    use strand_store::RocksStore;

    fn chain_with_store() -> (Chain<RocksStore>, tempfile::TempDir, Address) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let kp = KeyPair::generate();
        let addr = Address::from_pubkey(&kp.public_key().to_bytes());
        let chain = Chain::init(store, &addr).unwrap();
        (chain, dir, addr)
    }

    #[test]
    fn init_creates_genesis_as_tip() {
        let (chain, _dir, _addr) = chain_with_store();
        assert_eq!(chain.get_best_height().unwrap(), 0);
        let hashes = chain.get_block_hashes().unwrap();
        assert_eq!(hashes.len(), 1);
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let kp = KeyPair::generate();
        let addr = Address::from_pubkey(&kp.public_key().to_bytes());
        Chain::init(store.clone(), &addr).unwrap();
        assert!(matches!(
            Chain::init(store, &addr),
            Err(ChainError::AlreadyExists)
        ));
    }

    #[test]
    fn continue_chain_without_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        assert!(matches!(
            Chain::continue_chain(store),
            Err(ChainError::NotFound)
        ));
    }

    #[test]
    fn mine_block_advances_tip() {
        let (chain, _dir, addr) = chain_with_store();
        let coinbase = Transaction::coinbase(&addr, Vec::new());
        let block = chain.mine_block(&[coinbase]).unwrap();
        assert_eq!(block.height, 1);
        assert_eq!(chain.get_best_height().unwrap(), 1);
    }

    #[test]
    fn add_block_ignores_lower_height() {
        let (chain, _dir, addr) = chain_with_store();
        let coinbase = Transaction::coinbase(&addr, Vec::new());
        let mined = chain.mine_block(&[coinbase]).unwrap();
        assert_eq!(chain.get_best_height().unwrap(), 1);

        // Re-adding the same block (same hash) is a no-op, not an error.
        chain.add_block(mined.clone()).unwrap();
        assert_eq!(chain.get_best_height().unwrap(), 1);
    }

    #[test]
    fn find_utxo_excludes_spent_outputs() {
        let (chain, _dir, addr) = chain_with_store();
        let genesis_hash = chain.get_block_hashes().unwrap()[0];
        let genesis = chain.get_block(genesis_hash).unwrap().unwrap();
        let coinbase_id = genesis.transactions[0].id;

        let utxo = chain.find_utxo().unwrap();
        assert_eq!(utxo[&coinbase_id].len(), 1);
    }

    #[test]
    fn find_transaction_locates_coinbase() {
        let (chain, _dir, _addr) = chain_with_store();
        let genesis_hash = chain.get_block_hashes().unwrap()[0];
        let genesis = chain.get_block(genesis_hash).unwrap().unwrap();
        let coinbase_id = genesis.transactions[0].id;

        let found = chain.find_transaction(coinbase_id).unwrap();
        assert_eq!(found.id, coinbase_id);
    }

    #[test]
    fn find_transaction_missing_errors() {
        let (chain, _dir, _addr) = chain_with_store();
        assert!(matches!(
            chain.find_transaction(Hash256([9u8; 32])),
            Err(ChainError::TransactionNotFound(_))
        ));
    }
}
