//! Blocks: an ordered batch of transactions chained to a predecessor by
//! hash, sealed by proof-of-work.

use crate::error::BlockError;
use crate::hash::Hash256;
use crate::merkle::MerkleTree;
use crate::pow;
use crate::transaction::Transaction;

/// A mined block.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    pub timestamp: i64,
    pub prev_hash: Hash256,
    pub transactions: Vec<Transaction>,
    pub merkle_root: Hash256,
    pub nonce: u64,
    pub hash: Hash256,
    pub height: u64,
}

impl Block {
    /// Assemble and mine a new block on top of `prev_hash`.
    ///
    /// `txs` must be non-empty, with exactly one coinbase transaction in
    /// first position.
    pub fn new(
        txs: Vec<Transaction>,
        prev_hash: Hash256,
        height: u64,
        timestamp: i64,
    ) -> Result<Self, BlockError> {
        validate_tx_shape(&txs)?;

        let merkle_root = merkle_root_of(&txs);
        let (nonce, hash) = pow::run(prev_hash, merkle_root, timestamp)?;

        Ok(Self {
            timestamp,
            prev_hash,
            transactions: txs,
            merkle_root,
            nonce,
            hash,
            height,
        })
    }

    /// Build the genesis block: height 0, preceded by the all-zero hash.
    pub fn genesis(coinbase: Transaction, timestamp: i64) -> Result<Self, BlockError> {
        Self::new(vec![coinbase], Hash256::ZERO, 0, timestamp)
    }

    /// Whether this is the chain's genesis block.
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_hash.is_zero()
    }

    /// Recompute the Merkle root and proof-of-work hash and compare them
    /// against the stored values.
    pub fn validate_pow(&self) -> bool {
        let expected_root = merkle_root_of(&self.transactions);
        if expected_root != self.merkle_root {
            return false;
        }
        pow::validate(
            self.prev_hash,
            self.merkle_root,
            self.timestamp,
            self.nonce,
            self.hash,
        )
    }
}

fn merkle_root_of(txs: &[Transaction]) -> Hash256 {
    let leaves: Vec<Hash256> = txs.iter().map(|tx| tx.id).collect();
    MerkleTree::new(&leaves).root()
}

fn validate_tx_shape(txs: &[Transaction]) -> Result<(), BlockError> {
    let Some(first) = txs.first() else {
        return Err(BlockError::EmptyTransactions);
    };
    if !first.is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }
    if txs.iter().skip(1).any(Transaction::is_coinbase) {
        return Err(BlockError::MultipleCoinbase);
    }
    Ok(())
}
