//! The persisted UTXO index: a cache of [`Chain::find_utxo`] keyed by
//! `"utxo-" ‖ txid`, kept current incrementally as blocks are mined or
//! accepted instead of being recomputed from the full chain on every
//! lookup.

use std::collections::HashMap;
use std::sync::Arc;

use strand_core::address::Address;
use strand_core::block::Block;
use strand_core::constants::UTXO_PREFIX;
use strand_core::hash::{pubkey_hash, Hash256};
use strand_core::transaction::{Transaction, TxInput, TxOutput};
use strand_store::Store;

use crate::chain::Chain;
use crate::error::ChainError;

/// The unspent outputs of a single transaction, each paired with its
/// original index so a later partial spend doesn't renumber the rest.
#[derive(bincode::Encode, bincode::Decode)]
struct UtxoRecord {
    outputs: Vec<(i64, TxOutput)>,
}

fn utxo_key(txid: Hash256) -> Vec<u8> {
    let mut key = UTXO_PREFIX.to_vec();
    key.extend_from_slice(txid.as_bytes());
    key
}

fn encode_record(record: &UtxoRecord) -> Vec<u8> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .expect("encoding a utxo record cannot fail")
}

fn decode_record(bytes: &[u8]) -> Result<UtxoRecord, ChainError> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(record, _)| record)
        .map_err(|e| ChainError::Corrupt(e.to_string()))
}

/// A persisted, incrementally-maintained UTXO cache over a [`Chain`].
pub struct UtxoIndex<S: Store> {
    store: Arc<S>,
}

impl<S: Store> UtxoIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Rebuild the entire index from a full scan of the chain. Used on
    /// startup when a stored index is missing or suspected stale.
    pub fn reindex(&self, chain: &Chain<S>) -> Result<(), ChainError> {
        self.store.delete_by_prefix(UTXO_PREFIX)?;

        let snapshot = chain.find_utxo()?;
        self.store.update(|txn| {
            for (txid, outputs) in &snapshot {
                let record = UtxoRecord {
                    outputs: outputs.clone(),
                };
                txn.put(&utxo_key(*txid), &encode_record(&record));
            }
            Ok(())
        })?;

        Ok(())
    }

    /// Update the index for a newly-accepted block: inputs consume the
    /// outputs they reference, and each transaction's own outputs are
    /// recorded as newly spendable. Transactions are processed in block
    /// order, so an input spending an earlier transaction in the same
    /// block sees that transaction's freshly-written record.
    pub fn update(&self, block: &Block) -> Result<(), ChainError> {
        self.store.update(|txn| {
            for tx in &block.transactions {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        let key = utxo_key(input.ref_txid);
                        let Some(bytes) = txn.get(&key)? else {
                            continue;
                        };
                        let mut record = decode_record(&bytes)
                            .map_err(|e| strand_store::StoreError::Backend(e.to_string()))?;
                        record.outputs.retain(|(idx, _)| *idx != input.out_index);

                        if record.outputs.is_empty() {
                            txn.delete(&key);
                        } else {
                            txn.put(&key, &encode_record(&record));
                        }
                    }
                }

                let record = UtxoRecord {
                    outputs: tx
                        .outputs
                        .iter()
                        .enumerate()
                        .map(|(idx, out)| (idx as i64, *out))
                        .collect(),
                };
                txn.put(&utxo_key(tx.id), &encode_record(&record));
            }
            Ok(())
        })?;

        Ok(())
    }

    /// Select enough unspent outputs locked to `pubkey_hash` to cover
    /// `amount`, returning the accumulated value and, per referenced txid,
    /// the output indices selected.
    pub fn find_spendable_outputs(
        &self,
        pubkey_hash: &[u8; 20],
        amount: u64,
    ) -> Result<(u64, HashMap<Hash256, Vec<i64>>), ChainError> {
        let mut accumulated = 0u64;
        let mut unspent: HashMap<Hash256, Vec<i64>> = HashMap::new();

        for (key, value) in self.store.iterate_prefix(UTXO_PREFIX)? {
            if accumulated >= amount {
                break;
            }
            let txid = txid_from_key(&key)?;
            let record = decode_record(&value)?;

            for (idx, out) in &record.outputs {
                if accumulated >= amount {
                    break;
                }
                if out.is_locked_with(pubkey_hash) {
                    accumulated += out.value;
                    unspent.entry(txid).or_default().push(*idx);
                }
            }
        }

        Ok((accumulated, unspent))
    }

    /// Every unspent output locked to `pubkey_hash`.
    pub fn find_unspent_transactions(
        &self,
        pubkey_hash: &[u8; 20],
    ) -> Result<Vec<TxOutput>, ChainError> {
        let mut outputs = Vec::new();
        for (_, value) in self.store.iterate_prefix(UTXO_PREFIX)? {
            let record = decode_record(&value)?;
            outputs.extend(
                record
                    .outputs
                    .into_iter()
                    .map(|(_, out)| out)
                    .filter(|out| out.is_locked_with(pubkey_hash)),
            );
        }
        Ok(outputs)
    }

    /// Number of distinct transactions with at least one unspent output.
    pub fn count_transactions(&self) -> Result<usize, ChainError> {
        Ok(self.store.iterate_prefix(UTXO_PREFIX)?.len())
    }

    /// Build an unsigned transaction spending enough of `from_pubkey`'s
    /// unspent outputs to send `amount` to `to`, with any excess returned
    /// to the sender as a change output.
    ///
    /// The returned transaction's inputs carry the spending `pub_key` but
    /// an empty `signature`; the caller must run it through
    /// [`Chain::sign_transaction`] before it is valid to mine or broadcast.
    pub fn build_transaction(
        &self,
        from_pubkey: &[u8],
        to: &Address,
        amount: u64,
    ) -> Result<Transaction, ChainError> {
        let from_hash = pubkey_hash(from_pubkey);
        let (accumulated, selected) = self.find_spendable_outputs(&from_hash, amount)?;
        if accumulated < amount {
            return Err(ChainError::InsufficientFunds {
                have: accumulated,
                need: amount,
            });
        }

        let mut inputs = Vec::new();
        for (txid, out_indices) in selected {
            for out_index in out_indices {
                inputs.push(TxInput {
                    ref_txid: txid,
                    out_index,
                    signature: Vec::new(),
                    pub_key: from_pubkey.to_vec(),
                });
            }
        }

        let mut outputs = vec![TxOutput::lock(amount, to)];
        if accumulated > amount {
            let change_address = Address::from_pubkey_hash(from_hash);
            outputs.push(TxOutput::lock(accumulated - amount, &change_address));
        }

        let mut tx = Transaction {
            id: Hash256::ZERO,
            inputs,
            outputs,
        };
        tx.id = tx.calculate_id();
        Ok(tx)
    }
}

fn txid_from_key(key: &[u8]) -> Result<Hash256, ChainError> {
    let suffix = key
        .strip_prefix(UTXO_PREFIX)
        .ok_or_else(|| ChainError::Corrupt("utxo key missing prefix".into()))?;
    let array: [u8; 32] = suffix
        .try_into()
        .map_err(|_| ChainError::Corrupt("utxo key suffix is not 32 bytes".into()))?;
    Ok(Hash256::from_bytes(array))
}
