//! Transactions: coinbase issuance, input/output spending, and the
//! per-input ECDSA signature scheme.
//!
//! Signing and verification both work over a "trimmed copy" of the
//! transaction: a copy with every input's `signature` cleared and, one
//! input at a time, that input's `pub_key` field temporarily replaced with
//! the pubkey hash of the output it spends. The id of that copy is the
//! digest each input's signature actually covers. This mirrors the
//! original scheme exactly, including signing the copy's id directly
//! (no additional hashing) via [`crate::keys`]'s prehash entry points.

use std::collections::HashMap;

use crate::address::Address;
use crate::constants::MINING_REWARD;
use crate::error::TransactionError;
use crate::hash::{pubkey_hash, sha256, Hash256};
use crate::keys::{KeyPair, PublicKey};

/// A reference to a previous transaction's output, plus the data needed to
/// spend it.
///
/// `out_index` is signed: a coinbase input carries the literal marker
/// value `-1` rather than a real output index.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TxInput {
    pub ref_txid: Hash256,
    pub out_index: i64,
    pub signature: Vec<u8>,
    pub pub_key: Vec<u8>,
}

impl TxInput {
    /// Whether this input is the single input of a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.out_index == -1
    }

    /// Whether `pub_key` hashes to `pubkey_hash_to_match`, i.e. whether this
    /// input is authorized to spend an output locked to that hash.
    pub fn uses_key(&self, pubkey_hash_to_match: &[u8; 20]) -> bool {
        pubkey_hash(&self.pub_key) == *pubkey_hash_to_match
    }
}

/// A spendable output, locked to the hash of a public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TxOutput {
    pub value: u64,
    pub pubkey_hash: [u8; 20],
}

impl TxOutput {
    /// Build an output locking `value` to `address`.
    pub fn lock(value: u64, address: &Address) -> Self {
        Self {
            value,
            pubkey_hash: address.pubkey_hash(),
        }
    }

    /// Whether this output is locked to `pubkey_hash_to_match`.
    pub fn is_locked_with(&self, pubkey_hash_to_match: &[u8; 20]) -> bool {
        self.pubkey_hash == *pubkey_hash_to_match
    }
}

/// A transaction: a coinbase issuance (single input with `out_index == -1`
/// and no real signature) or a transfer spending one or more prior outputs.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Mint a coinbase transaction crediting `to` with the fixed mining
    /// reward. `data` is arbitrary free-form bytes (e.g. an identifying
    /// tag); it is not interpreted.
    pub fn coinbase(to: &Address, data: Vec<u8>) -> Self {
        let input = TxInput {
            ref_txid: Hash256::ZERO,
            out_index: -1,
            signature: Vec::new(),
            pub_key: data,
        };
        let output = TxOutput::lock(MINING_REWARD, to);
        let mut tx = Self {
            id: Hash256::ZERO,
            inputs: vec![input],
            outputs: vec![output],
        };
        tx.id = tx.calculate_id();
        tx
    }

    /// Whether this is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// The id of this transaction: the hash of its bincode-serialized
    /// inputs and outputs (not including the id field itself).
    pub fn calculate_id(&self) -> Hash256 {
        let body = TxBody {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        };
        let bytes = bincode::encode_to_vec(&body, bincode::config::standard())
            .expect("encoding a transaction body cannot fail");
        sha256(&bytes)
    }

    /// A copy with every input's signature and pub_key cleared, used as the
    /// starting point for both signing and verification.
    fn trimmed_copy(&self) -> Self {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                ref_txid: input.ref_txid,
                out_index: input.out_index,
                signature: Vec::new(),
                pub_key: Vec::new(),
            })
            .collect();
        Self {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Sign every non-coinbase input against the outputs it spends.
    ///
    /// `prev_txs` must contain, keyed by txid, every transaction referenced
    /// by this transaction's inputs.
    pub fn sign(
        &mut self,
        priv_key: &KeyPair,
        prev_txs: &HashMap<Hash256, Transaction>,
    ) -> Result<(), TransactionError> {
        if self.is_coinbase() {
            return Ok(());
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.ref_txid) {
                return Err(TransactionError::MissingPrevTx(input.ref_txid.to_string()));
            }
        }

        let mut tx_copy = self.trimmed_copy();

        for (idx, input) in self.inputs.iter().enumerate() {
            let prev_tx = &prev_txs[&input.ref_txid];
            let prev_output = output_at(prev_tx, input.ref_txid, input.out_index)?;

            tx_copy.inputs[idx].signature = Vec::new();
            tx_copy.inputs[idx].pub_key = prev_output.pubkey_hash.to_vec();
            tx_copy.id = tx_copy.calculate_id();

            let signature = priv_key
                .sign_digest(&tx_copy.id)
                .map_err(TransactionError::Crypto)?;

            tx_copy.inputs[idx].pub_key = Vec::new();

            self.inputs[idx].signature = signature.to_vec();
        }

        Ok(())
    }

    /// Verify every input's signature and spending authorization, and, for
    /// non-coinbase transactions, that total input value equals total
    /// output value.
    pub fn verify(
        &self,
        prev_txs: &HashMap<Hash256, Transaction>,
    ) -> Result<bool, TransactionError> {
        if self.is_coinbase() {
            return Ok(true);
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.ref_txid) {
                return Err(TransactionError::MissingPrevTx(input.ref_txid.to_string()));
            }
        }

        let mut tx_copy = self.trimmed_copy();
        let mut total_in: u64 = 0;

        for (idx, input) in self.inputs.iter().enumerate() {
            let prev_tx = &prev_txs[&input.ref_txid];
            let prev_output = output_at(prev_tx, input.ref_txid, input.out_index)?;

            if !input.uses_key(&prev_output.pubkey_hash) {
                return Err(TransactionError::PubkeyHashMismatch { index: idx });
            }

            tx_copy.inputs[idx].signature = Vec::new();
            tx_copy.inputs[idx].pub_key = prev_output.pubkey_hash.to_vec();
            tx_copy.id = tx_copy.calculate_id();
            tx_copy.inputs[idx].pub_key = Vec::new();

            let public_key =
                PublicKey::from_bytes(&input.pub_key).map_err(TransactionError::Crypto)?;
            public_key
                .verify_digest(&tx_copy.id, &input.signature)
                .map_err(|_| TransactionError::InvalidSignature { index: idx })?;

            total_in += prev_output.value;
        }

        let total_out: u64 = self.outputs.iter().map(|o| o.value).sum();
        if total_in != total_out {
            return Err(TransactionError::Unbalanced {
                inputs: total_in,
                outputs: total_out,
            });
        }

        Ok(true)
    }
}

/// Look up the output an input references, mapping an out-of-range index to
/// [`TransactionError::OutputIndexOutOfRange`].
fn output_at(
    prev_tx: &Transaction,
    txid: Hash256,
    out_index: i64,
) -> Result<&TxOutput, TransactionError> {
    usize::try_from(out_index)
        .ok()
        .and_then(|i| prev_tx.outputs.get(i))
        .ok_or(TransactionError::OutputIndexOutOfRange {
            txid: txid.to_string(),
            index: out_index,
            len: prev_tx.outputs.len(),
        })
}

#[derive(bincode::Encode)]
struct TxBody {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr() -> (KeyPair, Address) {
        let kp = KeyPair::generate();
        let addr = Address::from_pubkey(&kp.public_key().to_bytes());
        (kp, addr)
    }

    #[test]
    fn coinbase_has_marker_out_index() {
        let (_, to) = addr();
        let tx = Transaction::coinbase(&to, b"genesis".to_vec());
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs[0].out_index, -1);
        assert_eq!(tx.outputs[0].value, MINING_REWARD);
    }

    #[test]
    fn coinbase_verifies_trivially() {
        let (_, to) = addr();
        let tx = Transaction::coinbase(&to, b"data".to_vec());
        assert!(tx.verify(&HashMap::new()).unwrap());
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (from_kp, from_addr) = addr();
        let (_, to_addr) = addr();

        let funding = Transaction::coinbase(&from_addr, b"fund".to_vec());
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        let mut spend = Transaction {
            id: Hash256::ZERO,
            inputs: vec![TxInput {
                ref_txid: funding.id,
                out_index: 0,
                signature: Vec::new(),
                pub_key: from_kp.public_key().to_bytes().to_vec(),
            }],
            outputs: vec![TxOutput::lock(MINING_REWARD, &to_addr)],
        };
        spend.id = spend.calculate_id();
        spend.sign(&from_kp, &prev_txs).unwrap();

        assert!(spend.verify(&prev_txs).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let (from_kp, from_addr) = addr();
        let (_, to_addr) = addr();

        let funding = Transaction::coinbase(&from_addr, b"fund".to_vec());
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        let mut spend = Transaction {
            id: Hash256::ZERO,
            inputs: vec![TxInput {
                ref_txid: funding.id,
                out_index: 0,
                signature: Vec::new(),
                pub_key: from_kp.public_key().to_bytes().to_vec(),
            }],
            outputs: vec![TxOutput::lock(MINING_REWARD, &to_addr)],
        };
        spend.id = spend.calculate_id();
        spend.sign(&from_kp, &prev_txs).unwrap();
        spend.inputs[0].signature[0] ^= 0x01;

        assert!(spend.verify(&prev_txs).is_err());
    }

    #[test]
    fn verify_rejects_unbalanced_value() {
        let (from_kp, from_addr) = addr();
        let (_, to_addr) = addr();

        let funding = Transaction::coinbase(&from_addr, b"fund".to_vec());
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        let mut spend = Transaction {
            id: Hash256::ZERO,
            inputs: vec![TxInput {
                ref_txid: funding.id,
                out_index: 0,
                signature: Vec::new(),
                pub_key: from_kp.public_key().to_bytes().to_vec(),
            }],
            // Mint more than the input actually carries.
            outputs: vec![TxOutput::lock(MINING_REWARD + 1, &to_addr)],
        };
        spend.id = spend.calculate_id();
        spend.sign(&from_kp, &prev_txs).unwrap();

        assert_eq!(
            spend.verify(&prev_txs),
            Err(TransactionError::Unbalanced {
                inputs: MINING_REWARD,
                outputs: MINING_REWARD + 1
            })
        );
    }

    #[test]
    fn verify_rejects_wrong_spending_key() {
        let (from_kp, from_addr) = addr();
        let (other_kp, _) = addr();
        let (_, to_addr) = addr();

        let funding = Transaction::coinbase(&from_addr, b"fund".to_vec());
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());

        // Forged input: claims to spend `funding`'s output but presents a
        // different key than the one it's locked to.
        let mut spend = Transaction {
            id: Hash256::ZERO,
            inputs: vec![TxInput {
                ref_txid: funding.id,
                out_index: 0,
                signature: Vec::new(),
                pub_key: other_kp.public_key().to_bytes().to_vec(),
            }],
            outputs: vec![TxOutput::lock(MINING_REWARD, &to_addr)],
        };
        spend.id = spend.calculate_id();
        let _ = from_kp; // only `other_kp` signs the forged input below
        spend.sign(&other_kp, &prev_txs).unwrap();

        assert_eq!(
            spend.verify(&prev_txs),
            Err(TransactionError::PubkeyHashMismatch { index: 0 })
        );
    }

    #[test]
    fn missing_prev_tx_is_rejected() {
        let (from_kp, _) = addr();
        let (_, to_addr) = addr();

        let mut spend = Transaction {
            id: Hash256::ZERO,
            inputs: vec![TxInput {
                ref_txid: Hash256([9u8; 32]),
                out_index: 0,
                signature: Vec::new(),
                pub_key: from_kp.public_key().to_bytes().to_vec(),
            }],
            outputs: vec![TxOutput::lock(MINING_REWARD, &to_addr)],
        };
        spend.id = spend.calculate_id();

        assert!(matches!(
            spend.verify(&HashMap::new()),
            Err(TransactionError::MissingPrevTx(_))
        ));
    }

    proptest! {
        /// Property 2 (transaction hash stability): encoding a transaction
        /// and decoding it back always yields the same id.
        #[test]
        fn tx_id_stable_across_bincode_round_trip(
            value in 1u64..1_000_000,
            data in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let to = Address::from_pubkey(&KeyPair::generate().public_key().to_bytes());
            let tx = Transaction::coinbase(&to, data);
            let _ = value;

            let bytes = bincode::encode_to_vec(&tx, bincode::config::standard()).unwrap();
            let (decoded, _): (Transaction, usize) =
                bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();

            prop_assert_eq!(decoded.id, tx.id);
            prop_assert_eq!(decoded.calculate_id(), tx.calculate_id());
        }
    }
}
