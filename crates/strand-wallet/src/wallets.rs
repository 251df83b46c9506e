//! File-backed collection of wallets, keyed by address.
//!
//! Persisted as JSON at `<base_dir>/wallets_<node_id>.data`: a flat map of
//! address string to the hex-encoded private scalar. The CLI binary passes
//! `tmp/wallets` as `base_dir`, matching the on-disk layout this ledger's
//! keystore is modeled on. Loading a node id with no file on disk yet is
//! not an error — a brand-new node simply starts with an empty set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use strand_core::keys::KeyPair;

use crate::error::WalletError;
use crate::wallet::Wallet;

fn wallet_file_path(base_dir: &Path, node_id: &str) -> PathBuf {
    base_dir.join(format!("wallets_{node_id}.data"))
}

/// On-disk representation: address -> hex-encoded private scalar.
type WalletFile = HashMap<String, String>;

/// All wallets known to one node, loaded from and savable back to its
/// keystore file.
#[derive(Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    /// Load the keystore for `node_id` under `base_dir`, or start empty if
    /// none exists yet.
    pub fn new(base_dir: &Path, node_id: &str) -> Result<Self, WalletError> {
        let mut wallets = Self::default();
        wallets.load_from_file(base_dir, node_id)?;
        Ok(wallets)
    }

    /// Generate a new wallet, add it to the in-memory set, and return its
    /// address. Callers must call [`Wallets::save_to_file`] to persist it.
    pub fn create_wallet(&mut self) -> String {
        let wallet = Wallet::new();
        let address = wallet.address().to_string();
        self.wallets.insert(address.clone(), wallet);
        address
    }

    /// Every known address, sorted for stable output ordering.
    pub fn get_all_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Write every wallet to `node_id`'s keystore file under `base_dir`,
    /// creating the directory if needed.
    pub fn save_to_file(&self, base_dir: &Path, node_id: &str) -> Result<(), WalletError> {
        std::fs::create_dir_all(base_dir)?;

        let file: WalletFile = self
            .wallets
            .iter()
            .map(|(address, wallet)| {
                (
                    address.clone(),
                    hex::encode(wallet.key_pair().to_private_bytes()),
                )
            })
            .collect();

        let bytes = serde_json::to_vec_pretty(&file)?;
        std::fs::write(wallet_file_path(base_dir, node_id), bytes)?;
        Ok(())
    }

    /// Replace the in-memory set with whatever is in `node_id`'s keystore
    /// file under `base_dir`. A missing file leaves the set empty rather
    /// than erroring.
    pub fn load_from_file(&mut self, base_dir: &Path, node_id: &str) -> Result<(), WalletError> {
        let path = wallet_file_path(base_dir, node_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WalletError::Io(e)),
        };

        let file: WalletFile = serde_json::from_slice(&bytes)?;
        let mut wallets = HashMap::with_capacity(file.len());
        for (address, priv_hex) in file {
            let priv_bytes = hex::decode(&priv_hex).map_err(|_| WalletError::InvalidKeyData {
                address: address.clone(),
                source: strand_core::error::CryptoError::InvalidPrivateKey,
            })?;
            let key_pair = KeyPair::from_private_bytes(&priv_bytes).map_err(|source| {
                WalletError::InvalidKeyData {
                    address: address.clone(),
                    source,
                }
            })?;
            wallets.insert(address, Wallet::from_key_pair(key_pair));
        }

        self.wallets = wallets;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = Wallets::new(dir.path(), "test-missing").unwrap();
        assert!(wallets.get_all_addresses().is_empty());
    }

    #[test]
    fn create_then_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();

        let mut wallets = Wallets::new(dir.path(), "test-roundtrip").unwrap();
        let address = wallets.create_wallet();
        wallets.save_to_file(dir.path(), "test-roundtrip").unwrap();

        let reloaded = Wallets::new(dir.path(), "test-roundtrip").unwrap();
        assert_eq!(reloaded.get_all_addresses(), vec![address.clone()]);
        assert_eq!(
            reloaded.get_wallet(&address).unwrap().address().as_str(),
            address
        );
    }

    #[test]
    fn create_wallet_twice_yields_two_distinct_addresses() {
        let dir = tempfile::tempdir().unwrap();

        let mut wallets = Wallets::new(dir.path(), "test-two").unwrap();
        let a1 = wallets.create_wallet();
        let a2 = wallets.create_wallet();
        assert_ne!(a1, a2);
        assert_eq!(wallets.get_all_addresses().len(), 2);
    }

    #[test]
    fn separate_node_ids_do_not_share_wallets() {
        let dir = tempfile::tempdir().unwrap();

        let mut a = Wallets::new(dir.path(), "node-a").unwrap();
        a.create_wallet();
        a.save_to_file(dir.path(), "node-a").unwrap();

        let b = Wallets::new(dir.path(), "node-b").unwrap();
        assert!(b.get_all_addresses().is_empty());
    }
}
