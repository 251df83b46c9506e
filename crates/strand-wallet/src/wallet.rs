//! A single keypair plus the address it derives.

use strand_core::address::Address;
use strand_core::keys::KeyPair;

/// One address-holder's key material.
///
/// The ledger crates never see this type or the private scalar inside it;
/// only the CLI binary, which owns the keystore, reaches for `key_pair()`
/// to sign transactions.
pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    /// Generate a fresh wallet with a new random keypair.
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// Wrap an already-existing keypair, e.g. one reconstructed from a
    /// keystore file.
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The address this wallet's outputs are locked to.
    pub fn address(&self) -> Address {
        Address::from_pubkey(&self.key_pair.public_key().to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
