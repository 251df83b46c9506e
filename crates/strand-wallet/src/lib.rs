//! File-backed keystore for the Strand ledger: a `Wallet` wraps one
//! keypair, `Wallets` is the per-node collection persisted to disk.
//! Neither the chain nor the network crate link against this one — private
//! keys only ever live in the CLI process that owns them.

mod error;
mod wallet;
mod wallets;

pub use error::WalletError;
pub use wallet::Wallet;
pub use wallets::Wallets;
