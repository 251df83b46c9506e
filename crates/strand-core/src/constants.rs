//! Protocol constants.

/// Fixed proof-of-work difficulty: number of leading zero bits a valid
/// block hash must have. See `pow::target`.
///
/// The original tutorial this ledger is modeled on varies between 12, 16,
/// and 18 across its revisions. 16 is chosen here: low enough that
/// `cargo test` mines blocks in well under a second, high enough to be a
/// nontrivial proof. See DESIGN.md for the full rationale.
pub const DIFFICULTY: u32 = 16;

/// Fixed mining reward paid to every coinbase transaction.
pub const MINING_REWARD: u64 = 100;

/// Address version byte. Only one version is currently defined.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Length in bytes of the Base58Check checksum appended to addresses.
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Length in bytes of a RIPEMD-160 public key hash.
pub const PUBKEY_HASH_LEN: usize = 20;

/// The key under which the chain tip hash is stored.
pub const TIP_KEY: &[u8] = b"lh";

/// Prefix under which UTXO records are stored: `"utxo-" ++ txid`.
pub const UTXO_PREFIX: &[u8] = b"utxo-";

/// Maximum number of keys deleted per write transaction during a bulk
/// prefix delete, to avoid unbounded transactions.
pub const DELETE_BATCH_SIZE: usize = 100_000;
