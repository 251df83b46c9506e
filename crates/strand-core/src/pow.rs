//! Proof-of-work: nonce search and validation against a fixed difficulty.
//!
//! The target is `1 << (256 - DIFFICULTY)`. Because that value's only set
//! bit sits at position `256 - DIFFICULTY` (counting from the
//! least-significant bit), a 256-bit big-endian value is below the target
//! if and only if its top `DIFFICULTY` bits are all zero. That lets the
//! comparison be done as a leading-zero-bit count instead of pulling in a
//! bignum dependency for a single `<` check.

use crate::constants::DIFFICULTY;
use crate::error::BlockError;
use crate::hash::{sha256, Hash256};

/// Header fields hashed together to produce the proof-of-work puzzle.
pub struct PowHeader {
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: i64,
    pub difficulty: u32,
    pub nonce: u64,
}

impl PowHeader {
    fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 32 + 8 + 4 + 8);
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.difficulty.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data
    }

    fn hash(&self) -> Hash256 {
        sha256(&self.to_bytes())
    }
}

/// Count of leading zero bits in a 256-bit big-endian value.
fn leading_zero_bits(bytes: &[u8; 32]) -> u32 {
    let mut count = 0u32;
    for &b in bytes {
        if b == 0 {
            count += 8;
            continue;
        }
        count += b.leading_zeros();
        break;
    }
    count
}

/// Whether `hash` is numerically below the fixed-difficulty target.
pub fn meets_target(hash: &Hash256) -> bool {
    leading_zero_bits(hash.as_bytes()) >= DIFFICULTY
}

/// Run the proof-of-work search for a candidate header, starting the nonce
/// at 0 and incrementing until the hash meets the target.
///
/// Returns the winning `(nonce, hash)` pair. Fails with
/// [`BlockError::NonceExhausted`] if the 64-bit nonce space is exhausted
/// without finding a solution (not expected at the configured difficulty).
pub fn run(prev_hash: Hash256, merkle_root: Hash256, timestamp: i64) -> Result<(u64, Hash256), BlockError> {
    let mut header = PowHeader {
        prev_hash,
        merkle_root,
        timestamp,
        difficulty: DIFFICULTY,
        nonce: 0,
    };

    loop {
        let hash = header.hash();
        if meets_target(&hash) {
            return Ok((header.nonce, hash));
        }
        header.nonce = header
            .nonce
            .checked_add(1)
            .ok_or(BlockError::NonceExhausted)?;
    }
}

/// Validate that a block header with the given fields and claimed
/// `nonce`/`hash` actually satisfies the proof-of-work.
pub fn validate(
    prev_hash: Hash256,
    merkle_root: Hash256,
    timestamp: i64,
    nonce: u64,
    claimed_hash: Hash256,
) -> bool {
    let header = PowHeader {
        prev_hash,
        merkle_root,
        timestamp,
        difficulty: DIFFICULTY,
        nonce,
    };
    header.hash() == claimed_hash && meets_target(&claimed_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_produces_hash_meeting_target() {
        let (_, hash) = run(Hash256::ZERO, Hash256::ZERO, 1_700_000_000).unwrap();
        assert!(meets_target(&hash));
    }

    #[test]
    fn validate_accepts_freshly_mined_header() {
        let prev = Hash256([3u8; 32]);
        let root = Hash256([4u8; 32]);
        let ts = 1_700_000_000;
        let (nonce, hash) = run(prev, root, ts).unwrap();
        assert!(validate(prev, root, ts, nonce, hash));
    }

    #[test]
    fn validate_rejects_tampered_nonce() {
        let prev = Hash256([3u8; 32]);
        let root = Hash256([4u8; 32]);
        let ts = 1_700_000_000;
        let (nonce, hash) = run(prev, root, ts).unwrap();
        assert!(!validate(prev, root, ts, nonce.wrapping_add(1), hash));
    }

    #[test]
    fn validate_rejects_hash_not_matching_header() {
        let prev = Hash256([3u8; 32]);
        let root = Hash256([4u8; 32]);
        let ts = 1_700_000_000;
        let (nonce, _) = run(prev, root, ts).unwrap();
        let fake_hash = Hash256([0u8; 32]); // trivially meets target but doesn't match header
        assert!(!validate(prev, root, ts, nonce, fake_hash));
    }

    #[test]
    fn leading_zero_bits_all_zero() {
        assert_eq!(leading_zero_bits(&[0u8; 32]), 256);
    }

    #[test]
    fn leading_zero_bits_msb_set() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        assert_eq!(leading_zero_bits(&bytes), 0);
    }

    #[test]
    fn meets_target_with_exactly_difficulty_leading_zeros() {
        // A value whose first set bit comes right after DIFFICULTY leading
        // zero bits is strictly less than `2^(256-DIFFICULTY)`, so it meets
        // the target.
        let mut bytes = [0u8; 32];
        let byte_index = (DIFFICULTY / 8) as usize;
        let bit_in_byte = 7 - (DIFFICULTY % 8);
        bytes[byte_index] = 1 << bit_in_byte;
        assert!(meets_target(&Hash256(bytes)));
    }

    #[test]
    fn fails_target_with_one_fewer_leading_zero() {
        // One fewer leading zero bit than required pushes the value at or
        // above the target.
        let mut bytes = [0u8; 32];
        let shifted = DIFFICULTY - 1;
        let byte_index = (shifted / 8) as usize;
        let bit_in_byte = 7 - (shifted % 8);
        bytes[byte_index] = 1 << bit_in_byte;
        assert!(!meets_target(&Hash256(bytes)));
    }
}
