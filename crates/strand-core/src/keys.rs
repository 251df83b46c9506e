//! ECDSA key material over the P-256 curve.
//!
//! Public keys are carried on the wire and in transaction inputs as the raw,
//! fixed-width concatenation of their affine `X` and `Y` coordinates (64
//! bytes total, no SEC1 point-compression tag). Signatures are similarly
//! the fixed-width concatenation of `r` and `s` (64 bytes).
//!
//! Signing always operates on an already-hashed 32-byte digest (a
//! [`Hash256`]) via the "prehash" ECDSA entry point, matching the original
//! scheme of signing a transaction's own digest directly rather than
//! re-hashing it under the hood.

use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::EncodedPoint;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CryptoError;
use crate::hash::Hash256;

/// Width in bytes of an uncompressed P-256 public key (`X ‖ Y`, no tag byte).
pub const PUBLIC_KEY_LEN: usize = 64;

/// Width in bytes of a P-256 ECDSA signature (`r ‖ s`).
pub const SIGNATURE_LEN: usize = 64;

/// A P-256 ECDSA keypair.
///
/// The private scalar never leaves this type except via
/// [`KeyPair::to_private_bytes`], used only by the wallet keystore to
/// persist and later reconstruct it with [`KeyPair::from_private_bytes`].
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::random(&mut rng),
        }
    }

    /// Reconstruct a keypair from its private scalar bytes.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// The raw private scalar bytes. Only the wallet keystore should call this.
    pub fn to_private_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: *self.signing_key.verifying_key(),
        }
    }

    /// Sign a 32-byte digest, returning the fixed-width `r ‖ s` signature.
    pub fn sign_digest(&self, digest: &Hash256) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest.as_bytes())
            .map_err(|_| CryptoError::InvalidSignature)?;
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_private_bytes(&self.to_private_bytes())
            .expect("cloning a valid keypair cannot fail")
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// A P-256 public key, carried as the raw concatenation of its affine coordinates.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Parse a public key from its 64-byte `X ‖ Y` encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidPublicKey);
        }
        let mut sec1 = Vec::with_capacity(1 + PUBLIC_KEY_LEN);
        sec1.push(0x04); // uncompressed point tag, required by EncodedPoint
        sec1.extend_from_slice(bytes);
        let point =
            EncodedPoint::from_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)?;
        let verifying_key =
            VerifyingKey::from_encoded_point(&point).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key })
    }

    /// The raw 64-byte `X ‖ Y` encoding, with no compression tag.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.verifying_key.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify_digest(
        &self,
        digest: &Hash256,
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(CryptoError::InvalidSignature);
        }
        let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
        self.verifying_key
            .verify_prehash(digest.as_bytes(), &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes_as_vec(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

fn serde_bytes_as_vec<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    bytes.to_vec().serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_generate_is_unique() {
        let k1 = KeyPair::generate();
        let k2 = KeyPair::generate();
        assert_ne!(k1.public_key(), k2.public_key());
    }

    #[test]
    fn keypair_private_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let bytes = kp.to_private_bytes();
        let restored = KeyPair::from_private_bytes(&bytes).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn keypair_clone_preserves_key() {
        let kp = KeyPair::generate();
        let cloned = kp.clone();
        assert_eq!(kp.public_key(), cloned.public_key());
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let pk = kp.public_key();
        let bytes = pk.to_bytes();
        assert_eq!(bytes.len(), PUBLIC_KEY_LEN);
        let restored = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(pk, restored);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(PublicKey::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn sign_and_verify_digest() {
        let kp = KeyPair::generate();
        let digest = Hash256([7u8; 32]);
        let sig = kp.sign_digest(&digest).unwrap();
        assert!(kp.public_key().verify_digest(&digest, &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_flipped_signature_bit() {
        let kp = KeyPair::generate();
        let digest = Hash256([7u8; 32]);
        let mut sig = kp.sign_digest(&digest).unwrap();
        sig[0] ^= 0x01;
        assert!(kp.public_key().verify_digest(&digest, &sig).is_err());
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let digest = Hash256([9u8; 32]);
        let sig = kp1.sign_digest(&digest).unwrap();
        assert!(kp2.public_key().verify_digest(&digest, &sig).is_err());
    }

    #[test]
    fn verify_fails_with_wrong_digest() {
        let kp = KeyPair::generate();
        let sig = kp.sign_digest(&Hash256([1u8; 32])).unwrap();
        assert!(kp
            .public_key()
            .verify_digest(&Hash256([2u8; 32]), &sig)
            .is_err());
    }

    #[test]
    fn debug_hides_private_scalar() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        assert!(debug.contains("KeyPair"));
        let secret_hex = hex::encode(kp.to_private_bytes());
        assert!(!debug.contains(&secret_hex));
    }
}
