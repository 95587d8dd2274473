//! Ed25519 keys for attribute claims.
//!
//! A claim is never signed as raw bytes: the encoded payload is first
//! digested under its own hashing domain, and the 32-byte digest is what the
//! key signs. A signature over a claim can therefore never be replayed as a
//! signature over a content blob or a node allocation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hasher::ContentHasher;

const CLAIM_SIGNING: ContentHasher = ContentHasher::new("tk-claim-sig-v1");

/// Private half of a claim signer. Held by the store that appends claims.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Public half of a claim signer. Travels inside every signed claim and is
/// written as 64 hex characters.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Signature over a claim payload digest, written as 128 hex characters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

/// Why a claim signature or key was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("claim signature does not match payload")]
    InvalidSignature,
    #[error("malformed claim signer key")]
    InvalidKey,
}

impl SigningKey {
    /// Fresh key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_bytes(seed: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&seed))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign an encoded claim payload.
    pub fn sign_claim(&self, payload: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        let digest = CLAIM_SIGNING.hash(payload);
        Signature(self.0.sign(digest.as_bytes()).to_bytes())
    }
}

impl VerifyingKey {
    /// Check `signature` against an encoded claim payload.
    pub fn verify_claim(&self, payload: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let digest = CLAIM_SIGNING.hash(payload);
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.0
            .verify_strict(digest.as_bytes(), &signature)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl std::str::FromStr for VerifyingKey {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 32] = hex::decode(s)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(SignatureError::InvalidKey)?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }
}

impl std::str::FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s)
            .ok()
            .and_then(|b| b.try_into().ok())
            .map(Self)
            .ok_or(SignatureError::InvalidSignature)
    }
}

impl Serialize for VerifyingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VerifyingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", &self.to_hex()[..8])
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..6]))
    }
}
