//! Cryptographic primitives for TiddlyKeep.
//!
//! Provides domain-separated BLAKE3 hashing for content handles and node
//! identities, and Ed25519 signing/verification for attribute claims.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
