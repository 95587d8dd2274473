use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tk_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use tk_types::ObjectId;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// How an attribute claim changes the attribute's value set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimOp {
    /// Replace every value with the claimed one.
    Set,
    /// Append the value unless already present.
    Add,
    /// Remove the value; an empty value removes all values.
    Delete,
}

impl std::fmt::Display for ClaimOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Set => write!(f, "set"),
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "del"),
        }
    }
}

/// What a claim asserts about its node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimBody {
    /// Mutate one attribute.
    Attribute {
        attr: String,
        op: ClaimOp,
        value: String,
    },
    /// Tombstone the node.
    Delete,
}

/// An unsigned mutation against a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub node: ObjectId,
    pub body: ClaimBody,
}

impl Claim {
    fn attribute(node: ObjectId, attr: &str, op: ClaimOp, value: impl Into<String>) -> Self {
        Self {
            node,
            body: ClaimBody::Attribute {
                attr: attr.to_string(),
                op,
                value: value.into(),
            },
        }
    }

    /// `attr = value`, replacing any previous values.
    pub fn set_attr(node: ObjectId, attr: &str, value: impl Into<String>) -> Self {
        Self::attribute(node, attr, ClaimOp::Set, value)
    }

    /// `attr += value`.
    pub fn add_attr(node: ObjectId, attr: &str, value: impl Into<String>) -> Self {
        Self::attribute(node, attr, ClaimOp::Add, value)
    }

    /// `attr -= value`.
    pub fn del_attr(node: ObjectId, attr: &str, value: impl Into<String>) -> Self {
        Self::attribute(node, attr, ClaimOp::Delete, value)
    }

    /// Tombstone for `node`.
    pub fn delete(node: ObjectId) -> Self {
        Self {
            node,
            body: ClaimBody::Delete,
        }
    }
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            ClaimBody::Attribute { attr, op, value } => {
                write!(f, "{op} {attr}={value:?} on {}", self.node.short_hex())
            }
            ClaimBody::Delete => write!(f, "delete {}", self.node.short_hex()),
        }
    }
}

/// A claim dated and signed by the party appending it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaim {
    pub claim: Claim,
    pub date: DateTime<Utc>,
    pub signer: VerifyingKey,
    pub signature: Signature,
}

fn signing_payload(
    claim: &Claim,
    date: &DateTime<Utc>,
    signer: &VerifyingKey,
) -> StoreResult<Vec<u8>> {
    bincode::serialize(&(claim, date, signer)).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl SignedClaim {
    /// Date and sign `claim` with `key`.
    pub fn sign(claim: Claim, date: DateTime<Utc>, key: &SigningKey) -> StoreResult<Self> {
        let signer = key.verifying_key();
        let payload = signing_payload(&claim, &date, &signer)?;
        let signature = key.sign_claim(&payload);
        Ok(Self {
            claim,
            date,
            signer,
            signature,
        })
    }

    /// Content handle of this claim (covers payload and signature).
    pub fn id(&self) -> StoreResult<ObjectId> {
        let bytes =
            bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(ContentHasher::CLAIM.hash(&bytes))
    }

    /// Check the signature against the embedded signer key.
    pub fn verify(&self) -> StoreResult<()> {
        let payload = signing_payload(&self.claim, &self.date, &self.signer)?;
        match self.signer.verify_claim(&payload, &self.signature) {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::BadSignature(self.id()?)),
        }
    }
}

/// The record whose hash names a freshly allocated node.
///
/// The nonce makes every allocation unique, so two nodes never collide even
/// when allocated by the same signer in the same instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAllocation {
    pub nonce: Uuid,
    pub signer: VerifyingKey,
    pub created: DateTime<Utc>,
}

impl NodeAllocation {
    pub fn new(signer: VerifyingKey, created: DateTime<Utc>) -> Self {
        Self {
            nonce: Uuid::now_v7(),
            signer,
            created,
        }
    }

    /// The node identity this allocation defines.
    pub fn node_id(&self) -> StoreResult<ObjectId> {
        let bytes =
            bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(ContentHasher::NODE.hash(&bytes))
    }
}
