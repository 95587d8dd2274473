use tk_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a content blob and a claim with identical bytes never
/// share a handle.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for content blobs (tiddler bodies, metadata, index documents).
    pub const CONTENT: Self = Self {
        domain: "tk-content-v1",
    };
    /// Hasher for node allocation records.
    pub const NODE: Self = Self {
        domain: "tk-node-v1",
    };
    /// Hasher for signed claims.
    pub const CLAIM: Self = Self {
        domain: "tk-claim-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::CONTENT.hash(data), ContentHasher::CONTENT.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let content = ContentHasher::CONTENT.hash(data);
        let node = ContentHasher::NODE.hash(data);
        let claim = ContentHasher::CLAIM.hash(data);
        assert_ne!(content, node);
        assert_ne!(content, claim);
        assert_ne!(node, claim);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::CONTENT.hash(b"original");
        assert!(ContentHasher::CONTENT.verify(b"original", &id));
        assert!(!ContentHasher::CONTENT.verify(b"tampered", &id));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("my-custom-domain-v1");
        assert_eq!(hasher.domain(), "my-custom-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::CONTENT.hash(b"data"));
    }

    #[test]
    fn domain_hash_differs_from_plain_hash() {
        assert_ne!(ContentHasher::CONTENT.hash(b"test"), ObjectId::from_bytes(b"test"));
    }
}
