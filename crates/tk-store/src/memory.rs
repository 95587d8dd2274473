use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tk_crypto::{ContentHasher, SigningKey};
use tk_types::ObjectId;
use tracing::{debug, info};

use crate::claim::{Claim, ClaimBody, ClaimOp, NodeAllocation, SignedClaim};
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, JournalRecord};
use crate::query::{DescribedNode, SearchQuery, SearchResult};
use crate::traits::ContentStore;

struct NodeRecord {
    claims: Vec<ObjectId>,
    attrs: BTreeMap<String, Vec<String>>,
    mod_time: DateTime<Utc>,
    deleted: bool,
}

impl NodeRecord {
    fn new(created: DateTime<Utc>) -> Self {
        Self {
            claims: Vec::new(),
            attrs: BTreeMap::new(),
            mod_time: created,
            deleted: false,
        }
    }

    fn apply(&mut self, id: ObjectId, signed: &SignedClaim) {
        match &signed.claim.body {
            ClaimBody::Attribute { attr, op, value } => match op {
                ClaimOp::Set => {
                    self.attrs.insert(attr.clone(), vec![value.clone()]);
                }
                ClaimOp::Add => {
                    let values = self.attrs.entry(attr.clone()).or_default();
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                ClaimOp::Delete => {
                    if value.is_empty() {
                        self.attrs.remove(attr);
                    } else if let Some(values) = self.attrs.get_mut(attr) {
                        values.retain(|v| v != value);
                        if values.is_empty() {
                            self.attrs.remove(attr);
                        }
                    }
                }
            },
            ClaimBody::Delete => self.deleted = true,
        }
        self.claims.push(id);
        self.mod_time = self.mod_time.max(signed.date);
    }

    fn describe(&self, node: ObjectId, attrs: &[&str]) -> DescribedNode {
        let attrs = if attrs.is_empty() {
            self.attrs.clone()
        } else {
            self.attrs
                .iter()
                .filter(|(k, _)| attrs.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        DescribedNode {
            node,
            attrs,
            mod_time: self.mod_time,
        }
    }
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<ObjectId, Bytes>,
    nodes: HashMap<ObjectId, NodeRecord>,
    /// Node handles in allocation order.
    order: Vec<ObjectId>,
    claim_count: usize,
}

impl Inner {
    fn insert_node(&mut self, id: ObjectId, created: DateTime<Utc>) {
        if !self.nodes.contains_key(&id) {
            self.nodes.insert(id, NodeRecord::new(created));
            self.order.push(id);
        }
    }

    fn apply_claim(&mut self, id: ObjectId, signed: &SignedClaim) -> StoreResult<()> {
        let record = self
            .nodes
            .get_mut(&signed.claim.node)
            .ok_or(StoreError::NotFound(signed.claim.node))?;
        record.apply(id, signed);
        self.claim_count += 1;
        Ok(())
    }
}

/// In-memory content store.
///
/// Intended for tests, embedding and single-process use. Blobs and nodes are
/// held behind a `RwLock`; claims are signed with a store-owned key and dated
/// by an injectable [`Clock`]. When opened over a [`Journal`] every mutation
/// is written to the journal before it becomes visible, and the journal is
/// replayed on open.
pub struct InMemoryContentStore {
    inner: RwLock<Inner>,
    key: SigningKey,
    clock: Arc<dyn Clock>,
    journal: Option<Journal>,
}

impl InMemoryContentStore {
    /// Create an empty store with a fresh signing key and the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store dated by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            key: SigningKey::generate(),
            clock,
            journal: None,
        }
    }

    /// Open a store persisted in the journal at `path`, replaying its records.
    pub fn open_journal(path: &Path) -> StoreResult<Self> {
        Self::open_journal_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_journal_with_clock(path: &Path, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let journal = Journal::open(path)?;
        let mut inner = Inner::default();
        for record in journal.replay()? {
            match record {
                JournalRecord::Blob(data) => {
                    let id = ContentHasher::CONTENT.hash(&data);
                    inner.blobs.insert(id, Bytes::from(data));
                }
                JournalRecord::Node(alloc) => {
                    let id = alloc.node_id()?;
                    inner.insert_node(id, alloc.created);
                }
                JournalRecord::Claim(signed) => {
                    signed.verify()?;
                    let id = signed.id()?;
                    inner.apply_claim(id, &signed)?;
                }
            }
        }
        info!(
            path = %path.display(),
            blobs = inner.blobs.len(),
            nodes = inner.nodes.len(),
            claims = inner.claim_count,
            "content store opened"
        );
        Ok(Self {
            inner: RwLock::new(inner),
            key: SigningKey::generate(),
            clock,
            journal: Some(journal),
        })
    }

    /// Number of distinct blobs stored.
    pub fn blob_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").blobs.len()
    }

    /// Number of claims appended, across all nodes.
    pub fn claim_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").claim_count
    }

    /// Number of nodes ever allocated, including deleted ones.
    pub fn node_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").nodes.len()
    }

    /// Claim handles recorded against `node`, oldest first.
    pub fn claims_for(&self, node: &ObjectId) -> Vec<ObjectId> {
        self.inner
            .read()
            .expect("lock poisoned")
            .nodes
            .get(node)
            .map(|r| r.claims.clone())
            .unwrap_or_default()
    }

    fn journal(&self, record: &JournalRecord) -> StoreResult<()> {
        if let Some(journal) = &self.journal {
            journal.append(record)?;
        }
        Ok(())
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn upload_content(&self, data: Bytes) -> StoreResult<ObjectId> {
        let id = ContentHasher::CONTENT.hash(&data);
        let mut inner = self.inner.write().expect("lock poisoned");
        if !inner.blobs.contains_key(&id) {
            self.journal(&JournalRecord::Blob(data.to_vec()))?;
            debug!(blob = %id.short_hex(), len = data.len(), "blob stored");
            inner.blobs.insert(id, data);
        }
        Ok(id)
    }

    async fn fetch_content(&self, id: &ObjectId) -> StoreResult<Bytes> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.blobs.get(id).cloned().ok_or(StoreError::NotFound(*id))
    }

    async fn allocate_node(&self) -> StoreResult<ObjectId> {
        let alloc = NodeAllocation::new(self.key.verifying_key(), self.clock.now());
        let id = alloc.node_id()?;
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut inner = self.inner.write().expect("lock poisoned");
        self.journal(&JournalRecord::Node(alloc.clone()))?;
        inner.insert_node(id, alloc.created);
        debug!(node = %id.short_hex(), "node allocated");
        Ok(id)
    }

    async fn append_claim(&self, claim: Claim) -> StoreResult<ObjectId> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let last = inner
            .nodes
            .get(&claim.node)
            .map(|r| r.mod_time)
            .ok_or(StoreError::NotFound(claim.node))?;
        // Every claim lands on a later whole second than the node's last one.
        let now = self.clock.now();
        let date = if now.timestamp() > last.timestamp() {
            now
        } else {
            last + Duration::seconds(1)
        };
        let signed = SignedClaim::sign(claim, date, &self.key)?;
        let id = signed.id()?;
        self.journal(&JournalRecord::Claim(signed.clone()))?;
        debug!(claim = %signed.claim, "claim appended");
        inner.apply_claim(id, &signed)?;
        Ok(id)
    }

    async fn query(&self, query: &SearchQuery) -> StoreResult<SearchResult> {
        let inner = self.inner.read().expect("lock poisoned");
        let describe: Option<Vec<&str>> = query
            .describe
            .as_ref()
            .map(|attrs| attrs.iter().map(String::as_str).collect());

        let mut result = SearchResult::default();
        for id in &inner.order {
            let Some(record) = inner.nodes.get(id) else {
                continue;
            };
            if record.deleted || !query.constraint.matches(&record.attrs) {
                continue;
            }
            result.nodes.push(*id);
            if let Some(attrs) = &describe {
                result.described.insert(*id, record.describe(*id, attrs));
            }
        }
        Ok(result)
    }

    async fn describe(
        &self,
        node: &ObjectId,
        attrs: &[&str],
    ) -> StoreResult<Option<DescribedNode>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .nodes
            .get(node)
            .filter(|r| !r.deleted)
            .map(|r| r.describe(*node, attrs)))
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("InMemoryContentStore")
            .field("blobs", &inner.blobs.len())
            .field("nodes", &inner.nodes.len())
            .field("claims", &inner.claim_count)
            .field("journal", &self.journal.as_ref().map(Journal::path))
            .finish()
    }
}
