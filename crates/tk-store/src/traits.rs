use async_trait::async_trait;
use bytes::Bytes;
use tk_types::ObjectId;

use crate::claim::Claim;
use crate::error::StoreResult;
use crate::query::{DescribedNode, SearchQuery, SearchResult};

/// Content-addressed blob store with mutable attribute nodes.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable. Uploading the same bytes twice returns the same
///   handle.
/// - A node's identity never changes. Its attributes are the replay of the
///   claims appended against it, in append order.
/// - Claims are never rewritten. A delete claim hides the node from queries
///   and descriptions but keeps its history.
/// - A query issued after a claim commits observes that claim.
/// - All backend errors are propagated, never silently ignored.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `data` and return its content handle.
    async fn upload_content(&self, data: Bytes) -> StoreResult<ObjectId>;

    /// Fetch the bytes behind a content handle.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) for
    /// unknown handles.
    async fn fetch_content(&self, id: &ObjectId) -> StoreResult<Bytes>;

    /// Allocate a fresh node with no attributes.
    async fn allocate_node(&self) -> StoreResult<ObjectId>;

    /// Sign, date and append a claim. Returns the claim's handle.
    async fn append_claim(&self, claim: Claim) -> StoreResult<ObjectId>;

    /// Find live nodes matching the query, in allocation order.
    async fn query(&self, query: &SearchQuery) -> StoreResult<SearchResult>;

    /// Describe a single node.
    ///
    /// Returns `Ok(None)` for unknown or deleted nodes. An empty `attrs`
    /// slice describes every attribute.
    async fn describe(&self, node: &ObjectId, attrs: &[&str])
        -> StoreResult<Option<DescribedNode>>;
}
