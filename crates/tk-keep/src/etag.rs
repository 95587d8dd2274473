use tk_codec::TiddlerRef;

use crate::error::KeepResult;
use crate::store::TiddlerStore;

/// HTTP entity tag of a resolved ref:
/// `"{bag}/{query-escaped title}/{revision unix seconds}:{node}"`.
///
/// The revision is the node's latest claim date, and the store puts every
/// claim on a node in a later second than the one before it. So any put that
/// records a claim changes the tag; reads and no-op puts leave it alone.
pub fn entity_tag(r: &TiddlerRef) -> String {
    let title: String = form_urlencoded::byte_serialize(r.title.as_bytes()).collect();
    let revision = r.revision.map(|rev| rev.timestamp()).unwrap_or_default();
    let node = r.node.map(|n| n.to_string()).unwrap_or_default();
    format!("\"{}/{}/{}:{}\"", r.bag, title, revision, node)
}

impl TiddlerStore {
    /// Resolve `r` (without creating) and compute its entity tag.
    pub async fn entity_tag(&self, r: &TiddlerRef) -> KeepResult<(TiddlerRef, String)> {
        let resolved = self.resolver().resolve(r, false).await?;
        let tag = entity_tag(&resolved);
        Ok((resolved, tag))
    }
}
