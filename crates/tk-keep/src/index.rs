use std::sync::OnceLock;
use std::time::Instant;

use bytes::Bytes;
use tk_store::{Claim, ContentStore, SearchQuery};
use tk_types::{attr, ObjectId};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::constraints;
use crate::error::{KeepError, KeepResult};
use crate::store::{always_text, TiddlerStore};

/// Title of the node holding the wiki's bootstrap HTML.
pub const INDEX_TITLE: &str = "tiddlywiki.html";

/// Marker in the bootstrap HTML before which preloaded tiddlers are injected.
pub const BOOT_MARKER: &str = "<!--~~ Boot kernel ~~-->";

const PRELOAD_COMMENT: &str = "\n<!--~~ Preloaded Tiddlers ~~-->\n";
const PRELOAD_OPEN: &str = "<script type='text/javascript'>\n$tw.preloadTiddlerArray(\n";
const PRELOAD_CLOSE: &str = ");\n</script>\n\n";

/// Locates the bootstrap document and splices preloaded tiddlers into it.
///
/// The document's node is looked up by title once and remembered for the
/// life of the assembler. Concurrent first lookups may both query; they
/// find the same node.
#[derive(Debug, Default)]
pub struct IndexAssembler {
    node: OnceLock<ObjectId>,
}

impl IndexAssembler {
    /// An assembler, optionally pre-seeded with the document's node.
    pub fn new(node: Option<ObjectId>) -> Self {
        let cell = OnceLock::new();
        if let Some(node) = node {
            let _ = cell.set(node);
        }
        Self { node: cell }
    }

    pub fn cached_node(&self) -> Option<ObjectId> {
        self.node.get().copied()
    }

    /// Find the bootstrap document's node.
    pub async fn locate(&self, store: &dyn ContentStore) -> KeepResult<ObjectId> {
        if let Some(node) = self.node.get() {
            return Ok(*node);
        }
        let query = SearchQuery::new(constraints::index_document(INDEX_TITLE));
        let result = store.query(&query).await?;
        let node = result
            .nodes
            .first()
            .copied()
            .ok_or_else(|| KeepError::NotFound(format!("index document {INDEX_TITLE}")))?;
        let _ = self.node.set(node);
        info!(node = %node, "located {INDEX_TITLE}");
        Ok(node)
    }

    /// The bootstrap document's bytes.
    pub async fn document(&self, store: &dyn ContentStore) -> KeepResult<Bytes> {
        let node = self.locate(store).await?;
        let content = store
            .describe(&node, &[attr::CONTENT])
            .await?
            .and_then(|d| d.first(attr::CONTENT).and_then(ObjectId::parse_opt))
            .ok_or_else(|| {
                KeepError::Assembly(format!("index node {node} has no content handle"))
            })?;
        Ok(store.fetch_content(&content).await?)
    }
}

/// Split `document` just before the boot marker.
pub fn split_at_marker(document: &[u8]) -> KeepResult<(&[u8], &[u8])> {
    let marker = BOOT_MARKER.as_bytes();
    document
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|at| document.split_at(at))
        .ok_or_else(|| KeepError::Assembly("could not find boot kernel marker".into()))
}

/// The script block preloading `tiddlers_json` (a JSON array).
pub fn preload_block(tiddlers_json: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(
        PRELOAD_COMMENT.len() + PRELOAD_OPEN.len() + tiddlers_json.len() + 1 + PRELOAD_CLOSE.len(),
    );
    block.extend_from_slice(PRELOAD_COMMENT.as_bytes());
    block.extend_from_slice(PRELOAD_OPEN.as_bytes());
    block.extend_from_slice(tiddlers_json);
    block.push(b'\n');
    block.extend_from_slice(PRELOAD_CLOSE.as_bytes());
    block
}

impl TiddlerStore {
    /// Write the bootstrap document to `w`, with the configured tiddlers
    /// preloaded.
    pub async fn generate_index<W>(&self, w: &mut W) -> KeepResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let document = self.index.document(self.content_store()).await?;

        let Some(recipe) = self.config().embed.recipe() else {
            w.write_all(&document).await?;
            return Ok(w.flush().await?);
        };

        let (prefix, suffix) = split_at_marker(&document)?;
        let started = Instant::now();
        let tiddlers = self.list_recipe(&recipe.to_string(), &always_text).await?;
        let json = serde_json::to_vec(&tiddlers)
            .map_err(|e| KeepError::Assembly(format!("encoding preloaded tiddlers: {e}")))?;

        w.write_all(prefix).await?;
        w.write_all(&preload_block(&json)).await?;
        w.write_all(suffix).await?;
        w.flush().await?;
        info!(
            count = tiddlers.len(),
            elapsed = ?started.elapsed(),
            "wrote preloaded tiddlers"
        );
        Ok(())
    }

    /// Store `document` as the bootstrap HTML unless one is already present.
    ///
    /// Returns the new node, or `None` when an index document already exists.
    pub async fn install_index(&self, document: Bytes, source: &str) -> KeepResult<Option<ObjectId>> {
        match self.index.locate(self.content_store()).await {
            Ok(_) => return Ok(None),
            Err(KeepError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let store = self.content_store();
        let content = store.upload_content(document).await?;
        let node = store.allocate_node().await?;
        store
            .append_claim(Claim::set_attr(node, attr::CONTENT, content.to_string()))
            .await?;
        store
            .append_claim(Claim::set_attr(node, attr::DESCRIPTION, source))
            .await?;
        store
            .append_claim(Claim::set_attr(node, attr::TITLE, INDEX_TITLE))
            .await?;
        let _ = self.index.node.set(node);
        info!(node = %node, source, "installed {INDEX_TITLE}");
        Ok(Some(node))
    }
}
