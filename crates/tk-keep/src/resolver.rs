use std::sync::Arc;

use tk_codec::TiddlerRef;
use tk_store::{Claim, ContentStore, DescribedNode, SearchQuery};
use tk_types::{attr, ObjectId};
use tracing::debug;

use crate::config::{KeepConfig, Recipe};
use crate::constraints;
use crate::error::{KeepError, KeepResult};

/// Rebuild a ref from a node description.
pub fn ref_from_described(d: &DescribedNode) -> TiddlerRef {
    TiddlerRef {
        node: Some(d.node),
        text_ref: d.first(attr::CONTENT).and_then(ObjectId::parse_opt),
        meta_ref: d.first(attr::META).and_then(ObjectId::parse_opt),
        title: d.first(attr::TITLE).unwrap_or_default().to_string(),
        bag: d.first(attr::BAG).unwrap_or_default().to_string(),
        recipe: String::new(),
        tags: d.values(attr::TAG).to_vec(),
        revision: Some(d.mod_time),
    }
}

/// Maps a [`TiddlerRef`] onto its storage node.
///
/// There is at most one node per (bag, title). Resolution looks the pair up
/// before creating anything, so repeated resolution converges on one node
/// as long as the store shows its own committed claims.
#[derive(Clone)]
pub struct RefResolver {
    store: Arc<dyn ContentStore>,
    config: Arc<KeepConfig>,
}

impl RefResolver {
    pub fn new(store: Arc<dyn ContentStore>, config: Arc<KeepConfig>) -> Self {
        Self { store, config }
    }

    /// Resolve `r`, creating its node when absent and `create_missing` is set.
    ///
    /// A ref that already carries a node is described directly and never
    /// creates anything. A freshly created node has a title and bag but no
    /// blob handles or revision.
    pub async fn resolve(&self, r: &TiddlerRef, create_missing: bool) -> KeepResult<TiddlerRef> {
        if r.is_resolved() {
            return Ok(r.clone());
        }

        if let Some(node) = r.node {
            return match self.store.describe(&node, attr::TIDDLER_NODE_ATTRS).await? {
                Some(d) => Ok(ref_from_described(&d)),
                None => Err(KeepError::NotFound(format!("node {node}"))),
            };
        }

        if r.title.is_empty() {
            return Err(KeepError::InvalidReference("missing tiddler title".into()));
        }
        let bag_constraint = if !r.bag.is_empty() {
            constraints::in_bag(&r.bag)
        } else if !r.recipe.is_empty() {
            // Either recipe resolves a title across every bag.
            r.recipe.parse::<Recipe>()?;
            constraints::any_bag()
        } else {
            return Err(KeepError::InvalidReference(format!(
                "no bag or recipe for {:?}",
                r.title
            )));
        };

        let mut constraint = constraints::titled(&r.title).and(bag_constraint);
        if !create_missing {
            constraint = constraints::with_meta(constraint);
        }
        let query = SearchQuery::new(constraint).describing(attr::TIDDLER_NODE_ATTRS);
        let result = self.store.query(&query).await?;
        if let Some(d) = result.described_nodes().next() {
            return Ok(ref_from_described(d));
        }
        if !create_missing {
            return Err(KeepError::NotFound(format!("tiddler {r}")));
        }

        self.create(r).await
    }

    async fn create(&self, r: &TiddlerRef) -> KeepResult<TiddlerRef> {
        let bag = if r.bag.is_empty() {
            self.config.default_bag.clone()
        } else {
            r.bag.clone()
        };

        let node = self.store.allocate_node().await?;
        self.store
            .append_claim(Claim::set_attr(node, attr::TITLE, r.title.clone()))
            .await?;
        self.store
            .append_claim(Claim::set_attr(node, attr::BAG, bag.clone()))
            .await?;
        if self.config.hide_nodes.covers(&r.title) {
            self.store
                .append_claim(Claim::set_attr(node, attr::DEFAULT_VISIBILITY, attr::HIDE))
                .await?;
        }
        debug!(node = %node.short_hex(), title = %r.title, bag = %bag, "tiddler node created");

        Ok(TiddlerRef {
            node: Some(node),
            title: r.title.clone(),
            bag,
            ..TiddlerRef::default()
        })
    }
}

impl std::fmt::Debug for RefResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefResolver").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Visibility;
    use tk_store::InMemoryContentStore;

    fn resolver_with(config: KeepConfig) -> (Arc<InMemoryContentStore>, RefResolver) {
        let store = Arc::new(InMemoryContentStore::new());
        let resolver = RefResolver::new(store.clone(), Arc::new(config));
        (store, resolver)
    }

    fn resolver() -> (Arc<InMemoryContentStore>, RefResolver) {
        resolver_with(KeepConfig::default())
    }

    async fn give_meta(store: &InMemoryContentStore, node: ObjectId) {
        let meta = store.upload_content("{}".into()).await.unwrap();
        store
            .append_claim(Claim::set_attr(node, attr::META, meta.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_title_is_invalid() {
        let (_, resolver) = resolver();
        let err = resolver.resolve(&TiddlerRef::in_bag("", "default"), true).await.unwrap_err();
        assert!(matches!(err, KeepError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn missing_bag_and_recipe_is_invalid() {
        let (_, resolver) = resolver();
        let err = resolver.resolve(&TiddlerRef::in_bag("Foo", ""), true).await.unwrap_err();
        assert!(matches!(err, KeepError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn unknown_recipe_is_rejected() {
        let (_, resolver) = resolver();
        let err = resolver
            .resolve(&TiddlerRef::in_recipe("Foo", "bogus"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, KeepError::UnsupportedRecipe(_)));
    }

    #[tokio::test]
    async fn absent_without_create_is_not_found() {
        let (store, resolver) = resolver();
        let err = resolver
            .resolve(&TiddlerRef::in_bag("Foo", "default"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, KeepError::NotFound(_)));
        assert_eq!(store.node_count(), 0);
    }

    #[tokio::test]
    async fn create_stamps_title_and_default_bag() {
        let (store, resolver) = resolver();
        let created = resolver
            .resolve(&TiddlerRef::in_recipe("Foo", "all"), true)
            .await
            .unwrap();
        let node = created.node.unwrap();
        assert_eq!(created.title, "Foo");
        assert_eq!(created.bag, "default");
        assert!(created.text_ref.is_none());
        assert!(created.meta_ref.is_none());
        assert!(created.revision.is_none());

        let d = store.describe(&node, &[]).await.unwrap().unwrap();
        assert_eq!(d.first(attr::TITLE), Some("Foo"));
        assert_eq!(d.first(attr::BAG), Some("default"));
        assert!(d.first(attr::DEFAULT_VISIBILITY).is_none());
    }

    #[tokio::test]
    async fn repeated_creation_converges() {
        let (store, resolver) = resolver();
        let r = TiddlerRef::in_bag("Foo", "notes");
        let first = resolver.resolve(&r, true).await.unwrap();
        let second = resolver.resolve(&r, true).await.unwrap();
        assert_eq!(first.node, second.node);
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn lookup_without_create_requires_meta() {
        let (store, resolver) = resolver();
        let r = TiddlerRef::in_bag("Foo", "default");
        let node = resolver.resolve(&r, true).await.unwrap().node.unwrap();
        assert!(resolver.resolve(&r, false).await.is_err());

        give_meta(&store, node).await;
        let a = resolver.resolve(&r, false).await.unwrap();
        let b = resolver.resolve(&r, false).await.unwrap();
        assert_eq!(a.node, Some(node));
        assert_eq!(a.node, b.node);
        assert!(a.meta_ref.is_some());
        assert!(a.revision.is_some());
    }

    #[tokio::test]
    async fn recipe_lookup_spans_bags() {
        let (store, resolver) = resolver();
        let node = resolver
            .resolve(&TiddlerRef::in_bag("Foo", "elsewhere"), true)
            .await
            .unwrap()
            .node
            .unwrap();
        give_meta(&store, node).await;
        let found = resolver
            .resolve(&TiddlerRef::in_recipe("Foo", "all"), false)
            .await
            .unwrap();
        assert_eq!(found.node, Some(node));
        assert_eq!(found.bag, "elsewhere");
    }

    #[tokio::test]
    async fn same_title_in_other_bag_is_distinct() {
        let (store, resolver) = resolver();
        let a = resolver.resolve(&TiddlerRef::in_bag("Foo", "a"), true).await.unwrap();
        let b = resolver.resolve(&TiddlerRef::in_bag("Foo", "b"), true).await.unwrap();
        assert_ne!(a.node, b.node);
        assert_eq!(store.node_count(), 2);
    }

    #[tokio::test]
    async fn system_nodes_are_hidden_by_default() {
        let (store, resolver) = resolver();
        let sys = resolver
            .resolve(&TiddlerRef::in_bag("$:/config", "default"), true)
            .await
            .unwrap()
            .node
            .unwrap();
        let d = store.describe(&sys, &[]).await.unwrap().unwrap();
        assert_eq!(d.first(attr::DEFAULT_VISIBILITY), Some(attr::HIDE));
    }

    #[tokio::test]
    async fn hide_all_marks_every_node() {
        let (store, resolver) = resolver_with(KeepConfig {
            hide_nodes: Visibility::All,
            ..KeepConfig::default()
        });
        let node = resolver
            .resolve(&TiddlerRef::in_bag("Plain", "default"), true)
            .await
            .unwrap()
            .node
            .unwrap();
        let d = store.describe(&node, &[]).await.unwrap().unwrap();
        assert_eq!(d.first(attr::DEFAULT_VISIBILITY), Some(attr::HIDE));
    }

    #[tokio::test]
    async fn node_ref_is_described_directly() {
        let (store, resolver) = resolver();
        let node = resolver
            .resolve(&TiddlerRef::in_bag("Foo", "default"), true)
            .await
            .unwrap()
            .node
            .unwrap();
        let found = resolver.resolve(&TiddlerRef::by_node(node), false).await.unwrap();
        assert_eq!(found.title, "Foo");
        assert_eq!(found.bag, "default");

        store.append_claim(Claim::delete(node)).await.unwrap();
        let err = resolver.resolve(&TiddlerRef::by_node(node), true).await.unwrap_err();
        assert!(matches!(err, KeepError::NotFound(_)));
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn resolved_ref_is_returned_unchanged() {
        let (store, resolver) = resolver();
        let r = TiddlerRef {
            node: Some(ObjectId::from_bytes(b"n")),
            text_ref: Some(ObjectId::from_bytes(b"t")),
            meta_ref: Some(ObjectId::from_bytes(b"m")),
            title: "Foo".into(),
            revision: Some(chrono::Utc::now()),
            ..TiddlerRef::default()
        };
        assert_eq!(resolver.resolve(&r, false).await.unwrap(), r);
        assert_eq!(store.node_count(), 0);
    }
}
