use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tk_codec::{decode_object, TextEncoding, Tiddler, TiddlerRef, NODE_REF_KEY};
use tk_store::{Claim, ContentStore, SearchQuery, SearchResult};
use tk_types::{attr, ObjectId};
use tracing::debug;

use crate::config::{KeepConfig, Recipe};
use crate::constraints;
use crate::error::{KeepError, KeepResult};
use crate::index::IndexAssembler;
use crate::resolver::{ref_from_described, RefResolver};
use crate::tags::{reconcile, TagMutation};

/// Decides, per tiddler, whether a read also fetches the body.
pub type TextFilter<'a> = &'a (dyn Fn(&Tiddler) -> bool + Send + Sync);

/// Fat reads.
pub fn always_text(_: &Tiddler) -> bool {
    true
}

/// Skinny reads.
pub fn never_text(_: &Tiddler) -> bool {
    false
}

/// Keys of the JSON object form that never go into the metadata blob.
const NON_META_KEYS: &[&str] = &["bag", "recipe", "revision", "tags", "text", NODE_REF_KEY];

/// What a put changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutReport {
    pub node: ObjectId,
    pub text_ref: ObjectId,
    pub meta_ref: ObjectId,
    pub content_changed: bool,
    pub meta_changed: bool,
    pub tag_mutations: Vec<TagMutation>,
}

impl PutReport {
    /// Nothing was claimed against the node.
    pub fn is_noop(&self) -> bool {
        !self.content_changed && !self.meta_changed && self.tag_mutations.is_empty()
    }
}

/// Tiddler operations over a content store.
///
/// Writes upload content first and claim second, and only claim a handle
/// that differs from the node's current one. A put that fails midway leaves
/// unreferenced blobs behind and the node in its previous state.
pub struct TiddlerStore {
    store: Arc<dyn ContentStore>,
    config: Arc<KeepConfig>,
    resolver: RefResolver,
    pub(crate) index: IndexAssembler,
}

impl TiddlerStore {
    pub fn new(store: Arc<dyn ContentStore>, config: KeepConfig) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: RefResolver::new(store.clone(), config.clone()),
            index: IndexAssembler::new(config.index_node),
            store,
            config,
        }
    }

    pub fn config(&self) -> &KeepConfig {
        &self.config
    }

    pub fn resolver(&self) -> &RefResolver {
        &self.resolver
    }

    pub(crate) fn content_store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    /// Write `t`, creating its node on first put.
    pub async fn put(&self, t: &Tiddler) -> KeepResult<PutReport> {
        let bag = if t.bag.is_empty() {
            self.config.default_bag.clone()
        } else {
            t.bag.clone()
        };

        let mut meta = t.to_json_object();
        for key in NON_META_KEYS {
            meta.remove(*key);
        }
        let meta = Value::Object(meta).to_string();
        let body = TextEncoding::for_type(&t.content_type).decode_body(&t.text)?;

        let text_ref = self.store.upload_content(Bytes::from(body)).await?;
        let meta_ref = self.store.upload_content(Bytes::from(meta)).await?;

        let target = TiddlerRef {
            node: t.node,
            title: t.title.clone(),
            bag,
            recipe: t.recipe.clone(),
            ..TiddlerRef::default()
        };
        let existing = self.resolver.resolve(&target, true).await?;
        let node = existing
            .node
            .ok_or_else(|| KeepError::NotFound(format!("tiddler {target}")))?;

        let content_changed = existing.text_ref != Some(text_ref);
        if content_changed {
            self.store
                .append_claim(Claim::set_attr(node, attr::CONTENT, text_ref.to_string()))
                .await?;
        }
        let meta_changed = existing.meta_ref != Some(meta_ref);
        if meta_changed {
            self.store
                .append_claim(Claim::set_attr(node, attr::META, meta_ref.to_string()))
                .await?;
        }

        let current: BTreeSet<String> = existing.tags.into_iter().collect();
        let wanted: BTreeSet<String> = t.tags.iter().cloned().collect();
        let tag_mutations = reconcile(&current, &wanted);
        for mutation in &tag_mutations {
            self.store.append_claim(mutation.claim(node)).await?;
        }

        debug!(
            node = %node.short_hex(),
            title = %t.title,
            content_changed,
            meta_changed,
            tags = tag_mutations.len(),
            "tiddler put"
        );
        Ok(PutReport {
            node,
            text_ref,
            meta_ref,
            content_changed,
            meta_changed,
            tag_mutations,
        })
    }

    /// Read the tiddler behind `r`; the body only when `text_filter` says so.
    pub async fn get(&self, r: &TiddlerRef, text_filter: TextFilter<'_>) -> KeepResult<Tiddler> {
        let resolved = self.resolver.resolve(r, false).await?;
        let meta_ref = match resolved.meta_ref {
            Some(meta_ref) if !resolved.title.is_empty() => meta_ref,
            _ => return Err(KeepError::NotFound(format!("tiddler {resolved}"))),
        };

        let mut tiddler = Tiddler::from_ref(resolved);
        let meta = self.store.fetch_content(&meta_ref).await?;
        tiddler.merge_from(&decode_object(&meta)?)?;

        if text_filter(&tiddler) {
            let body = match &tiddler.text_ref {
                Some(text_ref) => self.store.fetch_content(text_ref).await?,
                None => Bytes::new(),
            };
            tiddler.text = TextEncoding::for_type(&tiddler.content_type).encode_body(&body);
        }
        Ok(tiddler)
    }

    /// Tombstone the node behind `r`. Returns the node.
    pub async fn delete(&self, r: &TiddlerRef) -> KeepResult<ObjectId> {
        let resolved = self.resolver.resolve(r, false).await?;
        let node = resolved
            .node
            .ok_or_else(|| KeepError::NotFound(format!("tiddler {r}")))?;
        self.store.append_claim(Claim::delete(node)).await?;
        debug!(node = %node.short_hex(), title = %resolved.title, "tiddler deleted");
        Ok(node)
    }

    /// Every tiddler in `bag`.
    pub async fn list_bag(&self, bag: &str, text_filter: TextFilter<'_>) -> KeepResult<Vec<Tiddler>> {
        let result = self.search(constraints::in_bag(bag)).await?;
        self.read_all(&result, text_filter).await
    }

    /// Every tiddler visible through `recipe` (`all` or `system`).
    pub async fn list_recipe(
        &self,
        recipe: &str,
        text_filter: TextFilter<'_>,
    ) -> KeepResult<Vec<Tiddler>> {
        let recipe: Recipe = recipe.parse()?;
        let result = self.search(constraints::in_recipe(recipe)).await?;
        self.read_all(&result, text_filter).await
    }

    async fn search(&self, constraint: tk_store::Constraint) -> KeepResult<SearchResult> {
        let query = SearchQuery::new(constraints::with_meta(constraint))
            .describing(attr::TIDDLER_NODE_ATTRS);
        Ok(self.store.query(&query).await?)
    }

    async fn read_all(
        &self,
        result: &SearchResult,
        text_filter: TextFilter<'_>,
    ) -> KeepResult<Vec<Tiddler>> {
        let mut tiddlers = Vec::with_capacity(result.len());
        for node in &result.nodes {
            let r = match result.described.get(node) {
                Some(d) => ref_from_described(d),
                None => TiddlerRef::by_node(*node),
            };
            tiddlers.push(self.get(&r, text_filter).await?);
        }
        Ok(tiddlers)
    }
}

impl std::fmt::Debug for TiddlerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiddlerStore")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Visibility;
    use chrono::{TimeZone, Utc};
    use tk_codec::{decode_json, FieldValue};
    use tk_store::{InMemoryContentStore, StepClock};

    fn keep() -> (Arc<InMemoryContentStore>, TiddlerStore) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = Arc::new(InMemoryContentStore::with_clock(Arc::new(StepClock::new(start))));
        let keep = TiddlerStore::new(store.clone(), KeepConfig::default());
        (store, keep)
    }

    fn tiddler(title: &str, text: &str, tags: &[&str]) -> Tiddler {
        Tiddler {
            title: title.into(),
            text: text.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content_type: "text/plain".into(),
            ..Tiddler::default()
        }
    }

    #[tokio::test]
    async fn put_then_get_by_default_bag() {
        let (_, keep) = keep();
        let mut t = decode_json(br#"{"title":"Foo","text":"hello","type":"text/plain"}"#).unwrap();
        t.recipe = "x".into();
        keep.put(&t).await.unwrap();

        let got = keep
            .get(&TiddlerRef::in_bag("Foo", "default"), &always_text)
            .await
            .unwrap();
        assert_eq!(got.text, "hello");
        assert!(got.tags.is_empty());
        assert!(got.revision.is_some());
        assert_eq!(got.bag, "default");
        assert_eq!(got.content_type, "text/plain");
    }

    #[tokio::test]
    async fn identical_put_claims_nothing() {
        let (store, keep) = keep();
        let t = tiddler("Foo", "hello", &["a", "b"]);
        let first = keep.put(&t).await.unwrap();
        assert!(first.content_changed && first.meta_changed);
        let claims = store.claim_count();
        let blobs = store.blob_count();

        let second = keep.put(&t).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(second.node, first.node);
        assert_eq!(second.text_ref, first.text_ref);
        assert_eq!(second.meta_ref, first.meta_ref);
        assert_eq!(store.claim_count(), claims);
        assert_eq!(store.blob_count(), blobs);
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn changed_body_only_claims_content() {
        let (_, keep) = keep();
        keep.put(&tiddler("Foo", "one", &[])).await.unwrap();
        let report = keep.put(&tiddler("Foo", "two", &[])).await.unwrap();
        assert!(report.content_changed);
        assert!(!report.meta_changed);
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &always_text).await.unwrap();
        assert_eq!(got.text, "two");
    }

    #[tokio::test]
    async fn tags_follow_last_put() {
        let (_, keep) = keep();
        keep.put(&tiddler("Foo", "x", &["a", "b"])).await.unwrap();
        keep.put(&tiddler("Foo", "x", &["b", "c"])).await.unwrap();
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &never_text).await.unwrap();
        let tags: BTreeSet<_> = got.tags.into_iter().collect();
        assert_eq!(tags, ["b", "c"].iter().map(|s| s.to_string()).collect());

        keep.put(&tiddler("Foo", "x", &[])).await.unwrap();
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &never_text).await.unwrap();
        assert!(got.tags.is_empty());
    }

    #[tokio::test]
    async fn skinny_read_skips_body() {
        let (_, keep) = keep();
        keep.put(&tiddler("Foo", "hello", &[])).await.unwrap();
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &never_text).await.unwrap();
        assert_eq!(got.text, "");
        assert!(got.text_ref.is_some());

        let only_plain = |t: &Tiddler| t.content_type == "text/plain";
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &only_plain).await.unwrap();
        assert_eq!(got.text, "hello");
    }

    #[tokio::test]
    async fn binary_bodies_are_stored_decoded() {
        let (store, keep) = keep();
        let mut t = tiddler("logo.png", "AAEC/w==", &[]);
        t.content_type = "image/png".into();
        let report = keep.put(&t).await.unwrap();
        assert_eq!(
            store.fetch_content(&report.text_ref).await.unwrap(),
            Bytes::from_static(&[0, 1, 2, 255])
        );
        let got = keep.get(&TiddlerRef::in_bag("logo.png", "default"), &always_text).await.unwrap();
        assert_eq!(got.text, "AAEC/w==");
    }

    #[tokio::test]
    async fn invalid_base64_is_malformed() {
        let (_, keep) = keep();
        let mut t = tiddler("logo.png", "%%%", &[]);
        t.content_type = "image/png".into();
        assert!(matches!(keep.put(&t).await, Err(KeepError::MalformedInput(_))));
    }

    #[tokio::test]
    async fn metadata_blob_excludes_location_and_body() {
        let (store, keep) = keep();
        let mut t = tiddler("Foo", "body", &["a"]);
        t.fields.insert("color".into(), FieldValue::from("red"));
        t.revision = Some(Utc::now());
        t.recipe = "all".into();
        t.node = None;
        let report = keep.put(&t).await.unwrap();
        let meta = store.fetch_content(&report.meta_ref).await.unwrap();
        let meta: serde_json::Value = serde_json::from_slice(&meta).unwrap();
        assert_eq!(
            meta,
            serde_json::json!({"title": "Foo", "type": "text/plain", "color": "red"})
        );
    }

    #[tokio::test]
    async fn fields_round_trip_through_store() {
        let (_, keep) = keep();
        let mut t = tiddler("Foo", "body", &[]);
        t.fields.insert("count".into(), FieldValue::from(3i64));
        t.modifier = "alice".into();
        keep.put(&t).await.unwrap();
        let got = keep.get(&TiddlerRef::in_bag("Foo", "default"), &always_text).await.unwrap();
        assert_eq!(got.fields["count"], FieldValue::from(3i64));
        assert_eq!(got.modifier, "alice");
    }

    #[tokio::test]
    async fn delete_hides_tiddler() {
        let (store, keep) = keep();
        keep.put(&tiddler("Foo", "x", &[])).await.unwrap();
        let r = TiddlerRef::in_bag("Foo", "default");
        keep.delete(&r).await.unwrap();
        assert!(matches!(keep.get(&r, &never_text).await, Err(KeepError::NotFound(_))));
        assert!(matches!(keep.delete(&r).await, Err(KeepError::NotFound(_))));
        assert!(keep.list_recipe("all", &never_text).await.unwrap().is_empty());
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn put_after_delete_creates_fresh_node() {
        let (store, keep) = keep();
        let first = keep.put(&tiddler("Foo", "x", &[])).await.unwrap();
        keep.delete(&TiddlerRef::in_bag("Foo", "default")).await.unwrap();
        let second = keep.put(&tiddler("Foo", "x", &[])).await.unwrap();
        assert_ne!(first.node, second.node);
        assert_eq!(store.node_count(), 2);
    }

    #[tokio::test]
    async fn listing_by_bag_and_recipe() {
        let (_, keep) = keep();
        let mut a = tiddler("A", "a", &[]);
        a.bag = "one".into();
        let mut b = tiddler("$:/B", "b", &[]);
        b.bag = "two".into();
        keep.put(&a).await.unwrap();
        keep.put(&b).await.unwrap();

        let one = keep.list_bag("one", &never_text).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].title, "A");
        assert_eq!(one[0].text, "");

        let all = keep.list_recipe("all", &always_text).await.unwrap();
        let titles: Vec<_> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "$:/B"]);
        assert_eq!(all[1].text, "b");

        let system = keep.list_recipe("system", &never_text).await.unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].title, "$:/B");
    }

    #[tokio::test]
    async fn bogus_recipe_is_unsupported() {
        let (_, keep) = keep();
        assert!(matches!(
            keep.list_recipe("bogus", &never_text).await,
            Err(KeepError::UnsupportedRecipe(_))
        ));
    }

    #[tokio::test]
    async fn node_without_metadata_is_not_listed() {
        let (_, keep) = keep();
        keep.resolver()
            .resolve(&TiddlerRef::in_bag("Half", "default"), true)
            .await
            .unwrap();
        assert!(keep.list_bag("default", &never_text).await.unwrap().is_empty());
        assert!(matches!(
            keep.get(&TiddlerRef::in_bag("Half", "default"), &never_text).await,
            Err(KeepError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_by_node_ref() {
        let (_, keep) = keep();
        let report = keep.put(&tiddler("Foo", "x", &["t"])).await.unwrap();
        let got = keep.get(&TiddlerRef::by_node(report.node), &always_text).await.unwrap();
        assert_eq!(got.title, "Foo");
        assert_eq!(got.node, Some(report.node));
        assert_eq!(got.tags, vec!["t"]);
    }

    #[tokio::test]
    async fn hidden_config_is_applied_on_put() {
        let store = Arc::new(InMemoryContentStore::new());
        let keep = TiddlerStore::new(
            store.clone(),
            KeepConfig {
                hide_nodes: Visibility::None,
                ..KeepConfig::default()
            },
        );
        let report = keep.put(&tiddler("$:/x", "", &[])).await.unwrap();
        let d = store.describe(&report.node, &[]).await.unwrap().unwrap();
        assert!(d.first(attr::DEFAULT_VISIBILITY).is_none());
    }
}
