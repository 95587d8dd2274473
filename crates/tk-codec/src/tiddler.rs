use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tk_types::ObjectId;

use crate::value::FieldValue;

/// Title prefix marking wiki-internal ("system") tiddlers.
pub const SYSTEM_PREFIX: &str = "$:/";

/// Identity and storage location of a tiddler.
///
/// Unresolved refs carry a title plus a bag or recipe. A resolved ref also
/// carries the node handle, both blob handles and the revision.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TiddlerRef {
    pub node: Option<ObjectId>,
    pub text_ref: Option<ObjectId>,
    pub meta_ref: Option<ObjectId>,
    pub title: String,
    pub bag: String,
    pub recipe: String,
    pub tags: Vec<String>,
    pub revision: Option<DateTime<Utc>>,
}

impl TiddlerRef {
    /// Ref to `title` within `bag`.
    pub fn in_bag(title: impl Into<String>, bag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bag: bag.into(),
            ..Self::default()
        }
    }

    /// Ref to `title` as seen through `recipe`.
    pub fn in_recipe(title: impl Into<String>, recipe: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            recipe: recipe.into(),
            ..Self::default()
        }
    }

    /// Ref to a known node.
    pub fn by_node(node: ObjectId) -> Self {
        Self {
            node: Some(node),
            ..Self::default()
        }
    }

    /// All three handles and the revision are known.
    pub fn is_resolved(&self) -> bool {
        self.node.is_some()
            && self.text_ref.is_some()
            && self.meta_ref.is_some()
            && self.revision.is_some()
    }

    pub fn is_system(&self) -> bool {
        self.title.starts_with(SYSTEM_PREFIX)
    }
}

impl fmt::Display for TiddlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = &self.node {
            return write!(f, "{node}");
        }
        if !self.bag.is_empty() {
            write!(f, "bags/{}/{:?}", self.bag, self.title)
        } else {
            write!(f, "recipes/{}/{:?}", self.recipe, self.title)
        }
    }
}

/// A wiki document: identity, bookkeeping, custom fields and body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tiddler {
    pub title: String,
    pub bag: String,
    pub recipe: String,
    pub tags: Vec<String>,
    pub revision: Option<DateTime<Utc>>,

    pub node: Option<ObjectId>,
    pub text_ref: Option<ObjectId>,
    pub meta_ref: Option<ObjectId>,

    /// Custom fields. Never holds a reserved key.
    pub fields: BTreeMap<String, FieldValue>,
    /// MIME-like type; selects the body encoding.
    pub content_type: String,
    pub permissions: String,
    pub created: String,
    pub creator: String,
    pub modified: String,
    pub modifier: String,

    pub text: String,
}

impl Tiddler {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// A tiddler carrying only what `r` knows.
    pub fn from_ref(r: TiddlerRef) -> Self {
        Self {
            title: r.title,
            bag: r.bag,
            recipe: r.recipe,
            tags: r.tags,
            revision: r.revision,
            node: r.node,
            text_ref: r.text_ref,
            meta_ref: r.meta_ref,
            ..Self::default()
        }
    }

    pub fn to_ref(&self) -> TiddlerRef {
        TiddlerRef {
            node: self.node,
            text_ref: self.text_ref,
            meta_ref: self.meta_ref,
            title: self.title.clone(),
            bag: self.bag.clone(),
            recipe: self.recipe.clone(),
            tags: self.tags.clone(),
            revision: self.revision,
        }
    }

    pub fn is_system(&self) -> bool {
        self.title.starts_with(SYSTEM_PREFIX)
    }
}

impl Serialize for Tiddler {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tiddler {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj: Map<String, Value> = match value {
            Value::Object(obj) => obj,
            _ => return Err(serde::de::Error::custom("tiddler must be a JSON object")),
        };
        Tiddler::from_json_object(&obj).map_err(serde::de::Error::custom)
    }
}
