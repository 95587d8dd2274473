use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tk_types::ObjectId;
use tracing::warn;

use crate::error::{CodecError, CodecResult};
use crate::tiddler::Tiddler;
use crate::value::FieldValue;

/// Key carrying the node handle in both wire forms.
pub const NODE_REF_KEY: &str = "tiddlykeep-ref";

/// Keys with a dedicated [`Tiddler`] slot; never folded into `fields`.
pub const RESERVED_KEYS: &[&str] = &[
    "title",
    "revision",
    "tags",
    "type",
    "bag",
    "recipe",
    "permissions",
    "creator",
    "created",
    "modifier",
    "modified",
    "text",
    "fields",
    NODE_REF_KEY,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

fn insert_non_empty(obj: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        obj.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// String form of any JSON value: strings as-is, anything else as JSON text.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn format_revision(revision: &DateTime<Utc>) -> String {
    revision.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_revision(value: &str) -> CodecResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CodecError::InvalidRevision {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl Tiddler {
    /// The flat JSON object form. Empty values are omitted; keys sort.
    pub fn to_json_object(&self) -> Map<String, Value> {
        let mut obj: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        obj.insert("title".into(), Value::String(self.title.clone()));
        if let Some(revision) = &self.revision {
            obj.insert("revision".into(), Value::String(format_revision(revision)));
        }
        if let Some(node) = &self.node {
            obj.insert(NODE_REF_KEY.into(), Value::String(node.to_string()));
        }
        insert_non_empty(&mut obj, "bag", &self.bag);
        insert_non_empty(&mut obj, "recipe", &self.recipe);
        insert_non_empty(&mut obj, "type", &self.content_type);
        insert_non_empty(&mut obj, "text", &self.text);
        insert_non_empty(&mut obj, "permissions", &self.permissions);
        insert_non_empty(&mut obj, "created", &self.created);
        insert_non_empty(&mut obj, "creator", &self.creator);
        insert_non_empty(&mut obj, "modified", &self.modified);
        insert_non_empty(&mut obj, "modifier", &self.modifier);
        if !self.tags.is_empty() {
            obj.insert(
                "tags".into(),
                Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
            );
        }
        obj
    }

    /// Decode a tiddler from its flat JSON object form.
    pub fn from_json_object(obj: &Map<String, Value>) -> CodecResult<Self> {
        let mut t = Tiddler::default();
        t.merge_from(obj)?;
        Ok(t)
    }

    /// Overlay the keys of `obj` onto this tiddler.
    ///
    /// `fields` is replaced: a nested `fields` object seeds it, then every
    /// unreserved top-level key is added. Reserved keys overwrite their slot
    /// only when present, so a metadata object can be merged onto a tiddler
    /// built from node attributes.
    pub fn merge_from(&mut self, obj: &Map<String, Value>) -> CodecResult<()> {
        self.fields = match obj.get("fields") {
            Some(Value::Object(nested)) => nested
                .iter()
                .filter(|(k, _)| !is_reserved(k))
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect(),
            _ => Default::default(),
        };

        for (key, value) in obj {
            match key.as_str() {
                "title" => self.title = value_to_string(value),
                "revision" => {
                    let raw = value_to_string(value);
                    self.revision = if raw.is_empty() {
                        None
                    } else {
                        Some(parse_revision(&raw)?)
                    };
                }
                "tags" => match value {
                    Value::Array(items) => {
                        self.tags = items.iter().map(value_to_string).collect();
                    }
                    other => warn!(tags = %other, "unrecognized tags value; ignoring"),
                },
                "type" => self.content_type = value_to_string(value),
                "bag" => self.bag = value_to_string(value),
                "recipe" => self.recipe = value_to_string(value),
                "permissions" => self.permissions = value_to_string(value),
                "creator" => self.creator = value_to_string(value),
                "created" => self.created = value_to_string(value),
                "modifier" => self.modifier = value_to_string(value),
                "modified" => self.modified = value_to_string(value),
                "text" => self.text = value_to_string(value),
                "fields" => {}
                NODE_REF_KEY => {
                    let raw = value_to_string(value);
                    if !raw.is_empty() {
                        let node = ObjectId::from_hex(&raw)
                            .map_err(|_| CodecError::InvalidNodeRef(raw.clone()))?;
                        self.node = Some(node);
                    }
                }
                _ => {
                    self.fields.insert(key.clone(), FieldValue::from_json(value));
                }
            }
        }
        Ok(())
    }
}

/// Serialize `t` as a compact JSON object.
pub fn encode_json(t: &Tiddler) -> Vec<u8> {
    Value::Object(t.to_json_object()).to_string().into_bytes()
}

/// Parse bytes that must hold a single JSON object.
pub fn decode_object(data: &[u8]) -> CodecResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Object(obj) => Ok(obj),
        Value::Array(_) => Err(CodecError::NotAnObject("array")),
        Value::String(_) => Err(CodecError::NotAnObject("string")),
        Value::Number(_) => Err(CodecError::NotAnObject("number")),
        Value::Bool(_) => Err(CodecError::NotAnObject("boolean")),
        Value::Null => Err(CodecError::NotAnObject("null")),
    }
}

/// Decode a tiddler from a JSON object.
pub fn decode_json(data: &[u8]) -> CodecResult<Tiddler> {
    Tiddler::from_json_object(&decode_object(data)?)
}
