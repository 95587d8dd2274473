use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tk_types::ObjectId;

/// A predicate over a node's current attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    /// Some value of `attr` equals `value`.
    AttrEquals { attr: String, value: String },
    /// `attr` carries at least `min` values.
    AttrCount { attr: String, min: usize },
    /// Some value of `attr` starts with `prefix`.
    AttrPrefix { attr: String, prefix: String },
    /// Both sides hold.
    And(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    pub fn attr_eq(attr: &str, value: impl Into<String>) -> Self {
        Self::AttrEquals {
            attr: attr.to_string(),
            value: value.into(),
        }
    }

    /// `attr` has at least one value.
    pub fn has_attr(attr: &str) -> Self {
        Self::AttrCount {
            attr: attr.to_string(),
            min: 1,
        }
    }

    pub fn attr_prefix(attr: &str, prefix: impl Into<String>) -> Self {
        Self::AttrPrefix {
            attr: attr.to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn and(self, other: Constraint) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Evaluate against an attribute map.
    pub fn matches(&self, attrs: &BTreeMap<String, Vec<String>>) -> bool {
        let values = |attr: &str| attrs.get(attr).map(Vec::as_slice).unwrap_or(&[]);
        match self {
            Self::AttrEquals { attr, value } => values(attr).iter().any(|v| v == value),
            Self::AttrCount { attr, min } => values(attr).len() >= *min,
            Self::AttrPrefix { attr, prefix } => {
                values(attr).iter().any(|v| v.starts_with(prefix.as_str()))
            }
            Self::And(a, b) => a.matches(attrs) && b.matches(attrs),
        }
    }
}

/// A node search: a constraint plus the attributes to describe for each hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub constraint: Constraint,
    /// `None` skips description; `Some(vec![])` describes every attribute.
    pub describe: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            describe: None,
        }
    }

    /// Ask for `attrs` on every matching node.
    pub fn describing(mut self, attrs: &[&str]) -> Self {
        self.describe = Some(attrs.iter().map(|a| a.to_string()).collect());
        self
    }
}

/// Matching nodes, with descriptions when requested.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub nodes: Vec<ObjectId>,
    pub described: HashMap<ObjectId, DescribedNode>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Descriptions in result order.
    pub fn described_nodes(&self) -> impl Iterator<Item = &DescribedNode> {
        self.nodes.iter().filter_map(|n| self.described.get(n))
    }
}

/// A node's attributes as of its latest claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescribedNode {
    pub node: ObjectId,
    pub attrs: BTreeMap<String, Vec<String>>,
    pub mod_time: DateTime<Utc>,
}

impl DescribedNode {
    /// First value of `attr`, if any.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.attrs
            .get(attr)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }

    pub fn values(&self, attr: &str) -> &[String] {
        self.attrs.get(attr).map(Vec::as_slice).unwrap_or(&[])
    }
}
