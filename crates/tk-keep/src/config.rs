use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tk_codec::SYSTEM_PREFIX;
use tk_types::ObjectId;

use crate::error::KeepError;

/// Which tiddlers a setting applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    None,
    /// Only titles starting with `$:/`.
    #[default]
    System,
    All,
}

impl Visibility {
    pub fn covers(self, title: &str) -> bool {
        match self {
            Self::None => false,
            Self::System => title.starts_with(SYSTEM_PREFIX),
            Self::All => true,
        }
    }

    /// The recipe listing the covered tiddlers, if any.
    pub fn recipe(self) -> Option<Recipe> {
        match self {
            Self::None => None,
            Self::System => Some(Recipe::System),
            Self::All => Some(Recipe::All),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::System => "system",
            Self::All => "all",
        })
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "system" => Ok(Self::System),
            "all" => Ok(Self::All),
            other => Err(format!("expected one of none, system, all; got {other:?}")),
        }
    }
}

/// A virtual view across bags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipe {
    /// Every tiddler in every bag.
    All,
    /// System tiddlers in every bag.
    System,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::System => "system",
        })
    }
}

impl FromStr for Recipe {
    type Err = KeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "system" => Ok(Self::System),
            other => Err(KeepError::UnsupportedRecipe(other.to_string())),
        }
    }
}

/// Tiddler store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepConfig {
    /// Newly created nodes covered by this are marked hidden.
    pub hide_nodes: Visibility,
    /// Tiddlers preloaded into the served index document.
    pub embed: Visibility,
    /// Bag used when a tiddler names none.
    pub default_bag: String,
    /// Known node of the index document; located by title when unset.
    pub index_node: Option<ObjectId>,
}

impl Default for KeepConfig {
    fn default() -> Self {
        Self {
            hide_nodes: Visibility::System,
            embed: Visibility::System,
            default_bag: "default".to_string(),
            index_node: None,
        }
    }
}
