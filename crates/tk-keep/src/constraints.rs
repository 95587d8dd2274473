//! The fixed query shapes the tiddler store issues.

use tk_codec::SYSTEM_PREFIX;
use tk_store::Constraint;
use tk_types::attr;

use crate::config::Recipe;

/// Nodes in `bag`.
pub fn in_bag(bag: &str) -> Constraint {
    Constraint::attr_eq(attr::BAG, bag)
}

/// Nodes in any bag.
pub fn any_bag() -> Constraint {
    Constraint::has_attr(attr::BAG)
}

/// Nodes titled `title`.
pub fn titled(title: &str) -> Constraint {
    Constraint::attr_eq(attr::TITLE, title)
}

/// Nodes selected by `recipe`.
pub fn in_recipe(recipe: Recipe) -> Constraint {
    match recipe {
        Recipe::All => any_bag(),
        Recipe::System => any_bag().and(Constraint::attr_prefix(attr::TITLE, SYSTEM_PREFIX)),
    }
}

/// Restrict `c` to nodes that already carry a metadata blob.
pub fn with_meta(c: Constraint) -> Constraint {
    Constraint::has_attr(attr::META).and(c)
}

/// The node holding the wiki's bootstrap document.
pub fn index_document(title: &str) -> Constraint {
    titled(title).and(Constraint::has_attr(attr::CONTENT))
}
