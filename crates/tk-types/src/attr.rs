//! Node attribute names.
//!
//! A tiddler node is an attribute record; these are the keys it carries.

/// Tiddler title. Also used to locate the bootstrap document node.
pub const TITLE: &str = "title";

/// The bag owning the node.
pub const BAG: &str = "tiddlerBag";

/// Handle of the metadata blob (JSON object of the tiddler's fields).
pub const META: &str = "tiddlerMeta";

/// Handle of the body blob.
pub const CONTENT: &str = "camliContent";

/// One value per tag.
pub const TAG: &str = "tag";

/// Default-visibility marker written on nodes hidden from generic browsing.
pub const DEFAULT_VISIBILITY: &str = "camliDefVis";

/// Value of [`DEFAULT_VISIBILITY`] that hides a node.
pub const HIDE: &str = "hide";

/// Free-form description, set on the bootstrap document node.
pub const DESCRIPTION: &str = "description";

/// Attributes fetched whenever a tiddler node is described.
pub const TIDDLER_NODE_ATTRS: &[&str] = &[TITLE, BAG, META, CONTENT, TAG];
