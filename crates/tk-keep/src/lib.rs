//! The TiddlyKeep tiddler store.
//!
//! Maps wiki documents onto a [`ContentStore`](tk_store::ContentStore): each
//! tiddler is one node, found by its `title` and `tiddlerBag` attributes,
//! pointing at a metadata blob and a body blob. Tags live directly on the
//! node as one `tag` value per tag.
//!
//! - [`RefResolver`] -- finds (or creates) the node behind a [`TiddlerRef`].
//! - [`reconcile`] -- the minimal tag mutations between two tag sets.
//! - [`TiddlerStore`] -- put / get / delete / list.
//! - [`IndexAssembler`] -- serves the wiki's bootstrap HTML, optionally with
//!   tiddlers preloaded into it.
//!
//! [`TiddlerRef`]: tk_codec::TiddlerRef

pub mod config;
pub mod constraints;
pub mod error;
pub mod etag;
pub mod index;
pub mod resolver;
pub mod store;
pub mod tags;

pub use config::{KeepConfig, Recipe, Visibility};
pub use error::{KeepError, KeepResult};
pub use etag::entity_tag;
pub use index::{IndexAssembler, BOOT_MARKER, INDEX_TITLE};
pub use resolver::RefResolver;
pub use store::{always_text, never_text, PutReport, TextFilter, TiddlerStore};
pub use tags::{reconcile, TagMutation};
