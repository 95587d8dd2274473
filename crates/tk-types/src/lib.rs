//! Foundation types for TiddlyKeep.
//!
//! Every other TiddlyKeep crate depends on `tk-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: content-addressed handle (BLAKE3 hash). Content blobs,
//!   claims and nodes are all addressed by one.
//! - [`attr`]: names of the node attributes the tiddler store reads and writes.

pub mod attr;
pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
