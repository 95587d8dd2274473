//! Content store contract for TiddlyKeep.
//!
//! The tiddler store keeps every document on a content-addressed store made
//! of two kinds of things:
//!
//! - **Content blobs** -- immutable byte sequences addressed by their hash.
//!   Uploading identical bytes twice yields the same handle and no new storage.
//! - **Nodes** -- mutable attribute records. A node never changes identity;
//!   its attributes are the replay of the signed, append-only claims made
//!   against it. A delete claim tombstones the node without erasing it.
//!
//! The [`ContentStore`] trait is the contract the rest of the system consumes.
//! [`InMemoryContentStore`] is a reference backend for tests, embedding and
//! local use; it can be backed by an append-only [`Journal`] file.
//!
//! # Design Rules
//!
//! 1. Content is written first, claims second. A claim is only appended when
//!    the handle it records actually changes.
//! 2. Claims are append-only and signed; nothing is ever rewritten.
//! 3. A store sees its own committed claims on the next query (read-after-write).
//! 4. All I/O errors are propagated, never silently ignored.

pub mod claim;
pub mod clock;
pub mod error;
pub mod journal;
pub mod memory;
pub mod query;
pub mod traits;

pub use claim::{Claim, ClaimBody, ClaimOp, NodeAllocation, SignedClaim};
pub use clock::{Clock, StepClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use journal::{Journal, JournalRecord};
pub use memory::InMemoryContentStore;
pub use query::{Constraint, DescribedNode, SearchQuery, SearchResult};
pub use traits::ContentStore;
