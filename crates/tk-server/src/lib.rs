//! HTTP server for TiddlyKeep.
//!
//! Speaks the subset of the TiddlyWeb protocol a TiddlyWiki client needs
//! to load its bootstrap document and sync tiddlers: listing bags and
//! recipes, reading with entity tags, writing and deleting.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState};
pub use server::KeepServer;
