use std::sync::Arc;

use tk_keep::TiddlerStore;
use tk_store::{ContentStore, InMemoryContentStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::{build_router, AppState};

/// TiddlyWeb server over a tiddler store.
pub struct KeepServer {
    config: ServerConfig,
    keep: Arc<TiddlerStore>,
}

impl KeepServer {
    pub fn new(config: ServerConfig, store: Arc<dyn ContentStore>) -> Self {
        let keep = Arc::new(TiddlerStore::new(store, config.keep.clone()));
        Self { config, keep }
    }

    /// Serve the journal named in `config`, or a fresh in-memory store.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = match &config.journal {
            Some(path) => InMemoryContentStore::open_journal(path)?,
            None => InMemoryContentStore::new(),
        };
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn keep(&self) -> &Arc<TiddlerStore> {
        &self.keep
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.keep.clone(), &self.config))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            user = %self.config.username,
            recipe = %self.config.recipe,
            "TiddlyKeep listening"
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}
