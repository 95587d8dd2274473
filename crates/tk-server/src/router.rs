use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tk_keep::TiddlerStore;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub keep: Arc<TiddlerStore>,
    pub username: String,
    pub recipe: String,
}

impl AppState {
    pub fn new(keep: Arc<TiddlerStore>, config: &ServerConfig) -> Self {
        Self {
            keep,
            username: config.username.clone(),
            recipe: config.recipe.clone(),
        }
    }
}

/// Build the axum router with all TiddlyWeb endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::index).head(handler::index_head))
        .route("/status", get(handler::status))
        .route("/bags/:bag/tiddlers.json", get(handler::list_bag))
        .route("/recipes/:recipe/tiddlers.json", get(handler::list_recipe))
        .route(
            "/bags/:bag/tiddlers/*title",
            get(handler::get_bag_tiddler).delete(handler::delete_bag_tiddler),
        )
        .route(
            "/recipes/:recipe/tiddlers/*title",
            get(handler::get_recipe_tiddler).put(handler::put_recipe_tiddler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
