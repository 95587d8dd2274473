use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tk_codec::{decode_json, Tiddler, TiddlerRef};
use tk_keep::{always_text, never_text, TextFilter};

use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

/// Query string of the listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub fat: Option<String>,
}

impl ListParams {
    /// `fat=1` asks for bodies.
    fn text_filter(&self) -> TextFilter<'static> {
        if self.fat.as_deref() == Some("1") {
            &always_text
        } else {
            &never_text
        }
    }
}

/// The bootstrap document.
pub async fn index(State(state): State<AppState>) -> ServerResult<Response> {
    let mut document = Vec::new();
    state.keep.generate_index(&mut document).await?;
    Ok(([(header::CONTENT_TYPE, "text/html")], document).into_response())
}

pub async fn index_head() -> impl IntoResponse {
    [(header::CONTENT_TYPE, "text/html")]
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "username": state.username,
        "space": { "recipe": state.recipe },
    }))
}

pub async fn list_bag(
    State(state): State<AppState>,
    Path(bag): Path<String>,
    Query(params): Query<ListParams>,
) -> ServerResult<Json<Vec<Tiddler>>> {
    Ok(Json(state.keep.list_bag(&bag, params.text_filter()).await?))
}

pub async fn list_recipe(
    State(state): State<AppState>,
    Path(recipe): Path<String>,
    Query(params): Query<ListParams>,
) -> ServerResult<Json<Vec<Tiddler>>> {
    Ok(Json(state.keep.list_recipe(&recipe, params.text_filter()).await?))
}

pub async fn get_bag_tiddler(
    State(state): State<AppState>,
    Path((bag, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    read_tiddler(&state, TiddlerRef::in_bag(title, bag), None, &headers).await
}

pub async fn get_recipe_tiddler(
    State(state): State<AppState>,
    Path((recipe, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let r = TiddlerRef::in_recipe(title, recipe.clone());
    read_tiddler(&state, r, Some(recipe), &headers).await
}

async fn read_tiddler(
    state: &AppState,
    r: TiddlerRef,
    recipe: Option<String>,
    headers: &HeaderMap,
) -> ServerResult<Response> {
    let (resolved, etag) = state.keep.entity_tag(&r).await?;
    let etag = etag_header(&etag)?;
    if headers.get(header::IF_NONE_MATCH) == Some(&etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let mut tiddler = state.keep.get(&resolved, &always_text).await?;
    if let Some(recipe) = recipe {
        tiddler.recipe = recipe;
    }
    Ok(([(header::ETAG, etag)], Json(tiddler)).into_response())
}

/// Upsert. The path names the tiddler; identity in the body is ignored.
pub async fn put_recipe_tiddler(
    State(state): State<AppState>,
    Path((recipe, title)): Path<(String, String)>,
    body: Bytes,
) -> ServerResult<Response> {
    let mut tiddler = decode_json(&body)?;
    tiddler.title = title;
    tiddler.recipe = recipe;
    tiddler.node = None;

    let report = state.keep.put(&tiddler).await?;
    let (_, etag) = state.keep.entity_tag(&TiddlerRef::by_node(report.node)).await?;
    Ok([(header::ETAG, etag_header(&etag)?)].into_response())
}

pub async fn delete_bag_tiddler(
    State(state): State<AppState>,
    Path((bag, title)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    state.keep.delete(&TiddlerRef::in_bag(title, bag)).await?;
    Ok(StatusCode::OK)
}

fn etag_header(etag: &str) -> ServerResult<HeaderValue> {
    HeaderValue::from_bytes(etag.as_bytes())
        .map_err(|e| ServerError::Internal(format!("entity tag {etag:?}: {e}")))
}
