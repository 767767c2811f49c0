use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fieldsift_core::{ArchiveLookup, FieldsiftError};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub url: Option<String>,
    pub name: Option<String>,
    pub archive: Option<bool>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/profile", get(profile))
        .route("/tables", get(tables))
        .route("/narrative", get(narrative))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Accepts only absolute http(s) URLs.
fn require_url(url: Option<&str>) -> Result<String, ApiError> {
    let raw = url.map(str::trim).filter(|u| !u.is_empty()).ok_or(ApiError::MissingParam("url"))?;
    let parsed = Url::parse(raw).map_err(|e| FieldsiftError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FieldsiftError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())).into());
    }
    Ok(raw.to_string())
}

fn cache_key(uri: &Uri) -> String {
    uri.path_and_query().map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string())
}

fn cached_response(state: &AppState, body: Value) -> Response {
    let mut response = Json(body).into_response();
    let max_age = format!("public, max-age={}", state.cache_ttl.as_secs());
    if let Ok(value) = HeaderValue::from_str(&max_age) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

async fn lookup(state: &AppState, key: &str) -> Option<Response> {
    let body = state.cache.get(key).await?;
    tracing::debug!(key, "cache hit");
    Some(cached_response(state, body))
}

async fn store(state: &AppState, key: String, body: Value) -> Response {
    state.cache.insert(key, body.clone()).await;
    cached_response(state, body)
}

async fn profile(
    State(state): State<Arc<AppState>>, uri: Uri, Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let url = require_url(query.url.as_deref())?;
    let key = cache_key(&uri);
    if let Some(hit) = lookup(&state, &key).await {
        return Ok(hit);
    }

    let extractor = state.extractor_for(&url).await?;
    let fetched = state.fetcher.fetch(&url).await?;
    let mut result = extractor.extract(&fetched.text, query.name.as_deref(), None, Some(&url));

    if query.archive.unwrap_or(extractor.config().archive) {
        let archive_url = ArchiveLookup::new().closest_snapshot(&state.fetcher, &url).await;
        result = result.with_archive_url(archive_url);
    }

    tracing::info!(
        url = %url,
        fields = result.profile.len(),
        history = result.history.len(),
        truncated = fetched.truncated,
        "profile extracted"
    );

    Ok(store(&state, key, result.to_json()?).await)
}

async fn tables(
    State(state): State<Arc<AppState>>, uri: Uri, Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let url = require_url(query.url.as_deref())?;
    let key = cache_key(&uri);
    if let Some(hit) = lookup(&state, &key).await {
        return Ok(hit);
    }

    let extractor = state.extractor_for(&url).await?;
    let fetched = state.fetcher.fetch(&url).await?;
    let selection = extractor.filter_tables(&fetched.text);
    let joined = selection.joined(&extractor.config().tables.separator);

    let body = json!({
        "url": url,
        "kept": selection.kept,
        "discarded": selection.discarded.len(),
        "joined": joined,
    });
    Ok(store(&state, key, body).await)
}

async fn narrative(
    State(state): State<Arc<AppState>>, uri: Uri, Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let url = require_url(query.url.as_deref())?;
    let key = cache_key(&uri);
    if let Some(hit) = lookup(&state, &key).await {
        return Ok(hit);
    }

    let extractor = state.extractor_for(&url).await?;
    let fetched = state.fetcher.fetch(&url).await?;
    let span = extractor.narrative_span(&fetched.text, query.name.as_deref());

    let body = json!({ "url": url, "narrative": span.text });
    Ok(store(&state, key, body).await)
}
