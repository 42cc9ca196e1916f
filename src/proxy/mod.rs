//! HTTP front that mirrors the node's REST API.
//!
//! Three route classes:
//! - address-scoped lists, cached and indexed under the address
//! - immutable lookups by id, cached without an address
//! - everything else, forwarded live and never cached
//!
//! Status and content type always come from the origin (or from the stored
//! entry on a hit).

pub mod server;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::OriginError;
use crate::node::{Origin, OriginResponse};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub use server::ProxyServer;

#[derive(Clone)]
pub struct ProxyState {
    pub cache: Arc<CacheStore>,
    pub origin: Arc<dyn Origin>,
}

pub fn router(cache: Arc<CacheStore>, origin: Arc<dyn Origin>) -> Router {
    Router::new()
        .route("/assets/details/:id", get(cached_by_id))
        .route("/transactions/info/:id", get(cached_by_id))
        .route(
            "/transactions/address/:address/limit/:limit",
            get(cached_by_address),
        )
        .fallback(passthrough)
        .with_state(ProxyState { cache, origin })
}

/// Request path without the leading slash, plus the query string when present
pub fn cache_key(uri: &Uri) -> String {
    let path = uri.path().trim_start_matches('/');
    match uri.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_string(),
    }
}

async fn cached_by_id(State(state): State<ProxyState>, uri: Uri) -> Response {
    let key = cache_key(&uri);
    match state.cache.fetch_or_populate(&key, None).await {
        Ok(entry) => entry.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn cached_by_address(
    State(state): State<ProxyState>,
    Path((address, _limit)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    let key = cache_key(&uri);
    match state.cache.fetch_or_populate(&key, Some(&address)).await {
        Ok(entry) => entry.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn passthrough(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = cache_key(&uri);
    tracing::debug!("↪️ proxying {} {}", method, key);

    let result = match method {
        Method::GET => state.origin.get(&key).await,
        Method::POST => {
            let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
            state.origin.post(&key, body, content_type).await
        }
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    match result {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

fn relay(status: u16, content_type: Option<&str>, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    match content_type.and_then(|v| HeaderValue::from_str(v).ok()) {
        Some(value) => {
            headers.insert(CONTENT_TYPE, value);
        }
        None => {
            headers.remove(CONTENT_TYPE);
        }
    }
    response
}

impl IntoResponse for CacheEntry {
    fn into_response(self) -> Response {
        relay(self.status, self.content_type.as_deref(), self.body)
    }
}

impl IntoResponse for OriginResponse {
    fn into_response(self) -> Response {
        relay(self.status, self.content_type.as_deref(), self.body)
    }
}

impl IntoResponse for OriginError {
    fn into_response(self) -> Response {
        let status = match self {
            OriginError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!("⚠️ origin request failed: {}", self);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
