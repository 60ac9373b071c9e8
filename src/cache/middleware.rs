//! Response cache middleware.
//!
//! Serves GET requests from the [`ResponseStore`] while an entry is fresh and
//! stores successful responses on a miss. Mount it only on routes that may be
//! stale for up to the configured TTL.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::{CacheConfig, keys::CacheKey, store::CachedResponse, store::ResponseStore};
use crate::infra::http::Viewer;

/// Largest response body the cache will store. Larger pages are served
/// uncached.
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(ResponseStore::new(&config));
        Self { config, store }
    }
}

/// Middleware for response caching.
///
/// Only GET requests answered with 200 OK are stored. The viewer resolved by
/// the auth middleware is part of the key, so that layer must run first.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.username().map(str::to_string));
    let key = CacheKey::from_request(
        request.uri().path(),
        request.uri().query(),
        viewer.as_deref(),
    );

    if let Some(cached) = cache.store.get(&key) {
        debug!(cache = "response", outcome = "hit", page = key.page, "serving cached response");
        return build_response(cached);
    }

    debug!(
        cache = "response",
        outcome = "miss",
        page = key.page,
        "cache miss, executing handler"
    );

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    if exceeds_cache_limit(response.body().size_hint().lower()) {
        debug!(cache = "response", outcome = "skip", page = key.page, "response too large to cache");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "response", error = %err, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if exceeds_cache_limit(bytes.len() as u64) {
        debug!(cache = "response", outcome = "skip", page = key.page, "response too large to cache");
        return Response::from_parts(parts, Body::from(bytes));
    }

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    if let Some(evicted) = cache.store.set(key, cached) {
        debug!(cache = "response", evicted_page = evicted.page, "evicted cached response");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn exceeds_cache_limit(len: u64) -> bool {
    !usize::try_from(len).is_ok_and(|len| len <= MAX_CACHED_BODY_BYTES)
}

/// Build a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
