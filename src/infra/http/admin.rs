//! Operator listener: cache control and health checks.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::info;

use crate::{cache::CacheState, infra::db::PostgresRepositories};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub cache: Option<CacheState>,
    /// `None` when the in-process store is in use.
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/cache/invalidate", post(invalidate_cache))
        .route("/health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn invalidate_cache(State(state): State<AdminState>) -> Response {
    if let Some(cache) = &state.cache {
        let dropped = cache.store.len();
        cache.store.clear();
        info!(
            target = "infra::http::admin::invalidate_cache",
            dropped, "response cache cleared"
        );
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    match &state.db {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{CacheConfig, CacheKey, CachedResponse};

    #[tokio::test]
    async fn invalidate_clears_the_response_store() {
        let cache = CacheState::new(CacheConfig::default());
        cache.store.set(
            CacheKey::from_request("/", None, None),
            CachedResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::from_static(b"cached"),
            },
        );
        let app = build_admin_router(AdminState {
            cache: Some(cache.clone()),
            db: None,
        });

        let response = app
            .oneshot(
                Request::post("/cache/invalidate")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(cache.store.is_empty());
    }

    #[tokio::test]
    async fn health_without_database_is_ok() {
        let app = build_admin_router(AdminState {
            cache: None,
            db: None,
        });
        let response = app
            .oneshot(Request::get("/health/db").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
