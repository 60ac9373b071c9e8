mod admin;
mod auth;
mod forms;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use auth::{AuthState, CurrentUser, Viewer};
pub use public::{HttpState, build_router};

use crate::application::error::ErrorReport;
use crate::application::error::HttpError;
use crate::application::repos::RepoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlx::Error as SqlxError;

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { key } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Duplicate record",
            key.constraint(),
        ),
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::UniqueKey;

    #[test]
    fn repo_errors_map_to_statuses() {
        let cases = [
            (
                RepoError::duplicate(UniqueKey::Username),
                StatusCode::CONFLICT,
            ),
            (RepoError::NotFound, StatusCode::NOT_FOUND),
            (RepoError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                RepoError::from_persistence("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = repo_error_to_http("test", err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn failed_health_check_is_unavailable() {
        let response = db_health_response(Err(SqlxError::PoolTimedOut));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
