//! Viewer resolution and the login gate.
//!
//! Authentication itself happens upstream: a trusted proxy sets the configured
//! header to the username of the signed-in account. This module turns that
//! header into a [`Viewer`] and guards the routes that need an account.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, HeaderName, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;
use url::form_urlencoded;

use crate::application::repos::{RepoError, UsersRepo};
use crate::config::AuthSettings;
use crate::domain::entities::UserRecord;

use super::repo_error_to_http;

const SOURCE: &str = "infra::http::auth";

/// Who is looking at the page. Inserted into request extensions by
/// [`resolve_viewer`].
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    user: Option<UserRecord>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserRecord) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<dyn UsersRepo>,
    pub user_header: HeaderName,
    pub login_url: String,
}

impl AuthState {
    pub fn new(users: Arc<dyn UsersRepo>, settings: &AuthSettings) -> Self {
        Self {
            users,
            user_header: settings.user_header.clone(),
            login_url: settings.login_url.clone(),
        }
    }

    async fn lookup(&self, headers: &HeaderMap) -> Result<Viewer, RepoError> {
        let Some(username) = headers
            .get(&self.user_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Ok(Viewer::anonymous());
        };

        match self.users.find_user_by_username(username).await? {
            Some(user) => Ok(Viewer::signed_in(user)),
            None => {
                warn!(
                    target = SOURCE,
                    username, "authenticated header names an unknown user; treating as anonymous"
                );
                Ok(Viewer::anonymous())
            }
        }
    }

    /// Where an anonymous request to `original` is sent to sign in.
    pub fn login_redirect(&self, original: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(original.as_bytes()).collect();
        format!("{}?next={}", self.login_url, encoded.replace("%2F", "/"))
    }
}

/// Resolve the [`Viewer`] for every request. Must run before the response
/// cache, which keys entries by viewer. The viewer is copied onto the
/// response for the access log.
pub async fn resolve_viewer(
    State(auth): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = match auth.lookup(request.headers()).await {
        Ok(viewer) => viewer,
        Err(err) => return repo_error_to_http(SOURCE, err).into_response(),
    };
    request.extensions_mut().insert(viewer.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}

/// Extractor for routes that need an account. Anonymous requests are
/// redirected to the login page with `next` pointing back at them.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<Viewer>().and_then(Viewer::user) {
            return Ok(CurrentUser(user.clone()));
        }

        let auth = AuthState::from_ref(state);
        let original = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        Err(Redirect::to(&auth.login_redirect(original)).into_response())
    }
}
