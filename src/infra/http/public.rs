use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, FromRef, Path, Query, State},
    http::{
        HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::{FeedContext, FeedError, FeedScope, FeedService},
        follows::{FollowError, FollowService},
        pagination::PageNumber,
        posts::{PostDraft, PostError, PostService},
    },
    cache::{CacheState, response_cache_layer},
    domain::entities::UserRecord,
    infra::media::{MediaStorage, MediaStorageError},
    presentation::views::{
        FeedTemplate, FeedView, LayoutChrome, LayoutContext, PostDetailView, PostFormTemplate,
        PostFormView, PostTemplate, ProfileTemplate, ProfileView, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{AuthState, CurrentUser, Viewer, resolve_viewer},
    forms::{CommentForm, read_post_draft},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: FollowService,
    pub posts: Arc<PostService>,
    pub media: Arc<MediaStorage>,
    pub auth: AuthState,
    pub cache: Option<CacheState>,
}

impl FromRef<HttpState> for AuthState {
    fn from_ref(state: &HttpState) -> Self {
        state.auth.clone()
    }
}

/// Public site router. Only the global index goes through the response
/// cache; every other view is rendered per request.
pub fn build_router(state: HttpState, max_request_bytes: usize) -> Router {
    let index_routes = Router::new().route("/", get(index));
    let index_routes = if let Some(cache_state) = state.cache.clone() {
        index_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        index_routes
    };

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/new/", get(new_post_form).post(create_post))
        .route("/follow/", get(follow_index))
        .route("/media/{*path}", get(serve_media))
        .route("/{username}/", get(profile))
        .route("/{username}/follow/", get(profile_follow))
        .route("/{username}/unfollow/", get(profile_unfollow))
        .route("/{username}/{post_id}/", get(post_view))
        .route(
            "/{username}/{post_id}/edit/",
            get(post_edit_form).post(post_edit),
        )
        .route("/{username}/{post_id}/delete/", post(post_delete))
        .route("/{username}/{post_id}/comment", post(add_comment))
        .layer(DefaultBodyLimit::max(max_request_bytes));

    let auth = state.auth.clone();
    index_routes
        .merge(routes)
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth, resolve_viewer))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    render_feed(&state, &viewer, FeedScope::All, query.number(), "/").await
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let path = format!("/group/{slug}/");
    render_feed(&state, &viewer, FeedScope::Group(slug), query.number(), &path).await
}

async fn follow_index(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    render_feed(
        &state,
        &viewer,
        FeedScope::FollowedBy(user.id),
        query.number(),
        "/follow/",
    )
    .await
}

async fn render_feed(
    state: &HttpState,
    viewer: &Viewer,
    scope: FeedScope,
    page: PageNumber,
    path: &str,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    match state.feed.page(&scope, page).await {
        Ok(feed) => {
            let content = FeedView::new(&feed.context, feed.page, viewer.username());
            let view = LayoutContext::new(chrome, content);
            render_template_response(FeedTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, path),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = profile_href(&username);

    let feed = match state
        .feed
        .page(&FeedScope::Author(username), query.number())
        .await
    {
        Ok(feed) => feed,
        Err(err) => return feed_error_to_response(err, chrome, &path),
    };
    let FeedContext::Author(author) = &feed.context else {
        return render_not_found_response(chrome, &path);
    };
    let author = author.clone();

    let following = match viewer.user() {
        Some(user) if user.id != author.id => {
            match state.follows.is_following(user.id, author.id).await {
                Ok(following) => Some(following),
                Err(err) => return HttpError::from(err).into_response(),
            }
        }
        _ => None,
    };
    let counts = match state.follows.counts(author.id).await {
        Ok(counts) => counts,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = FeedView::new(&feed.context, feed.page, viewer.username());
    let content = ProfileView::new(&author, counts, following, content);
    let view = LayoutContext::new(chrome, content);
    render_template_response(ProfileTemplate { view }, StatusCode::OK)
}

async fn profile_follow(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("{}follow/", profile_href(&username));
    let author = match resolve_author(&state, &username).await {
        Ok(author) => author,
        Err(err) => return feed_error_to_response(err, chrome, &path),
    };

    match state.follows.follow(user.id, author.id).await {
        Ok(outcome) => {
            info!(
                target = "infra::http::public::profile_follow",
                user = %user.username,
                author = %author.username,
                ?outcome,
                "follow requested"
            );
            Redirect::to(&profile_href(&author.username)).into_response()
        }
        Err(err) => follow_error_to_response(err, chrome, &path),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("{}unfollow/", profile_href(&username));
    let author = match resolve_author(&state, &username).await {
        Ok(author) => author,
        Err(err) => return feed_error_to_response(err, chrome, &path),
    };

    match state.follows.unfollow(user.id, author.id).await {
        Ok(()) => Redirect::to(&profile_href(&author.username)).into_response(),
        Err(err) => follow_error_to_response(err, chrome, &path),
    }
}

async fn resolve_author(state: &HttpState, username: &str) -> Result<UserRecord, FeedError> {
    match state
        .feed
        .resolve(&FeedScope::Author(username.to_string()))
        .await?
        .context
    {
        FeedContext::Author(author) => Ok(author),
        _ => Err(FeedError::NotFound { entity: "author" }),
    }
}

async fn post_view(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path((username, raw_post_id)): Path<(String, String)>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("/{username}/{raw_post_id}/");
    let Some(post_id) = parse_post_id(&raw_post_id) else {
        return render_not_found_response(chrome, &path);
    };

    match load_post_detail(&state, &viewer, &username, post_id).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, &path),
    }
}

async fn load_post_detail(
    state: &HttpState,
    viewer: &Viewer,
    username: &str,
    post_id: i64,
) -> Result<PostDetailView, FeedError> {
    let detail = state.feed.post_detail(username, post_id).await?;
    let counts = state.follows.counts(detail.author.id).await?;
    Ok(PostDetailView::new(detail, counts, viewer.username()))
}

async fn new_post_form(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(_user): CurrentUser,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    match state.posts.group_choices().await {
        Ok(groups) => {
            let view = LayoutContext::new(chrome, PostFormView::new_post(groups));
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn create_post(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let draft = match read_post_draft(&mut multipart).await {
        Ok(draft) => draft,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let submitted = draft.clone();

    match state.posts.create_post(user.id, draft).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(PostError::Validation(errors)) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let content = PostFormView::new_post(groups).with_submission(
                &submitted.text,
                submitted.group.as_deref(),
                &errors,
            );
            invalid_form_response(chrome, content, "create_post")
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, raw_post_id)): Path<(String, String)>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("/{username}/{raw_post_id}/edit/");
    let Some(post_id) = parse_post_id(&raw_post_id) else {
        return render_not_found_response(chrome, &path);
    };

    let post = match state.posts.editable_post(&username, post_id, user.id).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, chrome, &path, &username),
    };
    match state.posts.group_choices().await {
        Ok(groups) => {
            let content = PostFormView::edit_post(&username, &post, groups);
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, raw_post_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("/{username}/{raw_post_id}/edit/");
    let Some(post_id) = parse_post_id(&raw_post_id) else {
        return render_not_found_response(chrome, &path);
    };

    // Ownership is checked before the body is read so that a rejected
    // editor never uploads anything.
    let existing = match state.posts.editable_post(&username, post_id, user.id).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, chrome, &path, &username),
    };

    let draft: PostDraft = match read_post_draft(&mut multipart).await {
        Ok(draft) => draft,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let submitted = draft.clone();

    match state
        .posts
        .update_post(&username, post_id, user.id, draft)
        .await
    {
        Ok(post) => Redirect::to(&post_href(&username, post.id)).into_response(),
        Err(PostError::Validation(errors)) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let content = PostFormView::edit_post(&username, &existing, groups).with_submission(
                &submitted.text,
                submitted.group.as_deref(),
                &errors,
            );
            invalid_form_response(chrome, content, "post_edit")
        }
        Err(err) => post_error_to_response(err, chrome, &path, &username),
    }
}

async fn post_delete(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, raw_post_id)): Path<(String, String)>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("/{username}/{raw_post_id}/delete/");
    let Some(post_id) = parse_post_id(&raw_post_id) else {
        return render_not_found_response(chrome, &path);
    };

    match state.posts.delete_post(&username, post_id, user.id).await {
        Ok(()) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => post_error_to_response(err, chrome, &path, &username),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, raw_post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    let path = format!("/{username}/{raw_post_id}/comment");
    let Some(post_id) = parse_post_id(&raw_post_id) else {
        return render_not_found_response(chrome, &path);
    };

    match state
        .posts
        .add_comment(&username, post_id, user.id, &form.text)
        .await
    {
        Ok(_) => Redirect::to(&post_href(&username, post_id)).into_response(),
        Err(PostError::Validation(errors)) => {
            let content = match load_post_detail(&state, &viewer, &username, post_id).await {
                Ok(content) => content.with_comment_errors(&form.text, &errors),
                Err(err) => return feed_error_to_response(err, chrome, &path),
            };
            let view = LayoutContext::new(chrome, content);
            let mut response = render_template_response(PostTemplate { view }, StatusCode::BAD_REQUEST);
            ErrorReport::from_message(
                "infra::http::public::add_comment",
                StatusCode::BAD_REQUEST,
                "comment form rejected",
            )
            .attach(&mut response);
            response
        }
        Err(err) => post_error_to_response(err, chrome, &path, &username),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn fallback(viewer: Viewer, request: Request<Body>) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.username());
    render_not_found_response(chrome, request.uri().path())
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn invalid_form_response(
    chrome: LayoutChrome,
    content: PostFormView,
    handler: &'static str,
) -> Response {
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(PostFormTemplate { view }, StatusCode::BAD_REQUEST);
    ErrorReport::from_message(
        "infra::http::public::post_form",
        StatusCode::BAD_REQUEST,
        format!("{handler}: post form rejected"),
    )
    .attach(&mut response);
    response
}

fn not_found_with_report(chrome: LayoutChrome, path: &str, report: ErrorReport) -> Response {
    let mut response = render_not_found_response(chrome, path);
    report.attach(&mut response);
    response
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome, path: &str) -> Response {
    match err {
        FeedError::NotFound { entity } => not_found_with_report(
            chrome,
            path,
            ErrorReport::from_message(
                "infra::http::feed_error_to_response",
                StatusCode::NOT_FOUND,
                format!("unknown {entity}"),
            ),
        ),
        FeedError::Follow(err) => follow_error_to_response(err, chrome, path),
        err => HttpError::from(err).into_response(),
    }
}

fn follow_error_to_response(err: FollowError, chrome: LayoutChrome, path: &str) -> Response {
    match err {
        FollowError::NotFound => not_found_with_report(
            chrome,
            path,
            ErrorReport::from_message(
                "infra::http::follow_error_to_response",
                StatusCode::NOT_FOUND,
                "follow edge does not exist",
            ),
        ),
        err => HttpError::from(err).into_response(),
    }
}

/// Non-authors are sent back to the post instead of seeing an error.
fn post_error_to_response(
    err: PostError,
    chrome: LayoutChrome,
    path: &str,
    username: &str,
) -> Response {
    match err {
        PostError::NotFound => not_found_with_report(
            chrome,
            path,
            ErrorReport::from_message(
                "infra::http::post_error_to_response",
                StatusCode::NOT_FOUND,
                "post lookup did not match any record",
            ),
        ),
        PostError::Forbidden { post_id, editor_id } => {
            info!(
                target = "infra::http::post_error_to_response",
                post_id, editor_id, "non-author redirected to post view"
            );
            Redirect::to(&post_href(username, post_id)).into_response()
        }
        err => HttpError::from(err).into_response(),
    }
}
