//! Shared harness for router-level tests: the public router over the
//! in-process store, a temporary media directory and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use quill::{
    application::{
        feed::FeedService,
        follows::FollowService,
        posts::PostService,
        repos::{
            CreateGroupParams, CreatePostParams, GroupsWriteRepo, PostQueryFilter, PostsRepo,
            PostsWriteRepo, Repositories, UsersWriteRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::{
        http::{AuthState, HttpState, build_router},
        media::MediaStorage,
        memory::InMemoryRepositories,
    },
};
use tower::ServiceExt;

pub const USER_HEADER: &str = "x-authenticated-user";
pub const LOGIN_URL: &str = "/auth/login/";
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// 1x1 transparent GIF.
pub const TINY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

pub struct TestApp {
    pub router: Router,
    pub repos: Arc<InMemoryRepositories>,
    pub cache: Option<CacheState>,
    pub media: Arc<MediaStorage>,
    _media_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(Some(CacheConfig::default()))
    }

    pub fn without_cache() -> Self {
        Self::with_cache(None)
    }

    fn with_cache(cache: Option<CacheConfig>) -> Self {
        let media_dir = tempfile::tempdir().expect("media dir");
        let media =
            Arc::new(MediaStorage::new(media_dir.path().to_path_buf()).expect("media storage"));
        let store = Arc::new(InMemoryRepositories::new());
        let repos = Repositories::from_store(store.clone());

        let follows = FollowService::new(repos.follows.clone());
        let feed = Arc::new(FeedService::new(
            repos.users.clone(),
            repos.groups.clone(),
            repos.posts.clone(),
            repos.comments.clone(),
            follows.clone(),
        ));
        let posts = Arc::new(PostService::new(
            repos.users.clone(),
            repos.groups.clone(),
            repos.posts.clone(),
            repos.posts_write.clone(),
            repos.comments.clone(),
            media.clone(),
        ));
        let cache = cache.map(CacheState::new);
        let auth = AuthState {
            users: repos.users.clone(),
            user_header: header::HeaderName::from_static(USER_HEADER),
            login_url: LOGIN_URL.to_string(),
        };

        let state = HttpState {
            feed,
            follows,
            posts,
            media: media.clone(),
            auth,
            cache: cache.clone(),
        };

        Self {
            router: build_router(state, MAX_REQUEST_BYTES),
            repos: store,
            cache,
            media,
            _media_dir: media_dir,
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.repos.create_user(username).await.expect("create user")
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.repos
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("About {title}"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        self.post_with_image(author, text, group, None).await
    }

    pub async fn post_with_image(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
        image: Option<&str>,
    ) -> PostRecord {
        self.repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: image.map(str::to_string),
            })
            .await
            .expect("create post")
    }

    pub async fn post_count(&self) -> u64 {
        self.repos
            .count_posts(&PostQueryFilter::default())
            .await
            .expect("count posts")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str, viewer: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(viewer) = viewer {
            builder = builder.header(USER_HEADER, viewer);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    /// GET and return the body, asserting a 200.
    pub async fn page(&self, uri: &str, viewer: Option<&str>) -> String {
        let response = self.get(uri, viewer).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body_text(response).await
    }

    pub async fn post_form(&self, uri: &str, viewer: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(viewer) = viewer {
            builder = builder.header(USER_HEADER, viewer);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        viewer: Option<&str>,
        parts: &[Part<'_>],
    ) -> Response<Body> {
        let (content_type, body) = multipart_body(parts);
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, content_type);
        if let Some(viewer) = viewer {
            builder = builder.header(USER_HEADER, viewer);
        }
        self.send(builder.body(Body::from(body)).expect("request"))
            .await
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

const BOUNDARY: &str = "quill-test-boundary";

fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

/// Number of rendered post cards on a page.
pub fn post_cards(html: &str) -> usize {
    html.matches("class=\"post\"").count()
}
