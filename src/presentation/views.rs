use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{FeedContext, PostDetail};
use crate::application::follows::FollowCounts;
use crate::application::pagination::Page;
use crate::application::posts::FieldErrors;
use crate::domain::entities::{
    CommentListingRecord, GroupRecord, PostListingRecord, PostRecord, UserRecord,
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const PUBLISHED_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome, path: &str) -> Response {
    let content = ErrorPageView::not_found(path);
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Page-independent layout data: who is signed in.
#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub viewer: Option<String>,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&str>) -> Self {
        Self {
            viewer: viewer.map(str::to_string),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            viewer: chrome.viewer,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupLink {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub image_url: Option<String>,
    pub group: Option<GroupLink>,
    pub published: String,
    pub iso_date: String,
    pub href: String,
    pub edit_href: Option<String>,
}

impl PostCard {
    /// `viewer` decides whether the edit link is shown.
    pub fn from_listing(listing: PostListingRecord, viewer: Option<&str>) -> Self {
        let PostListingRecord {
            post,
            author_username,
            group,
        } = listing;
        let href = post_href(&author_username, post.id);
        let edit_href = (viewer == Some(author_username.as_str())).then(|| format!("{href}edit/"));

        Self {
            id: post.id,
            author_href: profile_href(&author_username),
            author: author_username,
            text: post.text,
            image_url: post.image.as_deref().map(media_url),
            group: group.map(|group| GroupLink {
                href: group_href(&group.slug),
                title: group.title,
            }),
            published: format_published(post.created_at),
            iso_date: format_iso(post.created_at),
            href,
            edit_href,
        }
    }
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            total_count: page.total_count,
            previous_href: page.previous_number().map(page_href),
            next_href: page.next_number().map(page_href),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

/// Index, group and follow feeds.
#[derive(Clone)]
pub struct FeedView {
    pub heading: String,
    pub description: Option<String>,
    pub empty_message: &'static str,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl FeedView {
    pub fn new(context: &FeedContext, page: Page<PostListingRecord>, viewer: Option<&str>) -> Self {
        let paginator = PaginatorView::from_page(&page);
        let posts = page
            .items
            .into_iter()
            .map(|listing| PostCard::from_listing(listing, viewer))
            .collect();

        let (heading, description, empty_message) = match context {
            FeedContext::All => ("Latest posts".to_string(), None, "No posts yet."),
            FeedContext::Group(group) => (
                group.title.clone(),
                Some(group.description.clone()).filter(|text| !text.is_empty()),
                "This group has no posts yet.",
            ),
            FeedContext::Author(author) => (
                format!("Posts by {}", author.username),
                None,
                "No posts yet.",
            ),
            FeedContext::Follow => (
                "Following".to_string(),
                None,
                "Authors you follow have not posted yet.",
            ),
        };

        Self {
            heading,
            description,
            empty_message,
            posts,
            paginator,
        }
    }
}

#[derive(Clone)]
pub struct FollowButtonView {
    pub href: String,
    pub label: &'static str,
    pub following: bool,
}

#[derive(Clone)]
pub struct AuthorSummaryView {
    pub username: String,
    pub href: String,
    pub post_count: u64,
    pub followers: u64,
    pub following: u64,
}

#[derive(Clone)]
pub struct ProfileView {
    pub author: AuthorSummaryView,
    /// `None` for anonymous viewers and on your own profile.
    pub follow_button: Option<FollowButtonView>,
    pub feed: FeedView,
}

impl ProfileView {
    pub fn new(
        author: &UserRecord,
        counts: FollowCounts,
        following: Option<bool>,
        feed: FeedView,
    ) -> Self {
        let follow_button = following.map(|following| {
            let base = profile_href(&author.username);
            if following {
                FollowButtonView {
                    href: format!("{base}unfollow/"),
                    label: "Unfollow",
                    following,
                }
            } else {
                FollowButtonView {
                    href: format!("{base}follow/"),
                    label: "Follow",
                    following,
                }
            }
        });

        Self {
            author: AuthorSummaryView {
                username: author.username.clone(),
                href: profile_href(&author.username),
                post_count: feed.paginator.total_count,
                followers: counts.followers,
                following: counts.following,
            },
            follow_button,
            feed,
        }
    }
}

#[derive(Clone)]
pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<CommentListingRecord> for CommentView {
    fn from(listing: CommentListingRecord) -> Self {
        Self {
            author_href: profile_href(&listing.author_username),
            author: listing.author_username,
            text: listing.comment.text,
            published: format_published(listing.comment.created_at),
        }
    }
}

#[derive(Clone, Default)]
pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct PostDetailView {
    pub post: PostCard,
    pub author: AuthorSummaryView,
    pub comments: Vec<CommentView>,
    /// Only shown to signed-in viewers.
    pub comment_form: Option<CommentFormView>,
    pub delete_action: Option<String>,
}

impl PostDetailView {
    pub fn new(detail: PostDetail, counts: FollowCounts, viewer: Option<&str>) -> Self {
        let PostDetail {
            post,
            author,
            author_post_count,
            comments,
        } = detail;
        let card = PostCard::from_listing(post, viewer);
        let comment_form = viewer.map(|_| CommentFormView {
            action: format!("{}comment", card.href),
            ..CommentFormView::default()
        });
        let delete_action = card
            .edit_href
            .as_ref()
            .map(|_| format!("{}delete/", card.href));

        Self {
            author: AuthorSummaryView {
                href: profile_href(&author.username),
                username: author.username,
                post_count: author_post_count,
                followers: counts.followers,
                following: counts.following,
            },
            comments: comments.into_iter().map(CommentView::from).collect(),
            post: card,
            comment_form,
            delete_action,
        }
    }

    /// Re-show a rejected comment with its messages.
    pub fn with_comment_errors(mut self, text: &str, errors: &FieldErrors) -> Self {
        if let Some(form) = self.comment_form.as_mut() {
            form.text = text.to_string();
            form.errors = errors.get("text").to_vec();
        }
        self
    }
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone)]
pub struct PostFormView {
    pub is_new: bool,
    pub action: String,
    pub cancel_href: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn new_post(groups: Vec<GroupRecord>) -> Self {
        Self {
            is_new: true,
            action: "/new/".to_string(),
            cancel_href: "/".to_string(),
            text: String::new(),
            groups: group_options(groups, None),
            current_image: None,
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
        }
    }

    pub fn edit_post(username: &str, post: &PostRecord, groups: Vec<GroupRecord>) -> Self {
        let href = post_href(username, post.id);
        Self {
            is_new: false,
            action: format!("{href}edit/"),
            cancel_href: href,
            text: post.text.clone(),
            groups: group_options(groups, post.group_id),
            current_image: post.image.as_deref().map(media_url),
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
        }
    }

    /// Refill the form from a rejected submission.
    pub fn with_submission(mut self, text: &str, group: Option<&str>, errors: &FieldErrors) -> Self {
        self.text = text.to_string();
        let selected = group.and_then(|raw| raw.trim().parse::<i64>().ok());
        for option in &mut self.groups {
            option.selected = Some(option.id) == selected;
        }
        self.text_errors = errors.get("text").to_vec();
        self.group_errors = errors.get("group").to_vec();
        self.image_errors = errors.get("image").to_vec();
        self
    }
}

#[derive(Clone)]
pub struct ErrorPageView {
    pub status: u16,
    pub title: &'static str,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found(path: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND.as_u16(),
            title: "Page not found",
            message: format!("Nothing lives at {path}."),
        }
    }
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub view: LayoutContext<FeedView>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/{username}/")
}

pub fn post_href(username: &str, post_id: i64) -> String {
    format!("/{username}/{post_id}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

fn group_options(groups: Vec<GroupRecord>, selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .into_iter()
        .map(|group| GroupOption {
            selected: Some(group.id) == selected,
            id: group.id,
            title: group.title,
        })
        .collect()
}

fn format_published(at: OffsetDateTime) -> String {
    at.format(PUBLISHED_FORMAT)
        .unwrap_or_else(|_| at.date().to_string())
}

fn format_iso(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
