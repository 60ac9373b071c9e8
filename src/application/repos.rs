//! Repository traits describing persistence adapters.
//!
//! Two adapters implement every trait: `infra::db::PostgresRepositories` and
//! `infra::memory::InMemoryRepositories`. Both apply the same referential
//! actions on delete:
//!
//! | relationship        | on delete of target |
//! |---------------------|---------------------|
//! | post → author       | cascade             |
//! | post → group        | set null            |
//! | comment → post      | cascade             |
//! | comment → author    | cascade             |
//! | follow → user       | cascade             |
//! | follow → author     | set null            |
//!
//! Follow edges are unique per `(user, author)` pair at the storage level.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    CommentListingRecord, CommentRecord, GroupRecord, PostListingRecord, PostRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate {key}")]
    Duplicate { key: UniqueKey },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(key: UniqueKey) -> Self {
        Self::Duplicate { key }
    }
}

/// Unique constraints declared in `migrations/`. Both adapters report
/// violations in these terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueKey {
    Username,
    GroupTitle,
    GroupSlug,
    Follow,
    Other(String),
}

impl UniqueKey {
    pub fn from_constraint(name: &str) -> Self {
        match name {
            "users_username_key" => Self::Username,
            "groups_title_key" => Self::GroupTitle,
            "groups_slug_key" => Self::GroupSlug,
            "follows_user_author_key" => Self::Follow,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn constraint(&self) -> &str {
        match self {
            Self::Username => "users_username_key",
            Self::GroupTitle => "groups_title_key",
            Self::GroupSlug => "groups_slug_key",
            Self::Follow => "follows_user_author_key",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username => f.write_str("username"),
            Self::GroupTitle => f.write_str("group title"),
            Self::GroupSlug => f.write_str("group slug"),
            Self::Follow => f.write_str("follow edge"),
            Self::Other(name) => write!(f, "record (`{name}`)"),
        }
    }
}

/// Post selection applied by [`PostsRepo`]. Every populated field narrows the
/// result; an empty filter selects every post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQueryFilter {
    pub group_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Restrict to posts written by any of these authors. `Some(vec![])`
    /// matches nothing.
    pub author_ids: Option<Vec<i64>>,
}

impl PostQueryFilter {
    pub fn matches(&self, post: &PostRecord) -> bool {
        if let Some(group_id) = self.group_id
            && post.group_id != Some(group_id)
        {
            return false;
        }
        if let Some(author_id) = self.author_id
            && post.author_id != author_id
        {
            return false;
        }
        if let Some(author_ids) = self.author_ids.as_ref()
            && !author_ids.contains(&post.author_id)
        {
            return false;
        }
        true
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.author_ids.as_ref().is_some_and(Vec::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

/// Result of removing a user: the image paths of the posts removed with them,
/// so the caller can delete the files.
#[derive(Debug, Clone, Default)]
pub struct DeletedUser {
    pub removed_post_images: Vec<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait UsersWriteRepo: Send + Sync {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError>;

    async fn delete_user(&self, id: i64) -> Result<DeletedUser, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError>;

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsWriteRepo: Send + Sync {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;

    async fn delete_group(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    /// Posts matching `filter`, newest first (`created_at DESC, id DESC`).
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostListingRecord>, RepoError>;

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Replace the editable fields and bump `updated_at`. `created_at` and
    /// the author are left untouched.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Remove the post and its comments, returning the removed record.
    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Comments under a post, oldest first.
    async fn list_comments_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentListingRecord>, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Insert the edge unless it already exists. Returns `true` when a row
    /// was created.
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Delete the edge, returning the number of removed rows.
    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError>;

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Authors followed by `user_id`. Orphaned edges are skipped.
    async fn followed_author_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError>;

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError>;
}

/// One store seen through every repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UsersRepo>,
    pub users_write: Arc<dyn UsersWriteRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub groups_write: Arc<dyn GroupsWriteRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub posts_write: Arc<dyn PostsWriteRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub follows: Arc<dyn FollowsRepo>,
}

impl Repositories {
    pub fn from_store<R>(store: Arc<R>) -> Self
    where
        R: UsersRepo
            + UsersWriteRepo
            + GroupsRepo
            + GroupsWriteRepo
            + PostsRepo
            + PostsWriteRepo
            + CommentsRepo
            + FollowsRepo
            + 'static,
    {
        Self {
            users: store.clone(),
            users_write: store.clone(),
            groups: store.clone(),
            groups_write: store.clone(),
            posts: store.clone(),
            posts_write: store.clone(),
            comments: store.clone(),
            follows: store,
        }
    }
}
