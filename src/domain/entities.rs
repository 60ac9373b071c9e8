//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post as stored. `created_at` never changes after insert; `updated_at`
/// moves on every edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Group fields needed when a post is listed outside its group page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub title: String,
    pub slug: String,
}

/// A post joined with the author and group it is displayed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostListingRecord {
    pub post: PostRecord,
    pub author_username: String,
    pub group: Option<GroupRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentListingRecord {
    pub comment: CommentRecord,
    pub author_username: String,
}

/// A follow edge. `author_id` becomes `None` once the followed author is
/// deleted; such edges are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowRecord {
    pub id: i64,
    pub user_id: i64,
    pub author_id: Option<i64>,
    pub created_at: OffsetDateTime,
}
