use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRef, PostListingRecord, PostRecord};

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str = "id, text, author_id, group_id, image, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostListingRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_username: String,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostListingRow> for PostListingRecord {
    fn from(row: PostListingRow) -> Self {
        let group = match (row.group_title, row.group_slug) {
            (Some(title), Some(slug)) => Some(GroupRef { title, slug }),
            _ => None,
        };
        Self {
            post: row.post.into(),
            author_username: row.author_username,
            group,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostListingRecord>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.text, p.author_id, p.group_id, p.image, p.created_at, p.updated_at, \
             u.username AS author_username, g.title AS group_title, g.slug AS group_slug \
             FROM posts p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id \
             WHERE 1=1 ",
        );
        Self::apply_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(Self::convert_window(limit));
        qb.push(" OFFSET ");
        qb.push_bind(Self::convert_window(offset));

        let rows: Vec<PostListingRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostListingRecord::from).collect())
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            text,
            group_id,
            image,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (text, author_id, group_id, image) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(text)
        .bind(author_id)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts \
             SET text = $2, group_id = $3, image = $4, updated_at = GREATEST(now(), updated_at) \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(text)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
