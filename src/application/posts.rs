//! Post and comment authoring.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::infra::media::{MediaStorage, MediaStorageError};

const SOURCE: &str = "application::posts";

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_IMAGE_MESSAGE: &str = "The submitted file is empty.";
pub const CONTRADICTORY_IMAGE_MESSAGE: &str =
    "Please either submit a file or check the clear checkbox, not both.";

/// Field-level validation messages keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

/// An uploaded image file, fully buffered.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// What an edit does to the existing image.
#[derive(Debug, Clone, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Clear,
    Replace(ImageUpload),
}

/// Submitted post form. `group` is the raw select value and `clear_image`
/// the clear checkbox as ticked, which may not accompany a new upload.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group: Option<String>,
    pub image: ImageChange,
    pub clear_image: bool,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post form is invalid")]
    Validation(FieldErrors),
    #[error("post not found")]
    NotFound,
    #[error("user {editor_id} may not modify post {post_id}")]
    Forbidden { post_id: i64, editor_id: i64 },
    #[error("media storage failed: {0}")]
    Media(#[from] MediaStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<MediaStorage>,
}

struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
    image: ImageChange,
}

impl PostService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<MediaStorage>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            posts_write,
            comments,
            media,
        }
    }

    /// Groups offered by the post form.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Load a post for editing by `editor_id`, addressed as `/{username}/{post_id}/`.
    pub async fn editable_post(
        &self,
        username: &str,
        post_id: i64,
        editor_id: i64,
    ) -> Result<PostRecord, PostError> {
        let post = self.owned_post(username, post_id).await?;
        ensure_author(&post, editor_id)?;
        Ok(post)
    }

    pub async fn create_post(
        &self,
        author_id: i64,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate(draft).await?;
        let stored_image = self.store_image(&validated.image).await?;

        let created = self
            .posts_write
            .create_post(CreatePostParams {
                author_id,
                text: validated.text,
                group_id: validated.group_id,
                image: stored_image.clone(),
            })
            .await;

        match created {
            Ok(post) => {
                info!(target = SOURCE, post_id = post.id, author_id, "post created");
                Ok(post)
            }
            Err(err) => {
                self.discard_image(stored_image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    /// Apply an edit. Only the author may edit; the creation time is kept and
    /// the previous image file is removed when it is replaced or cleared.
    pub async fn update_post(
        &self,
        username: &str,
        post_id: i64,
        editor_id: i64,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let existing = self.editable_post(username, post_id, editor_id).await?;
        let validated = self.validate(draft).await?;
        let stored_image = self.store_image(&validated.image).await?;

        let image = match &validated.image {
            ImageChange::Keep => existing.image.clone(),
            ImageChange::Clear => None,
            ImageChange::Replace(_) => stored_image.clone(),
        };

        let updated = match self
            .posts_write
            .update_post(UpdatePostParams {
                id: existing.id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await
        {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(stored_image.as_deref()).await;
                return Err(err.into());
            }
        };

        if existing.image != updated.image {
            self.discard_image(existing.image.as_deref()).await;
        }

        info!(target = SOURCE, post_id, editor_id, "post updated");
        Ok(updated)
    }

    /// Delete a post and its image. Only the author may delete.
    pub async fn delete_post(
        &self,
        username: &str,
        post_id: i64,
        editor_id: i64,
    ) -> Result<(), PostError> {
        let existing = self.editable_post(username, post_id, editor_id).await?;
        let removed = self.posts_write.delete_post(existing.id).await?;
        self.discard_image(removed.image.as_deref()).await;
        info!(target = SOURCE, post_id, editor_id, "post deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        username: &str,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.owned_post(username, post_id).await?;

        let text = text.trim();
        if text.is_empty() {
            let mut errors = FieldErrors::default();
            errors.add("text", REQUIRED_MESSAGE);
            return Err(PostError::Validation(errors));
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id,
                text: text.to_string(),
            })
            .await?;
        info!(target = SOURCE, post_id, author_id, "comment added");
        Ok(comment)
    }

    async fn owned_post(&self, username: &str, post_id: i64) -> Result<PostRecord, PostError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(PostError::NotFound)?;
        self.posts
            .find_post_by_id(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or(PostError::NotFound)
    }

    async fn validate(&self, draft: PostDraft) -> Result<ValidatedPost, PostError> {
        let mut errors = FieldErrors::default();

        let text = draft.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED_MESSAGE);
        }

        let group_id = match draft.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => match self.groups.find_group_by_id(id).await? {
                    Some(group) => Some(group.id),
                    None => {
                        errors.add("group", INVALID_GROUP_MESSAGE);
                        None
                    }
                },
                Err(_) => {
                    errors.add("group", INVALID_GROUP_MESSAGE);
                    None
                }
            },
        };

        if let ImageChange::Replace(upload) = &draft.image {
            if draft.clear_image {
                errors.add("image", CONTRADICTORY_IMAGE_MESSAGE);
            } else if upload.data.is_empty() {
                errors.add("image", EMPTY_IMAGE_MESSAGE);
            } else if imagesize::blob_size(&upload.data).is_err() {
                errors.add("image", INVALID_IMAGE_MESSAGE);
            }
        }

        if !errors.is_empty() {
            return Err(PostError::Validation(errors));
        }

        Ok(ValidatedPost {
            text,
            group_id,
            image: draft.image,
        })
    }

    async fn store_image(&self, change: &ImageChange) -> Result<Option<String>, PostError> {
        match change {
            ImageChange::Replace(upload) => {
                let stored = self
                    .media
                    .store_post_image(&upload.filename, upload.data.clone())
                    .await?;
                Ok(Some(stored.stored_path))
            }
            ImageChange::Keep | ImageChange::Clear => Ok(None),
        }
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        let Some(path) = stored_path else {
            return;
        };
        if let Err(err) = self.media.delete(path).await {
            warn!(target = SOURCE, path, error = %err, "failed to remove image file");
        }
    }
}

fn ensure_author(post: &PostRecord, editor_id: i64) -> Result<(), PostError> {
    if post.author_id == editor_id {
        Ok(())
    } else {
        Err(PostError::Forbidden {
            post_id: post.id,
            editor_id,
        })
    }
}
