//! User and group provisioning used by the command-line tools.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError, UniqueKey, UsersRepo,
    UsersWriteRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, generate_unique_slug_async};
use crate::domain::types::{GroupSlug, Username, validate_group_title};
use crate::infra::media::MediaStorage;

const SOURCE: &str = "application::accounts";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{key}` already exists")]
    AlreadyExists { entity: &'static str, key: String },
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("failed to derive group slug: {0}")]
    Slug(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    groups_write: Arc<dyn GroupsWriteRepo>,
    media: Arc<MediaStorage>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_write: Arc<dyn UsersWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        groups_write: Arc<dyn GroupsWriteRepo>,
        media: Arc<MediaStorage>,
    ) -> Self {
        Self {
            users,
            users_write,
            groups,
            groups_write,
            media,
        }
    }

    pub async fn create_user(&self, raw_username: &str) -> Result<UserRecord, AccountError> {
        let username = Username::parse(raw_username)?;
        match self.users_write.create_user(username.as_str()).await {
            Ok(user) => {
                info!(target = SOURCE, user_id = user.id, username = %username, "user created");
                Ok(user)
            }
            Err(RepoError::Duplicate {
                key: UniqueKey::Username,
            }) => Err(AccountError::AlreadyExists {
                entity: "user",
                key: username.into_inner(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a user together with everything they own. Image files of the
    /// removed posts are deleted afterwards.
    pub async fn delete_user(&self, username: &str) -> Result<(), AccountError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AccountError::NotFound {
                entity: "user",
                key: username.to_string(),
            })?;

        let deleted = self.users_write.delete_user(user.id).await?;
        for path in &deleted.removed_post_images {
            if let Err(err) = self.media.delete(path).await {
                warn!(target = SOURCE, path, error = %err, "failed to remove image file");
            }
        }

        info!(
            target = SOURCE,
            user_id = user.id,
            removed_images = deleted.removed_post_images.len(),
            "user deleted"
        );
        Ok(())
    }

    /// Create a group. Without an explicit slug one is derived from the title.
    pub async fn create_group(&self, new_group: NewGroup) -> Result<GroupRecord, AccountError> {
        let title = validate_group_title(&new_group.title)?;
        let slug = match new_group.slug.as_deref() {
            Some(raw) => GroupSlug::parse(raw)?.into_inner(),
            None => self.derive_group_slug(&title).await?,
        };

        let params = CreateGroupParams {
            title: title.clone(),
            slug: slug.clone(),
            description: new_group.description.trim().to_string(),
        };
        match self.groups_write.create_group(params).await {
            Ok(group) => {
                info!(target = SOURCE, group_id = group.id, slug = %group.slug, "group created");
                Ok(group)
            }
            Err(RepoError::Duplicate {
                key: UniqueKey::GroupTitle,
            }) => Err(AccountError::AlreadyExists {
                entity: "group title",
                key: title,
            }),
            Err(RepoError::Duplicate {
                key: UniqueKey::GroupSlug,
            }) => Err(AccountError::AlreadyExists {
                entity: "group slug",
                key: slug,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a group. Its posts survive without a group.
    pub async fn delete_group(&self, slug: &str) -> Result<(), AccountError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| AccountError::NotFound {
                entity: "group",
                key: slug.to_string(),
            })?;
        self.groups_write.delete_group(group.id).await?;
        info!(target = SOURCE, group_id = group.id, "group deleted");
        Ok(())
    }

    async fn derive_group_slug(&self, title: &str) -> Result<String, AccountError> {
        let groups = self.groups.clone();
        generate_unique_slug_async(title, |candidate| {
            let groups = groups.clone();
            let candidate = candidate.to_string();
            async move {
                groups
                    .find_group_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Predicate(repo) => AccountError::Repo(repo),
            SlugAsyncError::Slug(slug) => AccountError::Slug(slug.to_string()),
        })
    }
}
