//! In-process repository adapter.
//!
//! Used when no database URL is configured and by tests. Every table lives in
//! a single [`RwLock`]-guarded state so multi-row changes (cascades, unique
//! checks) are applied atomically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, DeletedUser,
    FollowsRepo, GroupsRepo, GroupsWriteRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
    RepoError, UniqueKey, UpdatePostParams, UsersRepo, UsersWriteRepo,
};
use crate::domain::entities::{
    CommentListingRecord, CommentRecord, FollowRecord, GroupRecord, GroupRef, PostListingRecord,
    PostRecord, UserRecord,
};

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    follows: BTreeMap<i64, FollowRecord>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, user_id: i64) -> String {
        self.users
            .get(&user_id)
            .map(|user| user.username.clone())
            .unwrap_or_default()
    }

    fn listing(&self, post: &PostRecord) -> PostListingRecord {
        PostListingRecord {
            post: post.clone(),
            author_username: self.username(post.author_id),
            group: post
                .group_id
                .and_then(|id| self.groups.get(&id))
                .map(|group| GroupRef {
                    title: group.title.clone(),
                    slug: group.slug.clone(),
                }),
        }
    }

    /// Matching posts, newest first.
    fn ordered_posts<'a>(&'a self, filter: &'a PostQueryFilter) -> Vec<&'a PostRecord> {
        let mut posts: Vec<&PostRecord> = self
            .posts
            .values()
            .filter(|post| filter.matches(post))
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }

    fn remove_post(&mut self, post_id: i64) -> Option<PostRecord> {
        let removed = self.posts.remove(&post_id)?;
        self.comments.retain(|_, comment| comment.post_id != post_id);
        Some(removed)
    }
}

/// Thread-safe in-memory implementation of every repository trait.
#[derive(Default)]
pub struct InMemoryRepositories {
    state: RwLock<State>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn missing_reference(entity: &str, id: i64) -> RepoError {
    RepoError::InvalidInput {
        message: format!("{entity} {id} does not exist"),
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl UsersWriteRepo for InMemoryRepositories {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|user| user.username == username) {
            return Err(RepoError::duplicate(UniqueKey::Username));
        }
        let user = UserRecord {
            id: state.allocate_id(),
            username: username.to_string(),
            created_at: now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<DeletedUser, RepoError> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let owned: Vec<i64> = state
            .posts
            .values()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        let mut removed_post_images = Vec::new();
        for post_id in owned {
            if let Some(post) = state.remove_post(post_id)
                && let Some(image) = post.image
            {
                removed_post_images.push(image);
            }
        }

        state.comments.retain(|_, comment| comment.author_id != id);
        state.follows.retain(|_, follow| follow.user_id != id);
        for follow in state.follows.values_mut() {
            if follow.author_id == Some(id) {
                follow.author_id = None;
            }
        }

        Ok(DeletedUser {
            removed_post_images,
        })
    }
}

#[async_trait]
impl GroupsRepo for InMemoryRepositories {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        let mut groups: Vec<GroupRecord> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }
}

#[async_trait]
impl GroupsWriteRepo for InMemoryRepositories {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|group| group.title == params.title) {
            return Err(RepoError::duplicate(UniqueKey::GroupTitle));
        }
        if state.groups.values().any(|group| group.slug == params.slug) {
            return Err(RepoError::duplicate(UniqueKey::GroupSlug));
        }
        let group = GroupRecord {
            id: state.allocate_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.groups.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for post in state.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.values().filter(|post| filter.matches(post)).count() as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostListingRecord>, RepoError> {
        let state = self.state.read().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(state
            .ordered_posts(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| state.listing(post))
            .collect())
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&params.author_id) {
            return Err(missing_reference("user", params.author_id));
        }
        if let Some(group_id) = params.group_id
            && !state.groups.contains_key(&group_id)
        {
            return Err(missing_reference("group", group_id));
        }

        let created_at = now();
        let post = PostRecord {
            id: state.allocate_id(),
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
            created_at,
            updated_at: created_at,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        if let Some(group_id) = params.group_id
            && !state.groups.contains_key(&group_id)
        {
            return Err(missing_reference("group", group_id));
        }
        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        post.updated_at = now().max(post.updated_at);
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.remove_post(id).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&params.post_id) {
            return Err(missing_reference("post", params.post_id));
        }
        if !state.users.contains_key(&params.author_id) {
            return Err(missing_reference("user", params.author_id));
        }
        let comment = CommentRecord {
            id: state.allocate_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: now(),
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentListingRecord>, RepoError> {
        let state = self.state.read().await;
        let mut comments: Vec<&CommentRecord> = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(comments
            .into_iter()
            .map(|comment| CommentListingRecord {
                comment: comment.clone(),
                author_username: state.username(comment.author_id),
            })
            .collect())
    }
}

#[async_trait]
impl FollowsRepo for InMemoryRepositories {
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(missing_reference("user", user_id));
        }
        if !state.users.contains_key(&author_id) {
            return Err(missing_reference("user", author_id));
        }
        let exists = state
            .follows
            .values()
            .any(|follow| follow.user_id == user_id && follow.author_id == Some(author_id));
        if exists {
            return Ok(false);
        }
        let follow = FollowRecord {
            id: state.allocate_id(),
            user_id,
            author_id: Some(author_id),
            created_at: now(),
        };
        state.follows.insert(follow.id, follow);
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|_, follow| !(follow.user_id == user_id && follow.author_id == Some(author_id)));
        Ok((before - state.follows.len()) as u64)
    }

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .any(|follow| follow.user_id == user_id && follow.author_id == Some(author_id)))
    }

    async fn followed_author_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .filter(|follow| follow.user_id == user_id)
            .filter_map(|follow| follow.author_id)
            .collect())
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .filter(|follow| follow.author_id == Some(author_id))
            .count() as u64)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .filter(|follow| follow.user_id == user_id && follow.author_id.is_some())
            .count() as u64)
    }
}
