//! Feed resolution: which posts a view shows, in which order, on which page.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::application::follows::{FollowError, FollowService};
use crate::application::pagination::{PAGE_SIZE, Page, PageNumber, Paginator};
use crate::application::repos::{
    CommentsRepo, GroupsRepo, PostQueryFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{
    CommentListingRecord, GroupRecord, GroupRef, PostListingRecord, UserRecord,
};

/// View selector for a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Group(String),
    Author(String),
    FollowedBy(i64),
}

/// Entity a resolved feed belongs to, used for page headings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedContext {
    All,
    Group(GroupRecord),
    Author(UserRecord),
    Follow,
}

#[derive(Debug, Clone)]
pub struct ResolvedFeed {
    pub context: FeedContext,
    pub filter: PostQueryFilter,
}

#[derive(Debug, Clone)]
pub struct FeedPage {
    pub context: FeedContext,
    pub page: Page<PostListingRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostListingRecord,
    pub author: UserRecord,
    pub author_post_count: u64,
    pub comments: Vec<CommentListingRecord>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Follow(#[from] FollowError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl FeedError {
    fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

#[derive(Clone)]
pub struct FeedService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: FollowService,
}

impl FeedService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: FollowService,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            comments,
            follows,
        }
    }

    /// Turn a view selector into a post filter. Unknown group slugs and
    /// usernames are reported as `NotFound`.
    pub async fn resolve(&self, scope: &FeedScope) -> Result<ResolvedFeed, FeedError> {
        match scope {
            FeedScope::All => Ok(ResolvedFeed {
                context: FeedContext::All,
                filter: PostQueryFilter::default(),
            }),
            FeedScope::Group(slug) => {
                let group = self
                    .groups
                    .find_group_by_slug(slug)
                    .await?
                    .ok_or_else(|| FeedError::not_found("group"))?;
                Ok(ResolvedFeed {
                    filter: PostQueryFilter {
                        group_id: Some(group.id),
                        ..PostQueryFilter::default()
                    },
                    context: FeedContext::Group(group),
                })
            }
            FeedScope::Author(username) => {
                let author = self
                    .users
                    .find_user_by_username(username)
                    .await?
                    .ok_or_else(|| FeedError::not_found("author"))?;
                Ok(ResolvedFeed {
                    filter: PostQueryFilter {
                        author_id: Some(author.id),
                        ..PostQueryFilter::default()
                    },
                    context: FeedContext::Author(author),
                })
            }
            FeedScope::FollowedBy(user_id) => {
                let authors = self.follows.followed_authors(*user_id).await?;
                Ok(ResolvedFeed {
                    context: FeedContext::Follow,
                    filter: PostQueryFilter {
                        author_ids: Some(authors.into_iter().collect()),
                        ..PostQueryFilter::default()
                    },
                })
            }
        }
    }

    /// One page of the feed, newest first. The total is counted once and the
    /// repository loads only the selected window.
    #[instrument(skip(self, page), fields(page = page.get()))]
    pub async fn page(&self, scope: &FeedScope, page: PageNumber) -> Result<FeedPage, FeedError> {
        let ResolvedFeed { context, filter } = self.resolve(scope).await?;

        if filter.is_unsatisfiable() {
            return Ok(FeedPage {
                context,
                page: Page::empty(),
            });
        }

        let total = self.posts.count_posts(&filter).await?;
        let window = Paginator::new(total, PAGE_SIZE).window(page);
        let items = if window.limit == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(&filter, window.offset, window.limit)
                .await?
        };

        Ok(FeedPage {
            context,
            page: Page::from_window(window, items),
        })
    }

    /// A single post with its comments. The post must belong to `username`.
    pub async fn post_detail(&self, username: &str, post_id: i64) -> Result<PostDetail, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FeedError::not_found("author"))?;
        let post = self
            .posts
            .find_post_by_id(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or_else(|| FeedError::not_found("post"))?;

        let group = match post.group_id {
            Some(group_id) => self
                .groups
                .find_group_by_id(group_id)
                .await?
                .map(|group| GroupRef {
                    title: group.title,
                    slug: group.slug,
                }),
            None => None,
        };

        let author_post_count = self
            .posts
            .count_posts(&PostQueryFilter {
                author_id: Some(author.id),
                ..PostQueryFilter::default()
            })
            .await?;
        let comments = self.comments.list_comments_for_post(post.id).await?;

        Ok(PostDetail {
            post: PostListingRecord {
                post,
                author_username: author.username.clone(),
                group,
            },
            author,
            author_post_count,
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{
        CreateGroupParams, CreatePostParams, GroupsWriteRepo, PostsWriteRepo, UsersWriteRepo,
    };
    use crate::infra::memory::InMemoryRepositories;

    struct Fixture {
        repos: Arc<InMemoryRepositories>,
        feed: FeedService,
        follows: FollowService,
    }

    fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositories::new());
        let follows = FollowService::new(repos.clone());
        let feed = FeedService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            follows.clone(),
        );
        Fixture {
            repos,
            feed,
            follows,
        }
    }

    async fn post(repos: &InMemoryRepositories, author_id: i64, group_id: Option<i64>, text: &str) -> i64 {
        repos
            .create_post(CreatePostParams {
                author_id,
                text: text.to_string(),
                group_id,
                image: None,
            })
            .await
            .expect("post")
            .id
    }

    /// Walk `page` until the last one, concatenating the items.
    async fn every_page(
        feed: &FeedService,
        scope: &FeedScope,
    ) -> Result<Vec<PostListingRecord>, FeedError> {
        let mut items = Vec::new();
        let mut number = PageNumber::FIRST;
        loop {
            let FeedPage { page, .. } = feed.page(scope, number).await?;
            let next = page.next_number();
            items.extend(page.items);
            match next {
                Some(next) => number = PageNumber::new(next),
                None => return Ok(items),
            }
        }
    }

    #[tokio::test]
    async fn group_scope_only_returns_group_posts() {
        let Fixture { repos, feed, .. } = fixture();
        let author = repos.create_user("leo").await.expect("user");
        let cats = repos
            .create_group(CreateGroupParams {
                title: "Cats".into(),
                slug: "cats".into(),
                description: String::new(),
            })
            .await
            .expect("group");
        post(&repos, author.id, Some(cats.id), "in cats").await;
        post(&repos, author.id, None, "no group").await;

        let posts = every_page(&feed, &FeedScope::Group("cats".into()))
            .await
            .expect("group feed");
        assert_eq!(posts.len(), 1);
        assert!(posts.iter().all(|item| item.post.group_id == Some(cats.id)));

        assert!(matches!(
            every_page(&feed, &FeedScope::Group("dogs".into())).await,
            Err(FeedError::NotFound { entity: "group" })
        ));
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let Fixture { feed, .. } = fixture();
        assert!(matches!(
            feed.page(&FeedScope::Author("ghost".into()), PageNumber::FIRST)
                .await,
            Err(FeedError::NotFound { entity: "author" })
        ));
    }

    #[tokio::test]
    async fn feed_is_newest_first_without_duplicates() {
        let Fixture { repos, feed, .. } = fixture();
        let author = repos.create_user("leo").await.expect("user");
        let mut ids = Vec::new();
        for index in 0..25 {
            ids.push(post(&repos, author.id, None, &format!("post {index}")).await);
        }

        let first = feed.page(&FeedScope::All, PageNumber::FIRST).await.expect("page 1");
        let third = feed.page(&FeedScope::All, PageNumber::new(3)).await.expect("page 3");

        assert_eq!(first.page.total_count, 25);
        assert_eq!(first.page.items.len(), 10);
        assert_eq!(first.page.items[0].post.id, *ids.last().expect("ids"));
        assert_eq!(third.page.items.len(), 5);
        assert_eq!(third.page.items[4].post.id, ids[0]);

        let all = every_page(&feed, &FeedScope::All).await.expect("all");
        let mut seen: Vec<i64> = all.iter().map(|item| item.post.id).collect();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn follow_feed_tracks_the_graph() {
        let Fixture {
            repos,
            feed,
            follows,
        } = fixture();
        let reader = repos.create_user("reader").await.expect("user");
        let writer = repos.create_user("writer").await.expect("user");
        let stranger = repos.create_user("stranger").await.expect("user");

        let empty = feed
            .page(&FeedScope::FollowedBy(reader.id), PageNumber::FIRST)
            .await
            .expect("empty follow feed");
        assert_eq!(empty.page.total_count, 0);

        follows.follow(reader.id, writer.id).await.expect("follow");
        post(&repos, writer.id, None, "hello followers").await;
        post(&repos, stranger.id, None, "not followed").await;

        let reader_feed = feed
            .page(&FeedScope::FollowedBy(reader.id), PageNumber::FIRST)
            .await
            .expect("follow feed");
        assert_eq!(reader_feed.page.total_count, 1);
        assert_eq!(reader_feed.page.items[0].author_username, "writer");

        let stranger_feed = feed
            .page(&FeedScope::FollowedBy(stranger.id), PageNumber::FIRST)
            .await
            .expect("follow feed");
        assert_eq!(stranger_feed.page.total_count, 0);
    }

    #[tokio::test]
    async fn post_detail_requires_matching_author() {
        let Fixture { repos, feed, .. } = fixture();
        let leo = repos.create_user("leo").await.expect("user");
        repos.create_user("mia").await.expect("user");
        let id = post(&repos, leo.id, None, "mine").await;

        let detail = feed.post_detail("leo", id).await.expect("detail");
        assert_eq!(detail.post.post.text, "mine");
        assert_eq!(detail.author_post_count, 1);

        assert!(matches!(
            feed.post_detail("mia", id).await,
            Err(FeedError::NotFound { entity: "post" })
        ));
        assert!(matches!(
            feed.post_detail("leo", id + 100).await,
            Err(FeedError::NotFound { entity: "post" })
        ));
    }
}
