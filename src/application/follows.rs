//! Follow graph: who receives whose posts in their follow feed.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UniqueKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("follow edge not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
}

/// Follower/following counters shown on a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>) -> Self {
        Self { follows }
    }

    /// Create the `user -> author` edge. Following yourself and repeating an
    /// existing follow are no-ops. Concurrent duplicates collapse onto the
    /// store's unique constraint, so at most one edge exists.
    pub async fn follow(&self, user_id: i64, author_id: i64) -> Result<FollowOutcome, FollowError> {
        if user_id == author_id {
            debug!(user_id, "ignoring self-follow");
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = match self.follows.insert_follow(user_id, author_id).await {
            Ok(created) => created,
            Err(RepoError::Duplicate {
                key: UniqueKey::Follow,
            }) => false,
            Err(err) => return Err(err.into()),
        };
        let outcome = if created {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };
        debug!(user_id, author_id, ?outcome, "follow processed");
        Ok(outcome)
    }

    /// Remove the `user -> author` edge. Removing an edge that does not exist
    /// is an error.
    pub async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<(), FollowError> {
        match self.follows.delete_follow(user_id, author_id).await? {
            0 => Err(FollowError::NotFound),
            _ => Ok(()),
        }
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, FollowError> {
        Ok(self.follows.follow_exists(user_id, author_id).await?)
    }

    pub async fn followed_authors(&self, user_id: i64) -> Result<BTreeSet<i64>, FollowError> {
        Ok(self
            .follows
            .followed_author_ids(user_id)
            .await?
            .into_iter()
            .collect())
    }

    pub async fn counts(&self, user_id: i64) -> Result<FollowCounts, FollowError> {
        Ok(FollowCounts {
            followers: self.follows.count_followers(user_id).await?,
            following: self.follows.count_following(user_id).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::UsersWriteRepo;
    use crate::infra::memory::InMemoryRepositories;

    async fn service_with_users() -> (FollowService, i64, i64, i64) {
        let repos = Arc::new(InMemoryRepositories::new());
        let alice = repos.create_user("alice").await.expect("user").id;
        let bob = repos.create_user("bob").await.expect("user").id;
        let carol = repos.create_user("carol").await.expect("user").id;
        (FollowService::new(repos), alice, bob, carol)
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let (service, alice, bob, _) = service_with_users().await;

        assert_eq!(
            service.follow(alice, bob).await.expect("follow"),
            FollowOutcome::Created
        );
        assert_eq!(
            service.follow(alice, bob).await.expect("follow again"),
            FollowOutcome::AlreadyFollowing
        );
        assert!(service.is_following(alice, bob).await.expect("lookup"));
        assert_eq!(
            service.followed_authors(alice).await.expect("authors"),
            BTreeSet::from([bob])
        );
    }

    #[tokio::test]
    async fn self_follow_is_a_noop() {
        let (service, alice, _, _) = service_with_users().await;

        assert_eq!(
            service.follow(alice, alice).await.expect("self follow"),
            FollowOutcome::SelfFollow
        );
        assert!(!service.is_following(alice, alice).await.expect("lookup"));
        assert!(service.followed_authors(alice).await.expect("authors").is_empty());
    }

    #[tokio::test]
    async fn unfollow_of_missing_edge_is_not_found() {
        let (service, alice, bob, carol) = service_with_users().await;
        service.follow(alice, bob).await.expect("follow");

        service.unfollow(alice, bob).await.expect("unfollow");
        assert!(matches!(
            service.unfollow(alice, bob).await,
            Err(FollowError::NotFound)
        ));
        assert!(matches!(
            service.unfollow(alice, carol).await,
            Err(FollowError::NotFound)
        ));
    }

    #[tokio::test]
    async fn counts_track_both_directions() {
        let (service, alice, bob, carol) = service_with_users().await;
        service.follow(alice, bob).await.expect("follow");
        service.follow(carol, bob).await.expect("follow");
        service.follow(bob, alice).await.expect("follow");

        let bob_counts = service.counts(bob).await.expect("counts");
        assert_eq!(bob_counts.followers, 2);
        assert_eq!(bob_counts.following, 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_follows_leave_one_edge() {
        let (service, alice, bob, _) = service_with_users().await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.follow(alice, bob).await })
            })
            .collect();
        let mut created = 0;
        for handle in attempts {
            if handle.await.expect("join").expect("follow") == FollowOutcome::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(service.counts(bob).await.expect("counts").followers, 1);
    }

    /// Store that reports the unique `(user, author)` constraint on insert.
    struct ConflictingFollows;

    #[async_trait::async_trait]
    impl FollowsRepo for ConflictingFollows {
        async fn insert_follow(&self, _user_id: i64, _author_id: i64) -> Result<bool, RepoError> {
            Err(RepoError::duplicate(UniqueKey::Follow))
        }

        async fn delete_follow(&self, _user_id: i64, _author_id: i64) -> Result<u64, RepoError> {
            Ok(0)
        }

        async fn follow_exists(&self, _user_id: i64, _author_id: i64) -> Result<bool, RepoError> {
            Ok(true)
        }

        async fn followed_author_ids(&self, _user_id: i64) -> Result<Vec<i64>, RepoError> {
            Ok(Vec::new())
        }

        async fn count_followers(&self, _author_id: i64) -> Result<u64, RepoError> {
            Ok(1)
        }

        async fn count_following(&self, _user_id: i64) -> Result<u64, RepoError> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn unique_violation_on_insert_means_already_following() {
        let service = FollowService::new(Arc::new(ConflictingFollows));
        assert_eq!(
            service.follow(1, 2).await.expect("follow"),
            FollowOutcome::AlreadyFollowing
        );
    }
}
