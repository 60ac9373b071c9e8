//! Referential behaviour of the Postgres adapter. These need a database:
//! run with `DATABASE_URL=... cargo test -- --ignored`.

use quill::{
    application::repos::{
        CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, FollowsRepo,
        GroupsWriteRepo, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
        UsersWriteRepo,
    },
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;

async fn seed_post(
    repos: &PostgresRepositories,
    author_id: i64,
    text: &str,
    group_id: Option<i64>,
) -> i64 {
    repos
        .create_post(CreatePostParams {
            author_id,
            text: text.to_string(),
            group_id,
            image: None,
        })
        .await
        .expect("create post")
        .id
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_group_keeps_its_posts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = repos.create_user("leo").await.expect("user");
    let cats = repos
        .create_group(CreateGroupParams {
            title: "Cats".into(),
            slug: "cats".into(),
            description: String::new(),
        })
        .await
        .expect("group");
    let post_id = seed_post(&repos, leo.id, "meow", Some(cats.id)).await;

    repos.delete_group(cats.id).await.expect("delete group");

    let post = repos
        .find_post_by_id(post_id)
        .await
        .expect("lookup")
        .expect("post survives");
    assert_eq!(post.group_id, None);
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_user_removes_their_content_and_orphans_follows(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = repos.create_user("leo").await.expect("user");
    let ada = repos.create_user("ada").await.expect("user");
    let leo_post = seed_post(&repos, leo.id, "by leo", None).await;
    let ada_post = seed_post(&repos, ada.id, "by ada", None).await;
    repos
        .create_comment(CreateCommentParams {
            post_id: ada_post,
            author_id: leo.id,
            text: "leo was here".into(),
        })
        .await
        .expect("comment");
    assert!(repos.insert_follow(ada.id, leo.id).await.expect("follow"));

    repos.delete_user(leo.id).await.expect("delete user");

    assert!(repos.find_user_by_id(leo.id).await.expect("lookup").is_none());
    assert!(repos.find_post_by_id(leo_post).await.expect("lookup").is_none());
    assert!(
        repos
            .list_comments_for_post(ada_post)
            .await
            .expect("comments")
            .is_empty()
    );
    // Ada's edge survives without an author and drops out of her feed.
    assert!(repos.followed_author_ids(ada.id).await.expect("ids").is_empty());
    assert_eq!(repos.count_following(ada.id).await.expect("count"), 0);
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn follow_edges_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = repos.create_user("leo").await.expect("user");
    let bob = repos.create_user("bob").await.expect("user");

    assert!(repos.insert_follow(bob.id, leo.id).await.expect("first"));
    assert!(!repos.insert_follow(bob.id, leo.id).await.expect("second"));
    assert_eq!(repos.count_followers(leo.id).await.expect("count"), 1);

    assert_eq!(repos.delete_follow(bob.id, leo.id).await.expect("delete"), 1);
    assert_eq!(repos.delete_follow(bob.id, leo.id).await.expect("delete"), 0);
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn posts_are_listed_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = repos.create_user("leo").await.expect("user");
    let mut ids = Vec::new();
    for n in 0..12 {
        ids.push(seed_post(&repos, leo.id, &format!("post {n}"), None).await);
    }

    let filter = PostQueryFilter::default();
    assert_eq!(repos.count_posts(&filter).await.expect("count"), 12);

    let first = repos.list_posts(&filter, 0, 10).await.expect("page");
    let second = repos.list_posts(&filter, 10, 10).await.expect("page");
    let listed: Vec<i64> = first
        .iter()
        .chain(second.iter())
        .map(|listing| listing.post.id)
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
    assert_eq!(first[0].author_username, "leo");
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn duplicate_usernames_are_rejected(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.create_user("leo").await.expect("user");

    let err = repos.create_user("leo").await.expect_err("duplicate");
    assert!(matches!(err, RepoError::Duplicate { .. }));
}
