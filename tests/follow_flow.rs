mod support;

use axum::http::StatusCode;
use quill::application::repos::FollowsRepo;
use support::{TestApp, location, post_cards};

#[tokio::test]
async fn following_an_author_fills_the_follow_feed() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    app.post(&leo, "leo writes", None).await;
    app.post(&ada, "ada writes", None).await;

    let empty = app.page("/follow/", Some("bob")).await;
    assert_eq!(post_cards(&empty), 0);
    assert!(empty.contains("Authors you follow have not posted yet."));

    let response = app.get("/leo/follow/", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/leo/");
    assert!(app.repos.follow_exists(bob.id, leo.id).await.expect("exists"));

    let feed = app.page("/follow/", Some("bob")).await;
    assert_eq!(post_cards(&feed), 1);
    assert!(feed.contains("leo writes"));
    assert!(!feed.contains("ada writes"));

    let profile = app.page("/leo/", Some("bob")).await;
    assert!(profile.contains(">Unfollow</a>"));
    assert!(profile.contains("<span class=\"followers\">1</span>"));
}

#[tokio::test]
async fn following_twice_keeps_one_edge() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    app.user("bob").await;

    for _ in 0..2 {
        let response = app.get("/leo/follow/", Some("bob")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    assert_eq!(app.repos.count_followers(leo.id).await.expect("count"), 1);
}

#[tokio::test]
async fn following_yourself_changes_nothing() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;

    let response = app.get("/leo/follow/", Some("leo")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/leo/");
    assert_eq!(app.repos.count_followers(leo.id).await.expect("count"), 0);
    assert_eq!(app.repos.count_following(leo.id).await.expect("count"), 0);
}

#[tokio::test]
async fn unfollow_removes_the_edge_and_a_second_unfollow_is_not_found() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    let bob = app.user("bob").await;
    app.post(&leo, "leo writes", None).await;

    app.get("/leo/follow/", Some("bob")).await;
    let response = app.get("/leo/unfollow/", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/leo/");
    assert!(!app.repos.follow_exists(bob.id, leo.id).await.expect("exists"));

    let feed = app.page("/follow/", Some("bob")).await;
    assert_eq!(post_cards(&feed), 0);

    let response = app.get("/leo/unfollow/", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn following_an_unknown_author_is_not_found() {
    let app = TestApp::without_cache();
    app.user("bob").await;

    let response = app.get("/ghost/follow/", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.get("/ghost/unfollow/", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_routes_need_an_account() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;

    let response = app.get("/follow/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/follow/");

    let response = app.get("/leo/follow/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/leo/follow/");
    assert_eq!(app.repos.count_followers(leo.id).await.expect("count"), 0);

    // An unknown header value is treated as anonymous.
    let response = app.get("/follow/", Some("ghost")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
