mod support;

use axum::http::StatusCode;
use support::{TestApp, body_text, post_cards};

#[tokio::test]
async fn index_pages_ten_posts_at_a_time() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    for n in 1..=13 {
        app.post(&leo, &format!("entry number {n}"), None).await;
    }

    let first = app.page("/", None).await;
    assert_eq!(post_cards(&first), 10);
    assert!(first.contains("entry number 13"));
    assert!(!first.contains("entry number 3<"));
    assert!(first.contains("Page 1 of 2"));
    assert!(first.contains("?page=2"));

    let second = app.page("/?page=2", None).await;
    assert_eq!(post_cards(&second), 3);
    assert!(second.contains("entry number 1<"));
    assert!(second.contains("Page 2 of 2"));
}

#[tokio::test]
async fn out_of_range_pages_clamp_and_garbage_means_first_page() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    for n in 1..=13 {
        app.post(&leo, &format!("entry number {n}"), None).await;
    }

    let clamped = app.page("/?page=99", None).await;
    assert_eq!(post_cards(&clamped), 3);
    assert!(clamped.contains("Page 2 of 2"));

    let garbage = app.page("/?page=abc", None).await;
    assert_eq!(post_cards(&garbage), 10);
    assert!(garbage.contains("Page 1 of 2"));
}

#[tokio::test]
async fn empty_index_renders_placeholder() {
    let app = TestApp::without_cache();
    let html = app.page("/", None).await;
    assert_eq!(post_cards(&html), 0);
    assert!(html.contains("No posts yet."));
    assert!(!html.contains("class=\"pagination\""));
}

#[tokio::test]
async fn group_page_lists_only_its_posts() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    let cats = app.group("Cats", "cats").await;
    let dogs = app.group("Dogs", "dogs").await;
    app.post(&leo, "whiskers everywhere", Some(&cats)).await;
    app.post(&leo, "fetch all day", Some(&dogs)).await;
    app.post(&leo, "no group at all", None).await;

    let html = app.page("/group/cats/", None).await;
    assert_eq!(post_cards(&html), 1);
    assert!(html.contains("whiskers everywhere"));
    assert!(html.contains("About Cats"));
    assert!(!html.contains("fetch all day"));
    assert!(!html.contains("no group at all"));
}

#[tokio::test]
async fn unknown_group_and_profile_are_not_found() {
    let app = TestApp::without_cache();

    let response = app.get("/group/nope/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));

    let response = app.get("/ghost/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_shows_counters_and_follow_button() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    let ada = app.user("ada").await;
    app.user("bob").await;
    app.post(&leo, "first", None).await;
    app.post(&leo, "second", None).await;
    app.post(&ada, "not on leo's page", None).await;

    let anonymous = app.page("/leo/", None).await;
    assert_eq!(post_cards(&anonymous), 2);
    assert!(anonymous.contains("<span class=\"post-count\">2</span>"));
    assert!(anonymous.contains("<span class=\"followers\">0</span>"));
    assert!(!anonymous.contains("follow-button"));

    let own = app.page("/leo/", Some("leo")).await;
    assert!(!own.contains("follow-button"));

    let other = app.page("/leo/", Some("bob")).await;
    assert!(other.contains("follow-button"));
    assert!(other.contains(">Follow</a>"));
}

#[tokio::test]
async fn post_view_shows_detail_and_comments() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    app.user("ada").await;
    let post = app.post(&leo, "a post worth discussing", None).await;

    let uri = format!("/leo/{}/comment", post.id);
    let response = app.post_form(&uri, Some("ada"), "text=great+read").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let html = app.page(&format!("/leo/{}/", post.id), None).await;
    assert!(html.contains("a post worth discussing"));
    assert!(html.contains("great read"));
    assert!(html.contains("class=\"comment\""));
    assert!(html.contains("<span class=\"post-count\">1</span>"));
    // Anonymous viewers get no comment form.
    assert!(!html.contains("comment-form"));

    let signed_in = app.page(&format!("/leo/{}/", post.id), Some("ada")).await;
    assert!(signed_in.contains("comment-form"));
}

#[tokio::test]
async fn post_view_rejects_mismatched_or_malformed_ids() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    app.user("ada").await;
    let post = app.post(&leo, "owned by leo", None).await;

    for uri in [
        format!("/ada/{}/", post.id),
        format!("/leo/{}/", post.id + 100),
        "/leo/not-a-number/".to_string(),
        "/leo/0/".to_string(),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {uri}");
    }
}

#[tokio::test]
async fn images_render_on_every_listing() {
    let app = TestApp::without_cache();
    let leo = app.user("leo").await;
    let cats = app.group("Cats", "cats").await;
    let post = app
        .post_with_image(&leo, "with a picture", Some(&cats), Some("posts/cat.gif"))
        .await;

    for uri in [
        "/".to_string(),
        "/group/cats/".to_string(),
        "/leo/".to_string(),
        format!("/leo/{}/", post.id),
    ] {
        let html = app.page(&uri, None).await;
        assert!(html.contains("<img class=\"post-image\""), "GET {uri}");
    }
}

#[tokio::test]
async fn unknown_routes_render_not_found_page() {
    let app = TestApp::without_cache();
    let response = app.get("/a/b/c/d/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
