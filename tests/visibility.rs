mod common;

use axum::http::StatusCode;
use common::{body_string, TestApp};

async fn seed_three_entries(app: &TestApp, cookie: &str) -> (String, String, String) {
    let public = app
        .create_entry(cookie, "Public entry", "2024-01-01", "", false, false)
        .await;
    let private = app
        .create_entry(cookie, "Private entry", "2024-01-02", "", true, false)
        .await;
    let hidden = app
        .create_entry(cookie, "Hidden entry", "2024-01-03", "", true, true)
        .await;
    (public, private, hidden)
}

#[tokio::test]
async fn anonymous_listing_includes_private_but_not_hidden() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    seed_three_entries(&app, &cookie).await;

    let resp = app.get("/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("Public entry"));
    assert!(html.contains("Private entry"));
    assert!(!html.contains("Hidden entry"));
}

#[tokio::test]
async fn private_entry_is_listed_without_a_link() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    let (public, private, _) = seed_three_entries(&app, &cookie).await;

    let resp = app.get("/", None).await;
    let html = body_string(resp).await;
    assert!(html.contains(&format!("/entries/{public}")));
    assert!(!html.contains(&format!("/entries/{private}")));
}

#[tokio::test]
async fn private_detail_is_forbidden_for_strangers() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    let (_, private, _) = seed_three_entries(&app, &cookie).await;

    let resp = app.get(&format!("/entries/{private}"), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let html = body_string(resp).await;
    assert!(html.contains("Entry is private."));

    let bob = app.register("bob").await;
    let resp = app.get(&format!("/entries/{private}"), Some(&bob)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hidden_detail_is_not_found_for_everyone_but_owner_and_god() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    let (_, _, hidden) = seed_three_entries(&app, &cookie).await;

    // Anonymous and other users get the nonexistent-entry response.
    let resp = app.get(&format!("/entries/{hidden}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let html = body_string(resp).await;
    assert!(html.contains("Entry does not exist."));

    let bob = app.register("bob").await;
    let resp = app.get(&format!("/entries/{hidden}"), Some(&bob)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.get(&format!("/entries/{hidden}"), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    app.register("zeus").await;
    app.make_god("zeus").await;
    let zeus = app.login("zeus").await;
    let resp = app.get(&format!("/entries/{hidden}"), Some(&zeus)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn owner_listing_shows_their_hidden_entries() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    seed_three_entries(&app, &cookie).await;

    let resp = app.get("/", Some(&cookie)).await;
    let html = body_string(resp).await;
    assert!(html.contains("Hidden entry"));
}

#[tokio::test]
async fn god_global_listing_contains_everything() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    seed_three_entries(&app, &cookie).await;

    app.register("zeus").await;
    app.make_god("zeus").await;
    let zeus = app.login("zeus").await;

    let resp = app.get("/", Some(&zeus)).await;
    let html = body_string(resp).await;
    assert!(html.contains("Public entry"));
    assert!(html.contains("Private entry"));
    assert!(html.contains("Hidden entry"));
}

#[tokio::test]
async fn author_listing_hides_hidden_from_strangers() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;
    seed_three_entries(&app, &cookie).await;

    let resp = app.get("/users/alice", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("Public entry"));
    assert!(html.contains("Private entry"));
    assert!(!html.contains("Hidden entry"));

    // The author sees all of their own entries.
    let resp = app.get("/users/alice", Some(&cookie)).await;
    let html = body_string(resp).await;
    assert!(html.contains("Hidden entry"));
}

#[tokio::test]
async fn author_listing_unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let resp = app.get("/users/nobody", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let html = body_string(resp).await;
    assert!(html.contains("User does not exist."));
}

#[tokio::test]
async fn listings_are_ordered_by_date_ascending() {
    let app = TestApp::new().await;
    let cookie = app.register("alice").await;

    app.create_entry(&cookie, "Newer entry", "2024-06-01", "", false, false)
        .await;
    app.create_entry(&cookie, "Older entry", "2024-01-01", "", false, false)
        .await;

    let resp = app.get("/", None).await;
    let html = body_string(resp).await;
    let older = html.find("Older entry").unwrap();
    let newer = html.find("Newer entry").unwrap();
    assert!(older < newer);
}
