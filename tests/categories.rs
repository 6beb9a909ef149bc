use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{ids, TestApp};

#[tokio::test]
async fn listing_shows_globals_then_own() -> Result<()> {
    let t = TestApp::new().await?;
    let ada = t.seed_user("ada@example.com", "viewer", None).await?;
    let bob = t.seed_user("bob@example.com", "viewer", None).await?;

    let (status, body) = t.request("GET", "/categories", Some(&ada), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body, "name"), vec!["personal", "work"]);
    assert!(body[0]["user_id"].is_null());

    let (status, _) = t.request("POST", "/categories", Some(&ada), Some(json!({ "name": "errands" }))).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = t.request("POST", "/categories", Some(&ada), Some(json!({ "name": "books" }))).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = t.request("GET", "/categories", Some(&ada), None).await?;
    assert_eq!(ids(&body, "name"), vec!["personal", "work", "books", "errands"]);

    let (_, body) = t.request("GET", "/categories", Some(&bob), None).await?;
    assert_eq!(ids(&body, "name"), vec!["personal", "work"], "other users' categories stay private");
    Ok(())
}

#[tokio::test]
async fn create_trims_and_is_idempotent_per_user() -> Result<()> {
    let t = TestApp::new().await?;
    let ada = t.seed_user("ada@example.com", "viewer", None).await?;
    let bob = t.seed_user("bob@example.com", "viewer", None).await?;

    let (status, first) = t.request("POST", "/categories", Some(&ada), Some(json!({ "name": "  garden " }))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["name"], "garden");

    let (status, again) = t.request("POST", "/categories", Some(&ada), Some(json!({ "name": "garden" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], first["id"]);

    let (status, other) = t.request("POST", "/categories", Some(&bob), Some(json!({ "name": "garden" }))).await?;
    assert_eq!(status, StatusCode::CREATED, "same name is fine for another user");
    assert_ne!(other["id"], first["id"]);

    let (status, body) = t.request("POST", "/categories", Some(&ada), Some(json!({ "name": "   " }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Category name is required");
    Ok(())
}

#[tokio::test]
async fn categories_require_authentication() -> Result<()> {
    let t = TestApp::new().await?;
    let (status, _) = t.request("GET", "/categories", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.request("GET", "/statuses", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn statuses_come_in_board_order() -> Result<()> {
    let t = TestApp::new().await?;
    let viewer = t.seed_user("viewer@example.com", "viewer", None).await?;

    let (status, body) = t.request("GET", "/statuses", Some(&viewer), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body, "name"), vec!["todo", "in_progress", "done", "blocked"]);
    assert_eq!(body[3]["position"], 3);
    Ok(())
}
