use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use tenant_tasks::authz::{permissions, roles, CatalogConfig};

mod common;
use common::{ids, TestApp, PASSWORD};

/// Reference catalog where admins may also onboard users.
fn delegating_catalog() -> CatalogConfig {
    let mut config = CatalogConfig::reference();
    for role in config.roles.iter_mut().filter(|r| r.name == roles::ADMIN) {
        role.permissions.push(permissions::USER_CREATE.to_string());
        role.permissions.push(permissions::USER_UPDATE.to_string());
    }
    config
}

#[tokio::test]
async fn owner_onboards_users_into_organizations() -> Result<()> {
    let t = TestApp::new().await?;
    let org = t.seed_org("Acme", None).await?;
    let owner = t.seed_user("owner@example.com", "owner", None).await?;

    let (status, body) = t
        .request(
            "POST",
            "/users",
            Some(&owner),
            Some(json!({ "email": "New@Example.com", "password": PASSWORD, "role": "Admin", "organization_id": org })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["email"], "new@example.com");
    assert_eq!(body["role"], "admin");
    assert_eq!(body["organization_id"], org.to_string());
    assert!(body.get("password_hash").is_none());

    let token = t.login("new@example.com", PASSWORD).await?;
    let (status, _) = t.request("POST", "/tasks", Some(&token), Some(json!({ "title": "first" }))).await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn create_validates_input() -> Result<()> {
    let t = TestApp::new().await?;
    let org = t.seed_org("Acme", None).await?;
    let owner = t.seed_user("owner@example.com", "owner", None).await?;

    let cases = [
        (json!({ "email": "owner@example.com", "password": PASSWORD, "role": "viewer", "organization_id": org }), StatusCode::CONFLICT),
        (json!({ "email": "short@example.com", "password": "short", "role": "viewer", "organization_id": org }), StatusCode::BAD_REQUEST),
        (json!({ "email": "role@example.com", "password": PASSWORD, "role": "emperor", "organization_id": org }), StatusCode::BAD_REQUEST),
        (json!({ "email": "not-an-email", "password": PASSWORD, "role": "viewer", "organization_id": org }), StatusCode::BAD_REQUEST),
        (json!({ "email": "lost@example.com", "password": PASSWORD, "role": "viewer", "organization_id": uuid::Uuid::new_v4() }), StatusCode::NOT_FOUND),
    ];

    for (payload, expected) in cases {
        let (status, body) = t.request("POST", "/users", Some(&owner), Some(payload.clone())).await?;
        assert_eq!(status, expected, "payload {} -> {}", payload, body);
    }

    Ok(())
}

#[tokio::test]
async fn admins_cannot_manage_users_with_reference_catalog() -> Result<()> {
    let t = TestApp::new().await?;
    let org = t.seed_org("Acme", None).await?;
    let admin = t.seed_user("admin@example.com", "admin", Some(org)).await?;

    let (status, body) = t
        .request(
            "POST",
            "/users",
            Some(&admin),
            Some(json!({ "email": "x@example.com", "password": PASSWORD, "role": "viewer" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot create users");

    let viewer = t.seed_user("viewer@example.com", "viewer", Some(org)).await?;
    let (status, body) = t.request("GET", "/users", Some(&viewer), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot list users");

    Ok(())
}

#[tokio::test]
async fn delegated_creation_respects_seniority_and_scope() -> Result<()> {
    let t = TestApp::with_catalog(&delegating_catalog()).await?;
    let a = t.seed_org("A", None).await?;
    let b = t.seed_org("B", Some(a)).await?;
    let c = t.seed_org("C", None).await?;
    let admin = t.seed_user("admin@example.com", "admin", Some(a)).await?;

    let create = |email: &str, role: &str, org| {
        json!({ "email": email, "password": PASSWORD, "role": role, "organization_id": org })
    };

    let (status, _) = t
        .request("POST", "/users", Some(&admin), Some(create("v@example.com", "viewer", b)))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "child org is in scope");

    let (status, _) = t
        .request("POST", "/users", Some(&admin), Some(create("peer@example.com", "admin", a)))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "same seniority is allowed");

    let (status, body) = t
        .request("POST", "/users", Some(&admin), Some(create("boss@example.com", "owner", a)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot assign a role above your own");

    let (status, _) = t
        .request("POST", "/users", Some(&admin), Some(create("far@example.com", "viewer", c)))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "organization outside scope");

    Ok(())
}

#[tokio::test]
async fn listing_is_scoped_and_filter_narrows() -> Result<()> {
    let t = TestApp::new().await?;
    let a = t.seed_org("A", None).await?;
    let b = t.seed_org("B", Some(a)).await?;
    let c = t.seed_org("C", None).await?;
    let admin = t.seed_user("admin-a@example.com", "admin", Some(a)).await?;
    t.seed_user_id("viewer-b@example.com", "viewer", Some(b)).await?;
    t.seed_user_id("viewer-c@example.com", "viewer", Some(c)).await?;
    let owner = t.seed_user("owner@example.com", "owner", None).await?;

    let (status, body) = t.request("GET", "/users", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body, "email"), vec!["admin-a@example.com", "viewer-b@example.com"]);

    let (_, body) = t.request("GET", &format!("/users?organization_id={}", b), Some(&admin), None).await?;
    assert_eq!(ids(&body, "email"), vec!["viewer-b@example.com"]);

    let (status, body) = t.request("GET", &format!("/users?organization_id={}", c), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body, "email").is_empty(), "filter outside scope yields nothing");

    let (_, body) = t.request("GET", "/users", Some(&owner), None).await?;
    assert_eq!(ids(&body, "email").len(), 4);

    Ok(())
}

#[tokio::test]
async fn update_and_password_reset() -> Result<()> {
    let t = TestApp::new().await?;
    let a = t.seed_org("A", None).await?;
    let c = t.seed_org("C", None).await?;
    let owner = t.seed_user("owner@example.com", "owner", None).await?;
    let target = t.seed_user_id("target@example.com", "viewer", Some(a)).await?;

    let (status, body) = t
        .request("PUT", &format!("/users/{}", target), Some(&owner), Some(json!({ "role": "admin", "organization_id": c })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["organization_id"], c.to_string());

    let (status, _) = t
        .request("PUT", &format!("/users/{}", target), Some(&owner), Some(json!({ "role": "emperor" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/users/{}/reset-password", target);
    let (status, _) = t.request("POST", &uri, Some(&owner), Some(json!({ "password": "short" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .request("POST", &uri, Some(&owner), Some(json!({ "password": "a-brand-new-secret" })))
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    t.login("target@example.com", "a-brand-new-secret").await?;
    let (status, _) = t
        .request("POST", "/auth/login", None, Some(json!({ "email": "target@example.com", "password": PASSWORD })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "old password no longer works");

    Ok(())
}

#[tokio::test]
async fn delegated_update_cannot_reach_outside_scope() -> Result<()> {
    let t = TestApp::with_catalog(&delegating_catalog()).await?;
    let a = t.seed_org("A", None).await?;
    let c = t.seed_org("C", None).await?;
    let admin = t.seed_user("admin@example.com", "admin", Some(a)).await?;
    let outsider = t.seed_user_id("outsider@example.com", "viewer", Some(c)).await?;
    let insider = t.seed_user_id("insider@example.com", "viewer", Some(a)).await?;
    let boss = t.seed_user_id("boss@example.com", "owner", Some(a)).await?;

    let (status, _) = t
        .request("PUT", &format!("/users/{}", outsider), Some(&admin), Some(json!({ "role": "admin" })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .request("PUT", &format!("/users/{}", insider), Some(&admin), Some(json!({ "organization_id": c })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "cannot move users out of scope");

    let (status, _) = t
        .request("PUT", &format!("/users/{}", boss), Some(&admin), Some(json!({ "role": "viewer" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "cannot demote a more senior user");

    Ok(())
}
