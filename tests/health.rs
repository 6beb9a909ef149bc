use anyhow::Result;
use axum::http::StatusCode;

mod common;
use common::TestApp;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = TestApp::new().await?;

    let (status, body) = t.request("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true, "expected db_ok: true, got: {}", body);
    assert!(body["db_error"].is_null());

    Ok(())
}
