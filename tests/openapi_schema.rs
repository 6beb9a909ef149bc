use anyhow::Result;

use tenant_tasks::docs::build_openapi;

#[test]
fn openapi_lists_every_route() -> Result<()> {
    let doc = build_openapi(8000)?;
    let paths = doc["paths"].as_object().cloned().unwrap_or_default();

    for (path, method) in [
        ("/api/health", "get"),
        ("/auth/login", "post"),
        ("/auth/me", "get"),
        ("/tasks", "get"),
        ("/tasks", "post"),
        ("/tasks/{id}", "put"),
        ("/tasks/{id}", "delete"),
        ("/users", "post"),
        ("/users/{id}/reset-password", "post"),
        ("/organizations/{id}", "put"),
        ("/audit-log", "get"),
        ("/roles/reload", "post"),
        ("/categories", "get"),
        ("/categories", "post"),
        ("/statuses", "get"),
    ] {
        assert!(
            paths.get(path).and_then(|item| item.get(method)).is_some(),
            "missing {} {}",
            method,
            path
        );
    }

    assert_eq!(doc["security"][0]["bearerAuth"], serde_json::json!([]));
    assert!(doc["components"]["schemas"].get("TaskStatus").is_some());
    Ok(())
}
