#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use tenant_tasks::authz::CatalogConfig;
use tenant_tasks::create_app_with_catalog;
use tenant_tasks::utils::hash_password;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_catalog(&CatalogConfig::reference()).await
    }

    pub async fn with_catalog(catalog: &CatalogConfig) -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        std::env::set_var("JWT_SECRET", "test-secret");
        let app = create_app_with_catalog(pool.clone(), catalog).await?;

        Ok(Self { app, pool, _dir: dir })
    }

    /// Sends one request and returns the status with the JSON body
    /// (`Value::Null` when the body is empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .request("POST", "/auth/login", None, Some(json!({ "email": email, "password": password })))
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed for {}: {}", email, body);
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response without token")
    }

    pub async fn seed_org(&self, name: &str, parent_id: Option<Uuid>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query("INSERT INTO organizations (id, name, parent_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(parent_id)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn seed_user_id(&self, email: &str, role: &str, organization_id: Option<Uuid>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, role, organization_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(email)
        .bind(hash_password(PASSWORD)?)
        .bind(role)
        .bind(organization_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Inserts a user and returns a bearer token for it.
    pub async fn seed_user(&self, email: &str, role: &str, organization_id: Option<Uuid>) -> Result<String> {
        self.seed_user_id(email, role, organization_id).await?;
        self.login(email, PASSWORD).await
    }
}

pub fn ids(list: &Value, field: &str) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item[field].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
