use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{audit, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::tasks::list_tasks,
		routes::tasks::create_task,
		routes::tasks::get_task,
		routes::tasks::update_task,
		routes::tasks::delete_task,
		routes::users::list_users,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::reset_password,
		routes::organizations::list_organizations,
		routes::organizations::create_organization,
		routes::organizations::update_organization,
		routes::audit::list_audit_log,
		routes::roles::list_roles,
		routes::roles::reload_roles,
		routes::categories::list_categories,
		routes::categories::create_category,
		routes::statuses::list_statuses
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::MeResponse,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::PasswordResetRequest,
			models::task::Task,
			models::task::TaskStatus,
			models::task::TaskCreateRequest,
			models::task::TaskUpdateRequest,
			models::organization::Organization,
			models::organization::OrganizationCreateRequest,
			models::organization::OrganizationUpdateRequest,
			models::audit::AuditLogEntry,
			models::role::RoleSummary,
			models::role::RoleCatalogResponse,
			models::category::Category,
			models::category::CategoryCreateRequest,
			routes::statuses::StatusInfo,
			audit::Severity
		)
	),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Login and current principal"),
		(name = "Tasks", description = "Organization-scoped tasks"),
		(name = "Users", description = "Account administration"),
		(name = "Organizations", description = "Organization tree"),
		(name = "Audit", description = "Hash-chained audit log"),
		(name = "Roles", description = "Role catalog"),
		(name = "Categories", description = "Per-user task category picklists")
	)
)]
pub struct ApiDoc;

/// Generated document plus the bearer scheme, global security and a
/// `servers` entry for the local port.
pub fn build_openapi(port: u16) -> anyhow::Result<Value> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

	ensure_security_components(root)?;
	root.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	mark_public_operations(root);
	add_examples(root);
	root.insert(
		"servers".to_string(),
		json!([{ "url": format!("http://localhost:{port}") }]),
	);

	Ok(doc)
}

pub fn swagger_routes(doc: Value) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("components must be an object"))?;

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

// Login and health are reachable without a token.
fn mark_public_operations(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for (path, method) in [("/auth/login", "post"), ("/api/health", "get")] {
		if let Some(operation) = paths
			.get_mut(path)
			.and_then(|item| item.get_mut(method))
			.and_then(Value::as_object_mut)
		{
			operation.insert("security".to_string(), json!([]));
		}
	}
}

fn add_examples(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_request_example(operation);
		}
	}
}

fn apply_request_example(operation: &mut Value) {
	let Some(app_json) = operation
		.pointer_mut("/requestBody/content/application~1json")
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json
		.get("schema")
		.and_then(|schema| schema.get("$ref"))
		.and_then(Value::as_str)
	else {
		return;
	};

	let example = match reference {
		"#/components/schemas/LoginRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		}),
		"#/components/schemas/TaskCreateRequest" => json!({
			"title": "Reconcile March invoices",
			"description": "Match carrier invoices against delivery notes.",
			"status": "todo",
			"category": "finance"
		}),
		"#/components/schemas/TaskUpdateRequest" => json!({
			"status": "in_progress",
			"order_index": 2
		}),
		"#/components/schemas/UserCreateRequest" => json!({
			"email": "grace@example.com",
			"password": "S3cureP@ssw0rd",
			"role": "viewer",
			"organization_id": "00000000-0000-0000-0000-000000000000"
		}),
		"#/components/schemas/OrganizationCreateRequest" => json!({
			"name": "Acme Logistics North"
		}),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}
