use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::ServiceContext;
use crate::audit;
use crate::authz::permissions::{ORG_CREATE, ORG_UPDATE};
use crate::authz::{ensure_in_scope, ConnectionOrganizationStore, OrganizationHierarchy, OrganizationStore};
use crate::db::push_scope_filter;
use crate::errors::{AppError, AppResult};
use crate::models::organization::{DbOrganization, Organization, OrganizationCreateRequest, OrganizationUpdateRequest};
use crate::utils::utc_now;

const NAME_TAKEN: &str = "Organization name already exists";

/// Callers with a home organization always create beneath it; only callers
/// without one may pick the parent.
pub async fn create(ctx: &ServiceContext<'_>, payload: OrganizationCreateRequest) -> AppResult<Organization> {
    let guard = ctx.guard();
    let scope = guard.authorize(ORG_CREATE, "Cannot create organizations").await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let parent_id = ctx.principal.organization_id.or(payload.parent_id);
    if let (Some(parent_id), None) = (parent_id, ctx.principal.organization_id) {
        ensure_in_scope(&scope, parent_id, "Parent organization")?;
    }
    let organization = Organization::new(name, parent_id);

    let mut tx = ctx.write().await?;
    {
        let store = ConnectionOrganizationStore::new(tx.conn()?);
        if let Some(parent_id) = parent_id {
            if store.find_by_id(parent_id).await?.is_none() {
                return Err(AppError::not_found("Parent organization not found"));
            }
            OrganizationHierarchy::new(&store)
                .ensure_acyclic(organization.id, parent_id)
                .await?;
        }
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organizations WHERE name = ?)")
        .bind(&organization.name)
        .fetch_one(tx.conn()?)
        .await?;
    if taken {
        return Err(AppError::conflict(NAME_TAKEN));
    }

    sqlx::query("INSERT INTO organizations (id, name, parent_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(organization.id)
        .bind(&organization.name)
        .bind(organization.parent_id)
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .execute(tx.conn()?)
        .await
        .map_err(AppError::unique_violation(NAME_TAKEN))?;

    audit::record(
        tx.conn()?,
        ctx.principal.user_id,
        "create",
        &organization,
        Some(json!({ "name": organization.name, "parent_id": organization.parent_id })),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(organization_id = %organization.id, parent_id = ?organization.parent_id, "organization created");
    Ok(organization)
}

/// Everything for the top role, otherwise the caller's home and its children.
pub async fn list(ctx: &ServiceContext<'_>) -> AppResult<Vec<Organization>> {
    let scope = ctx.guard().scope().await?;

    let mut builder =
        QueryBuilder::<Sqlite>::new("SELECT o.id, o.name, o.parent_id, o.created_at, o.updated_at FROM organizations o WHERE 1 = 1");
    push_scope_filter(&mut builder, "o.id", &scope);
    builder.push(" ORDER BY o.name ASC");

    let rows = builder.build_query_as::<DbOrganization>().fetch_all(ctx.pool).await?;
    Ok(rows.into_iter().map(Organization::from).collect())
}

pub async fn reparent(ctx: &ServiceContext<'_>, id: Uuid, payload: OrganizationUpdateRequest) -> AppResult<Organization> {
    let guard = ctx.guard();
    let scope = guard.authorize(ORG_UPDATE, "Cannot update organizations").await?;

    ensure_in_scope(&scope, id, "Organization")?;
    if let Some(parent_id) = payload.parent_id {
        if parent_id == id {
            return Err(AppError::bad_request("organization hierarchy cycle"));
        }
        ensure_in_scope(&scope, parent_id, "Parent organization")?;
    }

    // The chain walk and the update share one locked connection, so two
    // opposing re-parents cannot both pass the cycle check.
    let mut tx = ctx.write().await?;
    let mut organization = {
        let store = ConnectionOrganizationStore::new(tx.conn()?);
        let organization = store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))?;
        if let Some(parent_id) = payload.parent_id {
            if store.find_by_id(parent_id).await?.is_none() {
                return Err(AppError::not_found("Parent organization not found"));
            }
            OrganizationHierarchy::new(&store).ensure_acyclic(id, parent_id).await?;
        }
        organization
    };

    let previous_parent = organization.parent_id;
    organization.parent_id = payload.parent_id;
    organization.updated_at = utc_now();

    sqlx::query("UPDATE organizations SET parent_id = ?, updated_at = ? WHERE id = ?")
        .bind(organization.parent_id)
        .bind(organization.updated_at)
        .bind(organization.id)
        .execute(tx.conn()?)
        .await?;

    audit::record(
        tx.conn()?,
        ctx.principal.user_id,
        "update",
        &organization,
        Some(json!({ "parent_id": { "from": previous_parent, "to": organization.parent_id } })),
    )
    .await?;
    tx.commit().await?;

    Ok(organization)
}
