use sqlx::{QueryBuilder, Sqlite};

use super::ServiceContext;
use crate::audit::MAX_ENTRIES;
use crate::authz::permissions::AUDIT_READ;
use crate::db::push_scope_filter;
use crate::errors::AppResult;
use crate::models::audit::{AuditLogEntry, DbAuditLogEntry};

/// Newest first. An entry is visible when the acting user's organization is
/// inside the caller's scope.
pub async fn list(ctx: &ServiceContext<'_>) -> AppResult<Vec<AuditLogEntry>> {
    let scope = ctx.guard().authorize(AUDIT_READ, "Cannot read audit log").await?;

    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT a.seq, a.id, a.user_id, u.email AS user_email, a.action, a.resource_type, a.resource_id, \
         a.metadata, a.timestamp, a.severity, a.prev_hash, a.hash \
         FROM audit_logs a JOIN users u ON u.id = a.user_id WHERE 1 = 1",
    );
    push_scope_filter(&mut builder, "u.organization_id", &scope);
    builder.push(" ORDER BY a.seq DESC LIMIT ");
    builder.push_bind(MAX_ENTRIES);

    let rows = builder.build_query_as::<DbAuditLogEntry>().fetch_all(ctx.pool).await?;
    rows.into_iter().map(AuditLogEntry::try_from).collect()
}
