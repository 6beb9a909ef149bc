//! Append-only audit log with a SHA-256 hash chain.
//!
//! Entries are written on the caller's connection so they commit or roll back
//! together with the change they describe.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::errors::AppResult;

pub mod loggable;
pub use loggable::{Loggable, Severity};

/// Read cap for audit listings.
pub const MAX_ENTRIES: i64 = 200;

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub metadata: Option<Value>,
    pub severity: Severity,
}

impl NewAuditEntry {
    /// Builds `<entity_type>.<action>` for `entity`.
    pub fn for_entity<T: Loggable>(user_id: Uuid, action: &str, entity: &T, metadata: Option<Value>) -> Self {
        Self {
            user_id,
            action: format!("{}.{}", T::entity_type(), action),
            resource_type: T::entity_type().to_string(),
            resource_id: Some(entity.subject_id()),
            metadata,
            severity: entity.severity_for_action(action),
        }
    }
}

/// Appends `entry`, linking it to the most recent entry's hash.
pub async fn append(conn: &mut SqliteConnection, entry: NewAuditEntry) -> AppResult<String> {
    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM audit_logs ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    let id = Uuid::new_v4();
    let timestamp = format_timestamp(Utc::now());
    let metadata = entry.metadata.as_ref().map(Value::to_string);
    let hash = chain_hash(
        prev_hash.as_deref(),
        &ChainFields {
            id,
            user_id: entry.user_id,
            action: &entry.action,
            resource_type: &entry.resource_type,
            resource_id: entry.resource_id,
            metadata: metadata.as_deref(),
            timestamp: &timestamp,
            severity: entry.severity.as_str(),
        },
    );

    sqlx::query(
        "INSERT INTO audit_logs (id, user_id, action, resource_type, resource_id, metadata, timestamp, severity, prev_hash, hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(entry.user_id)
    .bind(&entry.action)
    .bind(&entry.resource_type)
    .bind(entry.resource_id)
    .bind(&metadata)
    .bind(&timestamp)
    .bind(entry.severity.as_str())
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        target: "audit",
        user_id = %entry.user_id,
        action = %entry.action,
        resource_type = %entry.resource_type,
        resource_id = ?entry.resource_id,
        severity = entry.severity.as_str(),
        metadata = metadata.as_deref().unwrap_or("-"),
        "audit entry recorded"
    );

    Ok(hash)
}

/// Shorthand for [`append`] with [`NewAuditEntry::for_entity`].
pub async fn record<T: Loggable>(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    action: &str,
    entity: &T,
    metadata: Option<Value>,
) -> AppResult<String> {
    append(conn, NewAuditEntry::for_entity(user_id, action, entity, metadata)).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub entries: u64,
    /// `seq` of the first entry whose link or hash does not match.
    pub first_broken: Option<i64>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

#[derive(Debug, FromRow)]
struct ChainRow {
    seq: i64,
    id: Uuid,
    user_id: Uuid,
    action: String,
    resource_type: String,
    resource_id: Option<Uuid>,
    metadata: Option<String>,
    timestamp: String,
    severity: String,
    prev_hash: Option<String>,
    hash: String,
}

/// Recomputes every link of the chain in `seq` order.
pub async fn verify_chain(pool: &SqlitePool) -> AppResult<ChainReport> {
    let rows = sqlx::query_as::<_, ChainRow>(
        "SELECT seq, id, user_id, action, resource_type, resource_id, metadata, timestamp, severity, prev_hash, hash \
         FROM audit_logs ORDER BY seq ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut expected_prev: Option<String> = None;
    let mut entries = 0;

    for row in rows {
        entries += 1;
        let recomputed = chain_hash(
            expected_prev.as_deref(),
            &ChainFields {
                id: row.id,
                user_id: row.user_id,
                action: &row.action,
                resource_type: &row.resource_type,
                resource_id: row.resource_id,
                metadata: row.metadata.as_deref(),
                timestamp: &row.timestamp,
                severity: &row.severity,
            },
        );

        if row.prev_hash != expected_prev || row.hash != recomputed {
            tracing::error!(seq = row.seq, "audit chain broken");
            return Ok(ChainReport {
                entries,
                first_broken: Some(row.seq),
            });
        }
        expected_prev = Some(row.hash);
    }

    Ok(ChainReport {
        entries,
        first_broken: None,
    })
}

struct ChainFields<'a> {
    id: Uuid,
    user_id: Uuid,
    action: &'a str,
    resource_type: &'a str,
    resource_id: Option<Uuid>,
    metadata: Option<&'a str>,
    timestamp: &'a str,
    severity: &'a str,
}

// sha256(prev_hash || canonical json). serde_json maps are key-sorted.
fn chain_hash(prev_hash: Option<&str>, fields: &ChainFields<'_>) -> String {
    let canonical = json!({
        "id": fields.id.to_string(),
        "user_id": fields.user_id.to_string(),
        "action": fields.action,
        "resource_type": fields.resource_type,
        "resource_id": fields.resource_id.map(|id| id.to_string()),
        "metadata": fields.metadata,
        "timestamp": fields.timestamp,
        "severity": fields.severity,
    });

    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(id: Uuid, user: Uuid, ts: &'a str) -> ChainFields<'a> {
        ChainFields {
            id,
            user_id: user,
            action: "task.create",
            resource_type: "task",
            resource_id: None,
            metadata: Some(r#"{"title":"x"}"#),
            timestamp: ts,
            severity: "important",
        }
    }

    #[test]
    fn hash_depends_on_previous_link() {
        let id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let f = fields(id, user, "2025-01-01T00:00:00.000000Z");

        let genesis = chain_hash(None, &f);
        let linked = chain_hash(Some(&genesis), &f);
        assert_ne!(genesis, linked);
        assert_eq!(genesis, chain_hash(None, &f));
        assert_eq!(genesis.len(), 64);
    }

    #[test]
    fn severity_escalates_on_delete() {
        #[derive(serde::Serialize)]
        struct Thing(Uuid);
        impl Loggable for Thing {
            fn entity_type() -> &'static str { "thing" }
            fn subject_id(&self) -> Uuid { self.0 }
        }

        let thing = Thing(Uuid::new_v4());
        assert_eq!(thing.severity_for_action("delete"), Severity::Critical);
        assert_eq!(thing.severity_for_action("create"), Severity::Important);

        let entry = NewAuditEntry::for_entity(Uuid::new_v4(), "delete", &thing, None);
        assert_eq!(entry.action, "thing.delete");
        assert_eq!(entry.resource_type, "thing");
        assert_eq!(entry.resource_id, Some(thing.0));
    }
}
