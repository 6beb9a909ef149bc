use std::time::Duration;

use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::authz::AccessScope;
use crate::errors::{AppError, AppResult};

pub async fn init() -> anyhow::Result<SqlitePool> {
	let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

	let options: SqliteConnectOptions = database_url
		.parse::<SqliteConnectOptions>()
		.context("invalid DATABASE_URL")?
		.create_if_missing(true)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

/// A transaction opened with `BEGIN IMMEDIATE`.
///
/// The write lock is taken before the first statement, so a check-then-write
/// sequence never has to upgrade a read lock. Concurrent writers queue on the
/// busy timeout instead of failing with `SQLITE_BUSY` mid-transaction.
///
/// Dropping without [`commit`](Self::commit) closes the connection, which
/// makes SQLite roll the transaction back.
pub struct WriteTransaction {
	conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
	pub async fn begin(pool: &SqlitePool) -> AppResult<Self> {
		let mut conn = pool.acquire().await?;
		sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
		Ok(Self { conn: Some(conn) })
	}

	pub fn conn(&mut self) -> AppResult<&mut SqliteConnection> {
		self.conn
			.as_deref_mut()
			.ok_or_else(|| AppError::internal("write transaction already finished"))
	}

	pub async fn commit(mut self) -> AppResult<()> {
		let Some(mut conn) = self.conn.take() else {
			return Ok(());
		};
		match sqlx::query("COMMIT").execute(&mut *conn).await {
			Ok(_) => Ok(()),
			Err(err) => {
				drop(conn.detach());
				Err(err.into())
			}
		}
	}
}

impl Drop for WriteTransaction {
	fn drop(&mut self) {
		if let Some(conn) = self.conn.take() {
			tracing::debug!("write transaction abandoned, closing connection");
			drop(conn.detach());
		}
	}
}

/// Appends ` AND <column> IN (...)` for a restricted scope. An empty scope
/// appends a predicate that matches nothing; `Unrestricted` appends nothing.
pub fn push_scope_filter(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, scope: &AccessScope) {
	let AccessScope::Organizations(ids) = scope else {
		return;
	};

	if ids.is_empty() {
		builder.push(" AND 1 = 0");
		return;
	}

	builder.push(" AND ").push(column).push(" IN (");
	let mut separated = builder.separated(", ");
	for id in ids {
		separated.push_bind(*id);
	}
	separated.push_unseparated(")");
}
