//! SQLite implementation of the Trustgate repository contracts.
//!
//! One pool, WAL journal, idempotent schema. Every tenant-scoped query
//! carries an explicit `tenant_id = ?` predicate and every read filters
//! soft-deleted rows.

use sqlx::sqlite::{self, SqlitePool, SqliteRow};
use std::path::Path;
use std::sync::Arc;

use trustgate::error::{Error, TgResult};
use trustgate::store::Store;
use trustgate::prelude::warn;

mod client;
mod identity;
mod role;
mod schema;
mod session;
mod signing_key;
mod tenant;
mod token;

/// # Helper functions

fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Translate a sqlx error into the domain taxonomy. `what` names the
/// entity for conflict messages.
pub(crate) fn map_db_err(err: sqlx::Error, what: &str) -> Error {
	match &err {
		sqlx::Error::RowNotFound => Error::NotFound,
		sqlx::Error::Database(db)
			if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
		{
			Error::AlreadyExists(what.to_string())
		}
		_ => {
			inspect(&err);
			Error::DbError
		}
	}
}

pub(crate) fn map_row<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> TgResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

pub(crate) fn map_rows<T, F>(rows: Result<Vec<SqliteRow>, sqlx::Error>, f: F) -> TgResult<Vec<T>>
where
	F: Fn(SqliteRow) -> Result<T, sqlx::Error>,
{
	let rows = rows.map_err(|err| {
		inspect(&err);
		Error::DbError
	})?;
	let mut items = Vec::with_capacity(rows.len());
	for row in rows {
		items.push(f(row).inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Serialize a string list column (JSON array text).
pub(crate) fn encode_list(items: &[String]) -> TgResult<String> {
	serde_json::to_string(items).map_err(|_| Error::DbError)
}

pub(crate) fn decode_list(raw: &str) -> Result<Vec<String>, sqlx::Error> {
	serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
	db: SqlitePool,
}

impl SqliteStore {
	pub async fn new(path: impl AsRef<Path>) -> TgResult<Self> {
		Self::new_with(path, 10, 2).await
	}

	pub async fn new_with(
		path: impl AsRef<Path>,
		max_open: u32,
		max_idle: u32,
	) -> TgResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.foreign_keys(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(max_open)
			.min_connections(max_idle.min(max_open))
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		schema::init_db(&db).await.inspect_err(inspect).map_err(|_| Error::DbError)?;

		Ok(Self { db })
	}

	pub(crate) fn pool(&self) -> &SqlitePool {
		&self.db
	}

	/// Apply the schema again; `CREATE TABLE IF NOT EXISTS` makes this a
	/// no-op on an up-to-date database.
	pub async fn migrate(&self) -> TgResult<()> {
		schema::init_db(&self.db).await.inspect_err(inspect).map_err(|_| Error::DbError)
	}

	/// Aggregate handle with every repository backed by this pool.
	pub fn store(&self) -> Store {
		let this = Arc::new(self.clone());
		Store {
			identities: this.clone(),
			credentials: this.clone(),
			sessions: this.clone(),
			tenants: this.clone(),
			roles: this.clone(),
			assignments: this.clone(),
			clients: this.clone(),
			auth_codes: this.clone(),
			access_tokens: this.clone(),
			refresh_tokens: this.clone(),
			signing_keys: this,
		}
	}
}

// vim: ts=4
