//! Session repository.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{Session, SessionNamespace, SessionRepo};
use trustgate::types::{TenantId, Timestamp, UserId};

use crate::{map_db_err, map_row, SqliteStore};

fn session_from_row(row: SqliteRow) -> Result<Session, sqlx::Error> {
	let namespace: String = row.try_get("namespace")?;
	let namespace = SessionNamespace::parse(&namespace)
		.map_err(|err| sqlx::Error::Decode(err.to_string().into()))?;
	Ok(Session {
		id: row.try_get("id")?,
		tenant_id: row.try_get::<Option<String>, _>("tenant_id")?.map(TenantId),
		user_id: UserId(row.try_get("user_id")?),
		ip_address: row.try_get("ip_address")?,
		user_agent: row.try_get("user_agent")?,
		expires_at: Timestamp(row.try_get("expires_at")?),
		created_at: Timestamp(row.try_get("created_at")?),
		last_seen_at: Timestamp(row.try_get("last_seen_at")?),
		namespace,
	})
}

#[async_trait]
impl SessionRepo for SqliteStore {
	async fn create(&self, session: &Session) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO sessions
				(id, tenant_id, user_id, ip_address, user_agent, expires_at,
				 created_at, last_seen_at, namespace)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&session.id)
		.bind(session.tenant_id.as_ref().map(|t| t.0.as_str()))
		.bind(&session.user_id.0)
		.bind(&session.ip_address)
		.bind(&session.user_agent)
		.bind(session.expires_at.0)
		.bind(session.created_at.0)
		.bind(session.last_seen_at.0)
		.bind(session.namespace.as_str())
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "session"))?;
		Ok(())
	}

	async fn read(&self, id: &str) -> TgResult<Session> {
		let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
			.bind(id)
			.fetch_one(self.pool())
			.await;
		map_row(row, session_from_row)
	}

	async fn touch(&self, id: &str, last_seen_at: Timestamp) -> TgResult<()> {
		let res = sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
			.bind(last_seen_at.0)
			.bind(id)
			.execute(self.pool())
			.await
			.map_err(|err| map_db_err(err, "session"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn delete(&self, id: &str) -> TgResult<()> {
		sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id)
			.execute(self.pool())
			.await
			.map_err(|err| map_db_err(err, "session"))?;
		Ok(())
	}

	async fn delete_expired(&self, now: Timestamp) -> TgResult<u64> {
		let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
			.bind(now.0)
			.execute(self.pool())
			.await
			.map_err(|err| map_db_err(err, "session"))?;
		Ok(res.rows_affected())
	}
}

// vim: ts=4
