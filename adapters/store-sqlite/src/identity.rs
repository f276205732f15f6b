//! Identity and credential repositories.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{Credential, Identity, IdentityRepo, CredentialRepo};
use trustgate::types::{TenantId, Timestamp, UserId};

use crate::{map_db_err, map_row, map_rows, SqliteStore};

fn identity_from_row(row: SqliteRow) -> Result<Identity, sqlx::Error> {
	let profile_raw: String = row.try_get("profile")?;
	let profile = serde_json::from_str(&profile_raw)
		.map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
	Ok(Identity {
		id: UserId(row.try_get("id")?),
		tenant_id: row.try_get::<Option<String>, _>("tenant_id")?.map(TenantId),
		email: row.try_get("email")?,
		email_verified: row.try_get::<i64, _>("email_verified")? != 0,
		profile,
		failed_login_attempts: row.try_get("failed_login_attempts")?,
		locked_until: row.try_get::<Option<i64>, _>("locked_until")?.map(Timestamp),
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
		deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?.map(Timestamp),
	})
}

#[async_trait]
impl IdentityRepo for SqliteStore {
	async fn create(&self, identity: &Identity) -> TgResult<()> {
		let profile = serde_json::to_string(&identity.profile).map_err(|_| Error::DbError)?;
		sqlx::query(
			"INSERT INTO identities
				(id, tenant_id, email, email_verified, profile, failed_login_attempts,
				 locked_until, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&identity.id.0)
		.bind(identity.tenant_id.as_ref().map(|t| t.0.as_str()))
		.bind(&identity.email)
		.bind(i64::from(identity.email_verified))
		.bind(profile)
		.bind(identity.failed_login_attempts)
		.bind(identity.locked_until.map(|t| t.0))
		.bind(identity.created_at.0)
		.bind(identity.updated_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "identity"))?;
		Ok(())
	}

	async fn read(&self, id: &UserId) -> TgResult<Identity> {
		let row = sqlx::query("SELECT * FROM identities WHERE id = ? AND deleted_at IS NULL")
			.bind(&id.0)
			.fetch_one(self.pool())
			.await;
		map_row(row, identity_from_row)
	}

	async fn read_by_email(&self, tenant_id: Option<&TenantId>, email: &str) -> TgResult<Identity> {
		let row = match tenant_id {
			Some(tenant) => {
				sqlx::query(
					"SELECT * FROM identities
						WHERE tenant_id = ? AND email = ? AND deleted_at IS NULL",
				)
				.bind(&tenant.0)
				.bind(email)
				.fetch_one(self.pool())
				.await
			}
			// Global lookup: platform operators first, then oldest record
			None => {
				sqlx::query(
					"SELECT * FROM identities
						WHERE email = ? AND deleted_at IS NULL
						ORDER BY (tenant_id IS NOT NULL), created_at
						LIMIT 1",
				)
				.bind(email)
				.fetch_one(self.pool())
				.await
			}
		};
		map_row(row, identity_from_row)
	}

	async fn update(&self, identity: &Identity) -> TgResult<()> {
		let profile = serde_json::to_string(&identity.profile).map_err(|_| Error::DbError)?;
		let res = sqlx::query(
			"UPDATE identities SET
				email = ?, email_verified = ?, profile = ?, failed_login_attempts = ?,
				locked_until = ?, updated_at = ?
			WHERE id = ? AND deleted_at IS NULL",
		)
		.bind(&identity.email)
		.bind(i64::from(identity.email_verified))
		.bind(profile)
		.bind(identity.failed_login_attempts)
		.bind(identity.locked_until.map(|t| t.0))
		.bind(identity.updated_at.0)
		.bind(&identity.id.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "identity"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<Identity>> {
		let rows = sqlx::query(
			"SELECT * FROM identities
				WHERE tenant_id = ? AND deleted_at IS NULL
				ORDER BY created_at",
		)
		.bind(&tenant_id.0)
		.fetch_all(self.pool())
		.await;
		map_rows(rows, identity_from_row)
	}

	async fn soft_delete(&self, id: &UserId, at: Timestamp) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE identities SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
		)
		.bind(at.0)
		.bind(&id.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "identity"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}
}

#[async_trait]
impl CredentialRepo for SqliteStore {
	async fn upsert(&self, credential: &Credential) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO credentials (user_id, password_hash, updated_at)
			VALUES (?, ?, ?)
			ON CONFLICT(user_id) DO UPDATE SET
				password_hash = excluded.password_hash,
				updated_at = excluded.updated_at",
		)
		.bind(&credential.user_id.0)
		.bind(&credential.password_hash)
		.bind(credential.updated_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "credential"))?;
		Ok(())
	}

	async fn read(&self, user_id: &UserId) -> TgResult<Credential> {
		let row = sqlx::query("SELECT * FROM credentials WHERE user_id = ?")
			.bind(&user_id.0)
			.fetch_one(self.pool())
			.await;
		map_row(row, |row| {
			Ok(Credential {
				user_id: UserId(row.try_get("user_id")?),
				password_hash: row.try_get("password_hash")?,
				updated_at: Timestamp(row.try_get("updated_at")?),
			})
		})
	}
}

// vim: ts=4
