//! Signing-key repository.

use async_trait::async_trait;
use sqlx::Row;

use trustgate::error::TgResult;
use trustgate::store::{SigningKey, SigningKeyRepo};
use trustgate::types::Timestamp;

use crate::{map_db_err, map_row, SqliteStore};

#[async_trait]
impl SigningKeyRepo for SqliteStore {
	async fn create(&self, key: &SigningKey) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO signing_keys
				(id, algorithm, public_key_pem, private_key_encrypted, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(&key.id)
		.bind(&key.algorithm)
		.bind(&key.public_key_pem)
		.bind(&key.private_key_encrypted)
		.bind(key.created_at.0)
		.bind(key.expires_at.map(|t| t.0))
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "signing key"))?;
		Ok(())
	}

	async fn read_current(&self) -> TgResult<SigningKey> {
		let now = Timestamp::now();
		let row = sqlx::query(
			"SELECT * FROM signing_keys
				WHERE expires_at IS NULL OR expires_at > ?
				ORDER BY created_at DESC
				LIMIT 1",
		)
		.bind(now.0)
		.fetch_one(self.pool())
		.await;
		map_row(row, |row| {
			Ok(SigningKey {
				id: row.try_get("id")?,
				algorithm: row.try_get("algorithm")?,
				public_key_pem: row.try_get("public_key_pem")?,
				private_key_encrypted: row.try_get("private_key_encrypted")?,
				created_at: Timestamp(row.try_get("created_at")?),
				expires_at: row.try_get::<Option<i64>, _>("expires_at")?.map(Timestamp),
			})
		})
	}
}

// vim: ts=4
