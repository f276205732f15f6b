//! Authorization-code, access-token and refresh-token repositories.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{
	AccessToken, AccessTokenRepo, AuthCodeRepo, AuthorizationCode, CodeChallengeMethod,
	RefreshToken, RefreshTokenRepo,
};
use trustgate::types::{TenantId, Timestamp, UserId};

use crate::{map_db_err, map_row, SqliteStore};

fn code_from_row(row: SqliteRow) -> Result<AuthorizationCode, sqlx::Error> {
	let method: Option<String> = row.try_get("code_challenge_method")?;
	let code_challenge_method = match method.as_deref() {
		Some(raw) => Some(CodeChallengeMethod::parse(raw).ok_or_else(|| {
			sqlx::Error::Decode(format!("unknown code challenge method: {}", raw).into())
		})?),
		None => None,
	};
	Ok(AuthorizationCode {
		code: row.try_get("code")?,
		client_id: row.try_get("client_id")?,
		user_id: UserId(row.try_get("user_id")?),
		redirect_uri: row.try_get("redirect_uri")?,
		scope: row.try_get("scope")?,
		state: row.try_get("state")?,
		nonce: row.try_get("nonce")?,
		code_challenge: row.try_get("code_challenge")?,
		code_challenge_method,
		expires_at: Timestamp(row.try_get("expires_at")?),
		is_used: row.try_get::<i64, _>("is_used")? != 0,
		used_at: row.try_get::<Option<i64>, _>("used_at")?.map(Timestamp),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

fn access_token_from_row(row: SqliteRow) -> Result<AccessToken, sqlx::Error> {
	Ok(AccessToken {
		id: row.try_get("id")?,
		token_hash: row.try_get("token_hash")?,
		tenant_id: TenantId(row.try_get("tenant_id")?),
		client_id: row.try_get("client_id")?,
		user_id: UserId(row.try_get("user_id")?),
		scope: row.try_get("scope")?,
		expires_at: Timestamp(row.try_get("expires_at")?),
		is_revoked: row.try_get::<i64, _>("is_revoked")? != 0,
		revoked_at: row.try_get::<Option<i64>, _>("revoked_at")?.map(Timestamp),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

fn refresh_token_from_row(row: SqliteRow) -> Result<RefreshToken, sqlx::Error> {
	Ok(RefreshToken {
		id: row.try_get("id")?,
		token_hash: row.try_get("token_hash")?,
		access_token_id: row.try_get("access_token_id")?,
		tenant_id: TenantId(row.try_get("tenant_id")?),
		client_id: row.try_get("client_id")?,
		user_id: UserId(row.try_get("user_id")?),
		scope: row.try_get("scope")?,
		expires_at: Timestamp(row.try_get("expires_at")?),
		is_revoked: row.try_get::<i64, _>("is_revoked")? != 0,
		revoked_at: row.try_get::<Option<i64>, _>("revoked_at")?.map(Timestamp),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

#[async_trait]
impl AuthCodeRepo for SqliteStore {
	async fn create(&self, code: &AuthorizationCode) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO authorization_codes
				(code, client_id, user_id, redirect_uri, scope, state, nonce,
				 code_challenge, code_challenge_method, expires_at, is_used, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&code.code)
		.bind(&code.client_id)
		.bind(&code.user_id.0)
		.bind(&code.redirect_uri)
		.bind(&code.scope)
		.bind(code.state.as_deref())
		.bind(code.nonce.as_deref())
		.bind(code.code_challenge.as_deref())
		.bind(code.code_challenge_method.map(|m| m.as_str()))
		.bind(code.expires_at.0)
		.bind(i64::from(code.is_used))
		.bind(code.created_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "authorization code"))?;
		Ok(())
	}

	async fn read(&self, code: &str) -> TgResult<AuthorizationCode> {
		let row = sqlx::query("SELECT * FROM authorization_codes WHERE code = ?")
			.bind(code)
			.fetch_one(self.pool())
			.await;
		map_row(row, code_from_row)
	}

	async fn mark_used(&self, code: &str, used_at: Timestamp) -> TgResult<bool> {
		// The is_used predicate makes concurrent exchanges race on the
		// row update; the affected-row count tells who won
		let res = sqlx::query(
			"UPDATE authorization_codes SET is_used = 1, used_at = ?
				WHERE code = ? AND is_used = 0",
		)
		.bind(used_at.0)
		.bind(code)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "authorization code"))?;
		if res.rows_affected() == 1 {
			return Ok(true);
		}
		// Distinguish "already used" from "no such code"
		let _ = AuthCodeRepo::read(self, code).await?;
		Ok(false)
	}
}

#[async_trait]
impl AccessTokenRepo for SqliteStore {
	async fn create(&self, token: &AccessToken) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO access_tokens
				(id, token_hash, tenant_id, client_id, user_id, scope, expires_at,
				 is_revoked, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&token.id)
		.bind(&token.token_hash)
		.bind(&token.tenant_id.0)
		.bind(&token.client_id)
		.bind(&token.user_id.0)
		.bind(&token.scope)
		.bind(token.expires_at.0)
		.bind(i64::from(token.is_revoked))
		.bind(token.created_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "access token"))?;
		Ok(())
	}

	async fn read_by_hash(&self, token_hash: &str) -> TgResult<AccessToken> {
		let row = sqlx::query("SELECT * FROM access_tokens WHERE token_hash = ?")
			.bind(token_hash)
			.fetch_one(self.pool())
			.await;
		map_row(row, access_token_from_row)
	}

	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE access_tokens SET is_revoked = 1, revoked_at = ? WHERE id = ?",
		)
		.bind(at.0)
		.bind(id)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "access token"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}
}

#[async_trait]
impl RefreshTokenRepo for SqliteStore {
	async fn create(&self, token: &RefreshToken) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO refresh_tokens
				(id, token_hash, access_token_id, tenant_id, client_id, user_id, scope,
				 expires_at, is_revoked, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&token.id)
		.bind(&token.token_hash)
		.bind(&token.access_token_id)
		.bind(&token.tenant_id.0)
		.bind(&token.client_id)
		.bind(&token.user_id.0)
		.bind(&token.scope)
		.bind(token.expires_at.0)
		.bind(i64::from(token.is_revoked))
		.bind(token.created_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "refresh token"))?;
		Ok(())
	}

	async fn read_by_hash(&self, token_hash: &str) -> TgResult<RefreshToken> {
		let row = sqlx::query("SELECT * FROM refresh_tokens WHERE token_hash = ?")
			.bind(token_hash)
			.fetch_one(self.pool())
			.await;
		map_row(row, refresh_token_from_row)
	}

	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE refresh_tokens SET is_revoked = 1, revoked_at = ? WHERE id = ?",
		)
		.bind(at.0)
		.bind(id)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "refresh token"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}
}

// vim: ts=4
