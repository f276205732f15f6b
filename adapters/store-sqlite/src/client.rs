//! OAuth2 client repository.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{ClientRepo, OAuth2Client};
use trustgate::types::{TenantId, Timestamp};

use crate::{decode_list, encode_list, map_db_err, map_row, map_rows, SqliteStore};

fn client_from_row(row: SqliteRow) -> Result<OAuth2Client, sqlx::Error> {
	let redirect_uris: String = row.try_get("redirect_uris")?;
	let allowed_scopes: String = row.try_get("allowed_scopes")?;
	let grant_types: String = row.try_get("grant_types")?;
	let response_types: String = row.try_get("response_types")?;
	Ok(OAuth2Client {
		id: row.try_get("id")?,
		client_id: row.try_get("client_id")?,
		tenant_id: TenantId(row.try_get("tenant_id")?),
		client_secret_hash: row.try_get("client_secret_hash")?,
		name: row.try_get("name")?,
		redirect_uris: decode_list(&redirect_uris)?,
		allowed_scopes: decode_list(&allowed_scopes)?,
		grant_types: decode_list(&grant_types)?,
		response_types: decode_list(&response_types)?,
		token_endpoint_auth_method: row.try_get("token_endpoint_auth_method")?,
		access_token_ttl: row.try_get("access_token_ttl")?,
		refresh_token_ttl: row.try_get("refresh_token_ttl")?,
		id_token_ttl: row.try_get("id_token_ttl")?,
		is_active: row.try_get::<i64, _>("is_active")? != 0,
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
		deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?.map(Timestamp),
	})
}

#[async_trait]
impl ClientRepo for SqliteStore {
	async fn create(&self, client: &OAuth2Client) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO oauth2_clients
				(id, client_id, tenant_id, client_secret_hash, name, redirect_uris,
				 allowed_scopes, grant_types, response_types, token_endpoint_auth_method,
				 access_token_ttl, refresh_token_ttl, id_token_ttl, is_active,
				 created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&client.id)
		.bind(&client.client_id)
		.bind(&client.tenant_id.0)
		.bind(client.client_secret_hash.as_deref())
		.bind(&client.name)
		.bind(encode_list(&client.redirect_uris)?)
		.bind(encode_list(&client.allowed_scopes)?)
		.bind(encode_list(&client.grant_types)?)
		.bind(encode_list(&client.response_types)?)
		.bind(&client.token_endpoint_auth_method)
		.bind(client.access_token_ttl)
		.bind(client.refresh_token_ttl)
		.bind(client.id_token_ttl)
		.bind(i64::from(client.is_active))
		.bind(client.created_at.0)
		.bind(client.updated_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "client"))?;
		Ok(())
	}

	async fn read_by_client_id(&self, client_id: &str) -> TgResult<OAuth2Client> {
		let row = sqlx::query(
			"SELECT * FROM oauth2_clients WHERE client_id = ? AND deleted_at IS NULL",
		)
		.bind(client_id)
		.fetch_one(self.pool())
		.await;
		map_row(row, client_from_row)
	}

	async fn read(&self, tenant_id: &TenantId, client_id: &str) -> TgResult<OAuth2Client> {
		let row = sqlx::query(
			"SELECT * FROM oauth2_clients
				WHERE tenant_id = ? AND client_id = ? AND deleted_at IS NULL",
		)
		.bind(&tenant_id.0)
		.bind(client_id)
		.fetch_one(self.pool())
		.await;
		map_row(row, client_from_row)
	}

	async fn update(&self, client: &OAuth2Client) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE oauth2_clients SET
				client_secret_hash = ?, name = ?, redirect_uris = ?, allowed_scopes = ?,
				grant_types = ?, response_types = ?, token_endpoint_auth_method = ?,
				access_token_ttl = ?, refresh_token_ttl = ?, id_token_ttl = ?,
				is_active = ?, updated_at = ?
			WHERE client_id = ? AND tenant_id = ? AND deleted_at IS NULL",
		)
		.bind(client.client_secret_hash.as_deref())
		.bind(&client.name)
		.bind(encode_list(&client.redirect_uris)?)
		.bind(encode_list(&client.allowed_scopes)?)
		.bind(encode_list(&client.grant_types)?)
		.bind(encode_list(&client.response_types)?)
		.bind(&client.token_endpoint_auth_method)
		.bind(client.access_token_ttl)
		.bind(client.refresh_token_ttl)
		.bind(client.id_token_ttl)
		.bind(i64::from(client.is_active))
		.bind(client.updated_at.0)
		.bind(&client.client_id)
		.bind(&client.tenant_id.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "client"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<OAuth2Client>> {
		let rows = sqlx::query(
			"SELECT * FROM oauth2_clients
				WHERE tenant_id = ? AND deleted_at IS NULL
				ORDER BY created_at",
		)
		.bind(&tenant_id.0)
		.fetch_all(self.pool())
		.await;
		map_rows(rows, client_from_row)
	}

	async fn soft_delete(
		&self,
		tenant_id: &TenantId,
		client_id: &str,
		at: Timestamp,
	) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE oauth2_clients SET deleted_at = ?, is_active = 0
				WHERE tenant_id = ? AND client_id = ? AND deleted_at IS NULL",
		)
		.bind(at.0)
		.bind(&tenant_id.0)
		.bind(client_id)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "client"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}
}

// vim: ts=4
