//! Tenant repository.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{Tenant, TenantRepo, TenantStatus};
use trustgate::types::{TenantId, Timestamp};

use crate::{map_db_err, map_row, map_rows, SqliteStore};

fn tenant_from_row(row: SqliteRow) -> Result<Tenant, sqlx::Error> {
	let status: String = row.try_get("status")?;
	let status = TenantStatus::parse(&status)
		.map_err(|err| sqlx::Error::Decode(err.to_string().into()))?;
	Ok(Tenant {
		id: TenantId(row.try_get("id")?),
		name: row.try_get("name")?,
		status,
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
	})
}

#[async_trait]
impl TenantRepo for SqliteStore {
	async fn create(&self, tenant: &Tenant) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO tenants (id, name, status, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)",
		)
		.bind(&tenant.id.0)
		.bind(&tenant.name)
		.bind(tenant.status.as_str())
		.bind(tenant.created_at.0)
		.bind(tenant.updated_at.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "tenant"))?;
		Ok(())
	}

	async fn read(&self, id: &TenantId) -> TgResult<Tenant> {
		let row = sqlx::query("SELECT * FROM tenants WHERE id = ?")
			.bind(&id.0)
			.fetch_one(self.pool())
			.await;
		map_row(row, tenant_from_row)
	}

	async fn update(&self, tenant: &Tenant) -> TgResult<()> {
		let res = sqlx::query(
			"UPDATE tenants SET name = ?, status = ?, updated_at = ? WHERE id = ?",
		)
		.bind(&tenant.name)
		.bind(tenant.status.as_str())
		.bind(tenant.updated_at.0)
		.bind(&tenant.id.0)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "tenant"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn list(&self) -> TgResult<Vec<Tenant>> {
		let rows = sqlx::query("SELECT * FROM tenants ORDER BY created_at")
			.fetch_all(self.pool())
			.await;
		map_rows(rows, tenant_from_row)
	}
}

// vim: ts=4
