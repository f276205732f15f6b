//! Role and assignment repositories.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use trustgate::error::{Error, TgResult};
use trustgate::store::{Assignment, AssignmentRepo, RoleDefinition, RoleRepo, RoleScope};
use trustgate::types::{Timestamp, UserId};

use crate::{decode_list, encode_list, map_db_err, map_row, map_rows, SqliteStore};

fn role_from_row(row: SqliteRow) -> Result<RoleDefinition, sqlx::Error> {
	let scope: String = row.try_get("scope")?;
	let scope =
		RoleScope::parse(&scope).map_err(|err| sqlx::Error::Decode(err.to_string().into()))?;
	let permissions_raw: String = row.try_get("permissions")?;
	Ok(RoleDefinition {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		scope,
		permissions: decode_list(&permissions_raw)?,
	})
}

fn assignment_from_row(row: SqliteRow) -> Result<Assignment, sqlx::Error> {
	let scope: String = row.try_get("scope")?;
	let scope =
		RoleScope::parse(&scope).map_err(|err| sqlx::Error::Decode(err.to_string().into()))?;
	Ok(Assignment {
		id: row.try_get("id")?,
		user_id: UserId(row.try_get("user_id")?),
		role_id: row.try_get("role_id")?,
		scope,
		scope_context_id: row.try_get("scope_context_id")?,
		granted_at: Timestamp(row.try_get("granted_at")?),
		granted_by: row.try_get::<Option<String>, _>("granted_by")?.map(UserId),
	})
}

#[async_trait]
impl RoleRepo for SqliteStore {
	async fn upsert(&self, role: &RoleDefinition) -> TgResult<()> {
		sqlx::query(
			"INSERT INTO roles (id, name, scope, permissions)
			VALUES (?, ?, ?, ?)
			ON CONFLICT(id) DO NOTHING",
		)
		.bind(&role.id)
		.bind(&role.name)
		.bind(role.scope.as_str())
		.bind(encode_list(&role.permissions)?)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "role"))?;
		Ok(())
	}

	async fn read(&self, id: &str) -> TgResult<RoleDefinition> {
		let row = sqlx::query("SELECT * FROM roles WHERE id = ?")
			.bind(id)
			.fetch_one(self.pool())
			.await;
		map_row(row, role_from_row)
	}

	async fn read_by_name(&self, name: &str) -> TgResult<RoleDefinition> {
		let row = sqlx::query("SELECT * FROM roles WHERE name = ?")
			.bind(name)
			.fetch_one(self.pool())
			.await;
		map_row(row, role_from_row)
	}

	async fn list(&self) -> TgResult<Vec<RoleDefinition>> {
		let rows = sqlx::query("SELECT * FROM roles ORDER BY name").fetch_all(self.pool()).await;
		map_rows(rows, role_from_row)
	}
}

#[async_trait]
impl AssignmentRepo for SqliteStore {
	async fn create(&self, assignment: &Assignment) -> TgResult<()> {
		assignment.validate()?;
		sqlx::query(
			"INSERT INTO assignments
				(id, user_id, role_id, scope, scope_context_id, granted_at, granted_by)
			VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&assignment.id)
		.bind(&assignment.user_id.0)
		.bind(&assignment.role_id)
		.bind(assignment.scope.as_str())
		.bind(assignment.scope_context_id.as_deref())
		.bind(assignment.granted_at.0)
		.bind(assignment.granted_by.as_ref().map(|u| u.0.as_str()))
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "assignment"))?;
		Ok(())
	}

	async fn delete(
		&self,
		user_id: &UserId,
		role_id: &str,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<()> {
		let res = sqlx::query(
			"DELETE FROM assignments
				WHERE user_id = ? AND role_id = ? AND scope = ?
				AND scope_context_id IS ?",
		)
		.bind(&user_id.0)
		.bind(role_id)
		.bind(scope.as_str())
		.bind(scope_context_id)
		.execute(self.pool())
		.await
		.map_err(|err| map_db_err(err, "assignment"))?;
		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn list_for_user(&self, user_id: &UserId) -> TgResult<Vec<Assignment>> {
		let rows = sqlx::query("SELECT * FROM assignments WHERE user_id = ? ORDER BY granted_at")
			.bind(&user_id.0)
			.fetch_all(self.pool())
			.await;
		map_rows(rows, assignment_from_row)
	}

	async fn list_for_context(
		&self,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<Vec<Assignment>> {
		let rows = sqlx::query(
			"SELECT * FROM assignments
				WHERE scope = ? AND scope_context_id IS ?
				ORDER BY granted_at",
		)
		.bind(scope.as_str())
		.bind(scope_context_id)
		.fetch_all(self.pool())
		.await;
		map_rows(rows, assignment_from_row)
	}

	async fn list_for_role(&self, role_id: &str) -> TgResult<Vec<Assignment>> {
		let rows = sqlx::query("SELECT * FROM assignments WHERE role_id = ? ORDER BY granted_at")
			.bind(role_id)
			.fetch_all(self.pool())
			.await;
		map_rows(rows, assignment_from_row)
	}
}

// vim: ts=4
