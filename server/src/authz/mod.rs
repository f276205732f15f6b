//! Role-based authorization.
//!
//! Assignments are the only carrier of privilege. Evaluation is
//! deterministic and side-effect free: any single matching assignment whose
//! role grants the permission suffices, denial is the default.

use crate::prelude::*;
use crate::store::{RoleDefinition, RoleScope, Store};

// Permission vocabulary, `<domain>:<verb>`.
pub const PERM_ALL: &str = "*";
pub const PLATFORM_MANAGE_TENANTS: &str = "platform:manage_tenants";
pub const TENANT_READ: &str = "tenant:read";
pub const TENANT_MANAGE_USERS: &str = "tenant:manage_users";
pub const TENANT_MANAGE_CLIENTS: &str = "tenant:manage_clients";

// Seeded role names. Tenant role grants are restricted to the tenant_* set.
pub const ROLE_PLATFORM_ADMIN: &str = "platform_admin";
pub const ROLE_TENANT_OWNER: &str = "tenant_owner";
pub const ROLE_TENANT_ADMIN: &str = "tenant_admin";
pub const ROLE_TENANT_MEMBER: &str = "tenant_member";

/// Role names assignable through the tenant role API.
pub const ASSIGNABLE_TENANT_ROLES: &[&str] =
	&[ROLE_TENANT_OWNER, ROLE_TENANT_ADMIN, ROLE_TENANT_MEMBER];

/// The seeded role catalog. Ids are stable so re-seeding is idempotent.
pub fn seed_roles() -> Vec<RoleDefinition> {
	vec![
		RoleDefinition {
			id: "role_platform_admin".into(),
			name: ROLE_PLATFORM_ADMIN.into(),
			scope: RoleScope::Platform,
			permissions: vec![PERM_ALL.into()],
		},
		RoleDefinition {
			id: "role_tenant_owner".into(),
			name: ROLE_TENANT_OWNER.into(),
			scope: RoleScope::Tenant,
			permissions: vec![PERM_ALL.into()],
		},
		RoleDefinition {
			id: "role_tenant_admin".into(),
			name: ROLE_TENANT_ADMIN.into(),
			scope: RoleScope::Tenant,
			permissions: vec![
				TENANT_READ.into(),
				TENANT_MANAGE_USERS.into(),
				TENANT_MANAGE_CLIENTS.into(),
			],
		},
		RoleDefinition {
			id: "role_tenant_member".into(),
			name: ROLE_TENANT_MEMBER.into(),
			scope: RoleScope::Tenant,
			permissions: vec![TENANT_READ.into()],
		},
	]
}

#[derive(Clone, Debug)]
pub struct AuthzService {
	store: Store,
}

impl AuthzService {
	pub fn new(store: Store) -> Self {
		Self { store }
	}

	/// Evaluate `(actor, scope, scope-context, permission)`.
	///
	/// An assignment matches when it is platform-scoped (platform authority
	/// satisfies any query) or when its scope and scope context equal the
	/// query's. Cross-tenant requests fail structurally: a tenant-scoped
	/// assignment for tenant A never matches a query for tenant B.
	pub async fn has_permission(
		&self,
		actor_id: &UserId,
		scope: RoleScope,
		scope_context_id: Option<&str>,
		permission: &str,
	) -> TgResult<bool> {
		let assignments = self.store.assignments.list_for_user(actor_id).await?;
		for assignment in assignments {
			let matches = assignment.scope == RoleScope::Platform
				|| (assignment.scope == scope
					&& assignment.scope_context_id.as_deref() == scope_context_id);
			if !matches {
				continue;
			}
			let role = match self.store.roles.read(&assignment.role_id).await {
				Ok(role) => role,
				// A dangling role id must not grant anything
				Err(Error::NotFound) => continue,
				Err(err) => return Err(err),
			};
			if role.permissions.iter().any(|p| p == PERM_ALL || p == permission) {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// True when the actor may use the control-plane login: platform tenant
	/// management anywhere, or user management within some tenant.
	pub async fn may_use_control_plane(&self, actor_id: &UserId) -> TgResult<bool> {
		let assignments = self.store.assignments.list_for_user(actor_id).await?;
		for assignment in assignments {
			let role = match self.store.roles.read(&assignment.role_id).await {
				Ok(role) => role,
				Err(Error::NotFound) => continue,
				Err(err) => return Err(err),
			};
			let grants = |perm: &str| role.permissions.iter().any(|p| p == PERM_ALL || p == perm);
			match assignment.scope {
				RoleScope::Platform if grants(PLATFORM_MANAGE_TENANTS) => return Ok(true),
				RoleScope::Tenant if grants(TENANT_MANAGE_USERS) => return Ok(true),
				_ => {}
			}
		}
		Ok(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::memory::MemoryStore;
	use crate::store::Assignment;

	async fn seeded_store() -> Store {
		let store = MemoryStore::new().store();
		for role in seed_roles() {
			store.roles.upsert(&role).await.expect("seed");
		}
		store
	}

	async fn assign(store: &Store, user: &str, role_id: &str, scope: RoleScope, ctx: Option<&str>) {
		store
			.assignments
			.create(&Assignment {
				id: crate::core::utils::new_uuid(),
				user_id: user.into(),
				role_id: role_id.into(),
				scope,
				scope_context_id: ctx.map(str::to_string),
				granted_at: Timestamp::now(),
				granted_by: None,
			})
			.await
			.expect("assign");
	}

	#[tokio::test]
	async fn platform_role_satisfies_any_scope() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store.clone());
		assign(&store, "admin", "role_platform_admin", RoleScope::Platform, None).await;

		assert!(authz
			.has_permission(&"admin".into(), RoleScope::Platform, None, PLATFORM_MANAGE_TENANTS)
			.await
			.expect("eval"));
		assert!(authz
			.has_permission(&"admin".into(), RoleScope::Tenant, Some("t1"), TENANT_MANAGE_USERS)
			.await
			.expect("eval"));
	}

	#[tokio::test]
	async fn tenant_admin_is_confined_to_its_tenant() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store.clone());
		assign(&store, "uA", "role_tenant_admin", RoleScope::Tenant, Some("A")).await;

		assert!(authz
			.has_permission(&"uA".into(), RoleScope::Tenant, Some("A"), TENANT_MANAGE_USERS)
			.await
			.expect("eval"));
		// Structurally denied for tenant B
		assert!(!authz
			.has_permission(&"uA".into(), RoleScope::Tenant, Some("B"), TENANT_MANAGE_USERS)
			.await
			.expect("eval"));
	}

	#[tokio::test]
	async fn member_lacks_management_permission() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store.clone());
		assign(&store, "u1", "role_tenant_member", RoleScope::Tenant, Some("t1")).await;

		assert!(authz
			.has_permission(&"u1".into(), RoleScope::Tenant, Some("t1"), TENANT_READ)
			.await
			.expect("eval"));
		assert!(!authz
			.has_permission(&"u1".into(), RoleScope::Tenant, Some("t1"), TENANT_MANAGE_USERS)
			.await
			.expect("eval"));
	}

	#[tokio::test]
	async fn no_assignments_means_denied() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store);
		assert!(!authz
			.has_permission(&"ghost".into(), RoleScope::Platform, None, PLATFORM_MANAGE_TENANTS)
			.await
			.expect("eval"));
	}

	#[tokio::test]
	async fn wildcard_grants_arbitrary_permission() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store.clone());
		assign(&store, "owner", "role_tenant_owner", RoleScope::Tenant, Some("t1")).await;
		assert!(authz
			.has_permission(&"owner".into(), RoleScope::Tenant, Some("t1"), "tenant:anything_new")
			.await
			.expect("eval"));
	}

	#[tokio::test]
	async fn control_plane_gate() {
		let store = seeded_store().await;
		let authz = AuthzService::new(store.clone());
		assign(&store, "member", "role_tenant_member", RoleScope::Tenant, Some("t1")).await;
		assign(&store, "tadmin", "role_tenant_admin", RoleScope::Tenant, Some("t1")).await;
		assign(&store, "padmin", "role_platform_admin", RoleScope::Platform, None).await;

		assert!(!authz.may_use_control_plane(&"member".into()).await.expect("eval"));
		assert!(authz.may_use_control_plane(&"tadmin".into()).await.expect("eval"));
		assert!(authz.may_use_control_plane(&"padmin".into()).await.expect("eval"));
	}
}

// vim: ts=4
