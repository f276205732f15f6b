//! Tenant lifecycle, scoped role grants and OAuth2 client management.
//!
//! Every mutation is audited with the granting actor; the creator of a
//! tenant is recorded in the audit trail, never as a column.

use serde_json::json;

use crate::audit::{AuditEvent, AuditKind, AuditLogger, ClientMeta};
use crate::authz::ASSIGNABLE_TENANT_ROLES;
use crate::core::utils::{new_uuid, random_token, sha256_b64url};
use crate::prelude::*;
use crate::store::{
	Assignment, Identity, OAuth2Client, RoleDefinition, RoleScope, Store, Tenant, TenantStatus,
};

pub mod handler;

/// Default token lifetimes for newly registered clients, in seconds.
const DEFAULT_ACCESS_TOKEN_TTL: i64 = 3600;
const DEFAULT_REFRESH_TOKEN_TTL: i64 = 30 * 86_400;
const DEFAULT_ID_TOKEN_TTL: i64 = 300;

/// Client secrets carry the same entropy as bearer tokens.
const CLIENT_SECRET_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct TenantService {
	store: Store,
	audit: AuditLogger,
}

/// Parameters for registering an OAuth2 client under a tenant.
#[derive(Clone, Debug)]
pub struct NewClient {
	pub name: String,
	pub redirect_uris: Vec<String>,
	pub allowed_scopes: Vec<String>,
	pub grant_types: Vec<String>,
	/// Confidential clients get a generated secret; public clients none
	pub confidential: bool,
}

impl TenantService {
	pub fn new(store: Store, audit: AuditLogger) -> Self {
		Self { store, audit }
	}

	pub async fn create_tenant(
		&self,
		name: &str,
		creator: &UserId,
		meta: &ClientMeta,
	) -> TgResult<Tenant> {
		let name = name.trim();
		if name.is_empty() {
			return Err(Error::ValidationError("tenant name must not be empty".into()));
		}
		let now = Timestamp::now();
		let tenant = Tenant {
			id: TenantId(new_uuid()),
			name: name.to_string(),
			status: TenantStatus::Active,
			created_at: now,
			updated_at: now,
		};
		self.store.tenants.create(&tenant).await?;
		self.audit.emit(
			AuditEvent::new(AuditKind::TenantCreated)
				.tenant(Some(tenant.id.clone()))
				.actor(creator.as_str())
				.resource("tenant")
				.client(meta)
				.metadata(json!({ "name": tenant.name })),
		);
		Ok(tenant)
	}

	pub async fn get_tenant(&self, tenant_id: &TenantId) -> TgResult<Tenant> {
		self.store.tenants.read(tenant_id).await
	}

	pub async fn list_tenants(&self) -> TgResult<Vec<Tenant>> {
		self.store.tenants.list().await
	}

	pub async fn set_status(&self, tenant_id: &TenantId, status: TenantStatus) -> TgResult<Tenant> {
		let mut tenant = self.store.tenants.read(tenant_id).await?;
		tenant.status = status;
		tenant.updated_at = Timestamp::now();
		self.store.tenants.update(&tenant).await?;
		Ok(tenant)
	}

	/// Grant a tenant-scoped role. The role name must come from the closed
	/// assignable set; the unique constraint turns duplicates into
	/// `AlreadyExists`.
	pub async fn assign_role(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
		role_name: &str,
		granter: &UserId,
		meta: &ClientMeta,
	) -> TgResult<Assignment> {
		if !ASSIGNABLE_TENANT_ROLES.contains(&role_name) {
			return Err(Error::ValidationError(format!("unknown tenant role: {}", role_name)));
		}
		// Both sides of the grant must exist
		self.store.tenants.read(tenant_id).await?;
		self.store.identities.read(user_id).await?;
		let role = self.store.roles.read_by_name(role_name).await?;

		let assignment = Assignment {
			id: new_uuid(),
			user_id: user_id.clone(),
			role_id: role.id.clone(),
			scope: RoleScope::Tenant,
			scope_context_id: Some(tenant_id.0.clone()),
			granted_at: Timestamp::now(),
			granted_by: Some(granter.clone()),
		};
		assignment.validate()?;
		self.store.assignments.create(&assignment).await?;

		self.audit.emit(
			AuditEvent::new(AuditKind::RoleAssigned)
				.tenant(Some(tenant_id.clone()))
				.actor(granter.as_str())
				.resource("role")
				.client(meta)
				.metadata(json!({ "targetUser": user_id.0, "role": role_name })),
		);
		Ok(assignment)
	}

	pub async fn revoke_role(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
		role_name: &str,
		granter: &UserId,
		meta: &ClientMeta,
	) -> TgResult<()> {
		let role = self.store.roles.read_by_name(role_name).await?;
		self.store
			.assignments
			.delete(user_id, &role.id, RoleScope::Tenant, Some(tenant_id.as_str()))
			.await?;
		self.audit.emit(
			AuditEvent::new(AuditKind::RoleRevoked)
				.tenant(Some(tenant_id.clone()))
				.actor(granter.as_str())
				.resource("role")
				.client(meta)
				.metadata(json!({ "targetUser": user_id.0, "role": role_name })),
		);
		Ok(())
	}

	/// Roles a user holds within a tenant, resolved to definitions.
	pub async fn user_roles(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
	) -> TgResult<Vec<RoleDefinition>> {
		let assignments = self.store.assignments.list_for_user(user_id).await?;
		let mut roles = Vec::new();
		for assignment in assignments {
			if assignment.scope == RoleScope::Tenant
				&& assignment.scope_context_id.as_deref() == Some(tenant_id.as_str())
			{
				match self.store.roles.read(&assignment.role_id).await {
					Ok(role) => roles.push(role),
					Err(Error::NotFound) => {}
					Err(err) => return Err(err),
				}
			}
		}
		Ok(roles)
	}

	/// Identities holding at least one role in the tenant.
	pub async fn tenant_users(&self, tenant_id: &TenantId) -> TgResult<Vec<Identity>> {
		let assignments = self
			.store
			.assignments
			.list_for_context(RoleScope::Tenant, Some(tenant_id.as_str()))
			.await?;
		let mut users = Vec::new();
		let mut seen = std::collections::HashSet::new();
		for assignment in assignments {
			if !seen.insert(assignment.user_id.0.clone()) {
				continue;
			}
			match self.store.identities.read(&assignment.user_id).await {
				Ok(identity) => users.push(identity),
				Err(Error::NotFound) => {}
				Err(err) => return Err(err),
			}
		}
		Ok(users)
	}

	// OAuth2 client management //
	//**************************//

	/// Register an OAuth2 client. Returns the client and, for confidential
	/// clients, the raw secret; the secret is shown exactly once and only
	/// its SHA-256 digest is stored.
	pub async fn create_client(
		&self,
		tenant_id: &TenantId,
		spec: NewClient,
		actor: &UserId,
		meta: &ClientMeta,
	) -> TgResult<(OAuth2Client, Option<String>)> {
		if spec.name.trim().is_empty() {
			return Err(Error::ValidationError("client name must not be empty".into()));
		}
		if spec.redirect_uris.is_empty() {
			return Err(Error::ValidationError("at least one redirect URI is required".into()));
		}
		for uri in &spec.redirect_uris {
			let parsed = url::Url::parse(uri)
				.map_err(|_| Error::ValidationError(format!("invalid redirect URI: {}", uri)))?;
			if parsed.fragment().is_some() {
				return Err(Error::ValidationError(
					"redirect URIs must not carry a fragment".into(),
				));
			}
		}
		self.store.tenants.read(tenant_id).await?;

		let secret = spec.confidential.then(|| random_token(CLIENT_SECRET_BYTES));
		let now = Timestamp::now();
		let client = OAuth2Client {
			id: new_uuid(),
			client_id: random_token(16),
			tenant_id: tenant_id.clone(),
			client_secret_hash: secret.as_deref().map(sha256_b64url),
			name: spec.name.trim().to_string(),
			redirect_uris: spec.redirect_uris,
			allowed_scopes: spec.allowed_scopes,
			grant_types: if spec.grant_types.is_empty() {
				vec!["authorization_code".into(), "refresh_token".into()]
			} else {
				spec.grant_types
			},
			response_types: vec!["code".into()],
			token_endpoint_auth_method: if spec.confidential {
				"client_secret_basic".into()
			} else {
				"none".into()
			},
			access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
			refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
			id_token_ttl: DEFAULT_ID_TOKEN_TTL,
			is_active: true,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		};
		self.store.clients.create(&client).await?;

		self.audit.emit(
			AuditEvent::new(AuditKind::ClientCreated)
				.tenant(Some(tenant_id.clone()))
				.actor(actor.as_str())
				.resource("oauth2_client")
				.client(meta)
				.metadata(json!({ "clientId": client.client_id, "name": client.name })),
		);
		Ok((client, secret))
	}

	pub async fn list_clients(&self, tenant_id: &TenantId) -> TgResult<Vec<OAuth2Client>> {
		self.store.clients.list_by_tenant(tenant_id).await
	}

	/// Replace a confidential client's secret. The new raw secret is
	/// returned once.
	pub async fn rotate_client_secret(
		&self,
		tenant_id: &TenantId,
		client_id: &str,
		actor: &UserId,
		meta: &ClientMeta,
	) -> TgResult<String> {
		let mut client = self.store.clients.read(tenant_id, client_id).await?;
		if client.client_secret_hash.is_none() {
			return Err(Error::ValidationError("public clients have no secret".into()));
		}
		let secret = random_token(CLIENT_SECRET_BYTES);
		client.client_secret_hash = Some(sha256_b64url(&secret));
		client.updated_at = Timestamp::now();
		self.store.clients.update(&client).await?;

		self.audit.emit(
			AuditEvent::new(AuditKind::SecretRotated)
				.tenant(Some(tenant_id.clone()))
				.actor(actor.as_str())
				.resource("oauth2_client")
				.client(meta)
				.metadata(json!({ "clientId": client_id })),
		);
		Ok(secret)
	}

	pub async fn delete_client(
		&self,
		tenant_id: &TenantId,
		client_id: &str,
		actor: &UserId,
		meta: &ClientMeta,
	) -> TgResult<()> {
		self.store.clients.soft_delete(tenant_id, client_id, Timestamp::now()).await?;
		self.audit.emit(
			AuditEvent::new(AuditKind::ClientDeleted)
				.tenant(Some(tenant_id.clone()))
				.actor(actor.as_str())
				.resource("oauth2_client")
				.client(meta)
				.metadata(json!({ "clientId": client_id })),
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::authz::seed_roles;
	use crate::store::memory::MemoryStore;
	use serde_json::json;

	async fn service() -> (TenantService, Store) {
		let store = MemoryStore::new().store();
		for role in seed_roles() {
			store.roles.upsert(&role).await.expect("seed");
		}
		(TenantService::new(store.clone(), AuditLogger::new()), store)
	}

	async fn add_identity(store: &Store, id: &str, tenant: Option<&str>) {
		store
			.identities
			.create(&Identity {
				id: id.into(),
				tenant_id: tenant.map(TenantId::from),
				email: format!("{}@example.com", id),
				email_verified: true,
				profile: json!({}),
				failed_login_attempts: 0,
				locked_until: None,
				created_at: Timestamp::now(),
				updated_at: Timestamp::now(),
				deleted_at: None,
			})
			.await
			.expect("identity");
	}

	#[tokio::test]
	async fn create_tenant_rejects_empty_name() {
		let (svc, _) = service().await;
		let err = svc.create_tenant("   ", &"admin".into(), &ClientMeta::default()).await;
		assert!(matches!(err, Err(Error::ValidationError(_))));
	}

	#[tokio::test]
	async fn role_grant_lifecycle() {
		let (svc, store) = service().await;
		let tenant =
			svc.create_tenant("acme", &"admin".into(), &ClientMeta::default()).await.expect("tenant");
		add_identity(&store, "u1", Some(tenant.id.as_str())).await;

		svc.assign_role(&tenant.id, &"u1".into(), "tenant_admin", &"admin".into(), &ClientMeta::default())
			.await
			.expect("assign");

		// Duplicate grant conflicts
		let dup = svc
			.assign_role(&tenant.id, &"u1".into(), "tenant_admin", &"admin".into(), &ClientMeta::default())
			.await;
		assert!(matches!(dup, Err(Error::AlreadyExists(_))));

		let roles = svc.user_roles(&tenant.id, &"u1".into()).await.expect("roles");
		assert_eq!(roles.len(), 1);
		assert_eq!(roles[0].name, "tenant_admin");

		svc.revoke_role(&tenant.id, &"u1".into(), "tenant_admin", &"admin".into(), &ClientMeta::default())
			.await
			.expect("revoke");
		assert!(svc.user_roles(&tenant.id, &"u1".into()).await.expect("roles").is_empty());
	}

	#[tokio::test]
	async fn unknown_role_name_is_rejected() {
		let (svc, store) = service().await;
		let tenant =
			svc.create_tenant("acme", &"admin".into(), &ClientMeta::default()).await.expect("tenant");
		add_identity(&store, "u1", Some(tenant.id.as_str())).await;
		let err = svc
			.assign_role(&tenant.id, &"u1".into(), "platform_admin", &"admin".into(), &ClientMeta::default())
			.await;
		assert!(matches!(err, Err(Error::ValidationError(_))));
	}

	#[tokio::test]
	async fn confidential_client_gets_hashed_secret() {
		let (svc, store) = service().await;
		let tenant =
			svc.create_tenant("acme", &"admin".into(), &ClientMeta::default()).await.expect("tenant");
		let (client, secret) = svc
			.create_client(
				&tenant.id,
				NewClient {
					name: "Console".into(),
					redirect_uris: vec!["https://app.example/cb".into()],
					allowed_scopes: vec!["openid".into(), "profile".into()],
					grant_types: vec![],
					confidential: true,
				},
				&"admin".into(),
				&ClientMeta::default(),
			)
			.await
			.expect("client");

		let secret = secret.expect("secret for confidential client");
		let stored = store.clients.read_by_client_id(&client.client_id).await.expect("read");
		assert_eq!(stored.client_secret_hash.as_deref(), Some(sha256_b64url(&secret).as_str()));
		// The raw secret is never persisted
		assert_ne!(stored.client_secret_hash.as_deref(), Some(secret.as_str()));
		assert_eq!(stored.grant_types, vec!["authorization_code", "refresh_token"]);
	}

	#[tokio::test]
	async fn rotate_secret_invalidates_old_hash() {
		let (svc, store) = service().await;
		let tenant =
			svc.create_tenant("acme", &"admin".into(), &ClientMeta::default()).await.expect("tenant");
		let (client, _) = svc
			.create_client(
				&tenant.id,
				NewClient {
					name: "Console".into(),
					redirect_uris: vec!["https://app.example/cb".into()],
					allowed_scopes: vec!["openid".into()],
					grant_types: vec![],
					confidential: true,
				},
				&"admin".into(),
				&ClientMeta::default(),
			)
			.await
			.expect("client");
		let before = store
			.clients
			.read_by_client_id(&client.client_id)
			.await
			.expect("read")
			.client_secret_hash;

		let fresh = svc
			.rotate_client_secret(&tenant.id, &client.client_id, &"admin".into(), &ClientMeta::default())
			.await
			.expect("rotate");
		let after = store
			.clients
			.read_by_client_id(&client.client_id)
			.await
			.expect("read")
			.client_secret_hash;
		assert_ne!(before, after);
		assert_eq!(after.as_deref(), Some(sha256_b64url(&fresh).as_str()));
	}

	#[tokio::test]
	async fn invalid_redirect_uri_is_rejected() {
		let (svc, _) = service().await;
		let tenant =
			svc.create_tenant("acme", &"admin".into(), &ClientMeta::default()).await.expect("tenant");
		let err = svc
			.create_client(
				&tenant.id,
				NewClient {
					name: "Bad".into(),
					redirect_uris: vec!["not a uri".into()],
					allowed_scopes: vec![],
					grant_types: vec![],
					confidential: false,
				},
				&"admin".into(),
				&ClientMeta::default(),
			)
			.await;
		assert!(matches!(err, Err(Error::ValidationError(_))));
	}
}

// vim: ts=4
