//! Thread-safe in-memory store implementation.
//!
//! Backs the unit and service tests; also usable for local demos. Semantics
//! mirror the SQLite adapter, including uniqueness constraints, soft-delete
//! filters and the atomic code `mark_used`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, TgResult};
use crate::types::{TenantId, Timestamp, UserId};

use super::{
	AccessToken, AccessTokenRepo, Assignment, AssignmentRepo, AuthCodeRepo, AuthorizationCode,
	ClientRepo, Credential, CredentialRepo, Identity, IdentityRepo, OAuth2Client, RefreshToken,
	RefreshTokenRepo, RoleDefinition, RoleRepo, RoleScope, Session, SessionRepo, SigningKey,
	SigningKeyRepo, Store, Tenant, TenantRepo,
};

#[derive(Debug, Default)]
struct Tables {
	identities: HashMap<String, Identity>,
	credentials: HashMap<String, Credential>,
	sessions: HashMap<String, Session>,
	tenants: HashMap<String, Tenant>,
	roles: HashMap<String, RoleDefinition>,
	assignments: Vec<Assignment>,
	clients: HashMap<String, OAuth2Client>,
	auth_codes: HashMap<String, AuthorizationCode>,
	access_tokens: HashMap<String, AccessToken>,
	refresh_tokens: HashMap<String, RefreshToken>,
	signing_keys: Vec<SigningKey>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Aggregate handle with every repository backed by this instance.
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

#[async_trait]
impl IdentityRepo for MemoryStore {
	async fn create(&self, identity: &Identity) -> TgResult<()> {
		let mut tables = self.inner.write();
		let duplicate = tables.identities.values().any(|existing| {
			existing.deleted_at.is_none()
				&& existing.tenant_id == identity.tenant_id
				&& existing.email == identity.email
		});
		if duplicate {
			return Err(Error::AlreadyExists("identity".into()));
		}
		tables.identities.insert(identity.id.0.clone(), identity.clone());
		Ok(())
	}

	async fn read(&self, id: &UserId) -> TgResult<Identity> {
		self.inner
			.read()
			.identities
			.get(&id.0)
			.filter(|i| i.deleted_at.is_none())
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn read_by_email(&self, tenant_id: Option<&TenantId>, email: &str) -> TgResult<Identity> {
		let tables = self.inner.read();
		let mut candidates: Vec<&Identity> = tables
			.identities
			.values()
			.filter(|i| i.deleted_at.is_none() && i.email == email)
			.filter(|i| match tenant_id {
				Some(t) => i.tenant_id.as_ref() == Some(t),
				None => true,
			})
			.collect();
		// Global lookup prefers platform operators, then the oldest record
		candidates.sort_by_key(|i| (i.tenant_id.is_some(), i.created_at));
		candidates.first().map(|i| (*i).clone()).ok_or(Error::NotFound)
	}

	async fn update(&self, identity: &Identity) -> TgResult<()> {
		let mut tables = self.inner.write();
		match tables.identities.get_mut(&identity.id.0) {
			Some(existing) if existing.deleted_at.is_none() => {
				*existing = identity.clone();
				Ok(())
			}
			_ => Err(Error::NotFound),
		}
	}

	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<Identity>> {
		let tables = self.inner.read();
		let mut items: Vec<Identity> = tables
			.identities
			.values()
			.filter(|i| i.deleted_at.is_none() && i.tenant_id.as_ref() == Some(tenant_id))
			.cloned()
			.collect();
		items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
		Ok(items)
	}

	async fn soft_delete(&self, id: &UserId, at: Timestamp) -> TgResult<()> {
		let mut tables = self.inner.write();
		match tables.identities.get_mut(&id.0) {
			Some(existing) if existing.deleted_at.is_none() => {
				existing.deleted_at = Some(at);
				Ok(())
			}
			_ => Err(Error::NotFound),
		}
	}
}

#[async_trait]
impl CredentialRepo for MemoryStore {
	async fn upsert(&self, credential: &Credential) -> TgResult<()> {
		self.inner.write().credentials.insert(credential.user_id.0.clone(), credential.clone());
		Ok(())
	}

	async fn read(&self, user_id: &UserId) -> TgResult<Credential> {
		self.inner.read().credentials.get(&user_id.0).cloned().ok_or(Error::NotFound)
	}
}

#[async_trait]
impl SessionRepo for MemoryStore {
	async fn create(&self, session: &Session) -> TgResult<()> {
		self.inner.write().sessions.insert(session.id.clone(), session.clone());
		Ok(())
	}

	async fn read(&self, id: &str) -> TgResult<Session> {
		self.inner.read().sessions.get(id).cloned().ok_or(Error::NotFound)
	}

	async fn touch(&self, id: &str, last_seen_at: Timestamp) -> TgResult<()> {
		match self.inner.write().sessions.get_mut(id) {
			Some(session) => {
				session.last_seen_at = last_seen_at;
				Ok(())
			}
			None => Err(Error::NotFound),
		}
	}

	async fn delete(&self, id: &str) -> TgResult<()> {
		self.inner.write().sessions.remove(id);
		Ok(())
	}

	async fn delete_expired(&self, now: Timestamp) -> TgResult<u64> {
		let mut tables = self.inner.write();
		let before = tables.sessions.len();
		tables.sessions.retain(|_, s| s.expires_at > now);
		Ok((before - tables.sessions.len()) as u64)
	}
}

#[async_trait]
impl TenantRepo for MemoryStore {
	async fn create(&self, tenant: &Tenant) -> TgResult<()> {
		let mut tables = self.inner.write();
		if tables.tenants.values().any(|t| t.name == tenant.name) {
			return Err(Error::AlreadyExists("tenant".into()));
		}
		tables.tenants.insert(tenant.id.0.clone(), tenant.clone());
		Ok(())
	}

	async fn read(&self, id: &TenantId) -> TgResult<Tenant> {
		self.inner.read().tenants.get(&id.0).cloned().ok_or(Error::NotFound)
	}

	async fn update(&self, tenant: &Tenant) -> TgResult<()> {
		match self.inner.write().tenants.get_mut(&tenant.id.0) {
			Some(existing) => {
				*existing = tenant.clone();
				Ok(())
			}
			None => Err(Error::NotFound),
		}
	}

	async fn list(&self) -> TgResult<Vec<Tenant>> {
		let mut items: Vec<Tenant> = self.inner.read().tenants.values().cloned().collect();
		items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
		Ok(items)
	}
}

#[async_trait]
impl RoleRepo for MemoryStore {
	async fn upsert(&self, role: &RoleDefinition) -> TgResult<()> {
		self.inner.write().roles.entry(role.id.clone()).or_insert_with(|| role.clone());
		Ok(())
	}

	async fn read(&self, id: &str) -> TgResult<RoleDefinition> {
		self.inner.read().roles.get(id).cloned().ok_or(Error::NotFound)
	}

	async fn read_by_name(&self, name: &str) -> TgResult<RoleDefinition> {
		self.inner
			.read()
			.roles
			.values()
			.find(|r| r.name == name)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn list(&self) -> TgResult<Vec<RoleDefinition>> {
		let mut items: Vec<RoleDefinition> = self.inner.read().roles.values().cloned().collect();
		items.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(items)
	}
}

#[async_trait]
impl AssignmentRepo for MemoryStore {
	async fn create(&self, assignment: &Assignment) -> TgResult<()> {
		assignment.validate()?;
		let mut tables = self.inner.write();
		let duplicate = tables.assignments.iter().any(|a| {
			a.user_id == assignment.user_id
				&& a.role_id == assignment.role_id
				&& a.scope == assignment.scope
				&& a.scope_context_id == assignment.scope_context_id
		});
		if duplicate {
			return Err(Error::AlreadyExists("assignment".into()));
		}
		tables.assignments.push(assignment.clone());
		Ok(())
	}

	async fn delete(
		&self,
		user_id: &UserId,
		role_id: &str,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<()> {
		let mut tables = self.inner.write();
		let before = tables.assignments.len();
		tables.assignments.retain(|a| {
			!(a.user_id == *user_id
				&& a.role_id == role_id
				&& a.scope == scope
				&& a.scope_context_id.as_deref() == scope_context_id)
		});
		if tables.assignments.len() == before {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn list_for_user(&self, user_id: &UserId) -> TgResult<Vec<Assignment>> {
		Ok(self
			.inner
			.read()
			.assignments
			.iter()
			.filter(|a| a.user_id == *user_id)
			.cloned()
			.collect())
	}

	async fn list_for_context(
		&self,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<Vec<Assignment>> {
		Ok(self
			.inner
			.read()
			.assignments
			.iter()
			.filter(|a| a.scope == scope && a.scope_context_id.as_deref() == scope_context_id)
			.cloned()
			.collect())
	}

	async fn list_for_role(&self, role_id: &str) -> TgResult<Vec<Assignment>> {
		Ok(self
			.inner
			.read()
			.assignments
			.iter()
			.filter(|a| a.role_id == role_id)
			.cloned()
			.collect())
	}
}

#[async_trait]
impl ClientRepo for MemoryStore {
	async fn create(&self, client: &OAuth2Client) -> TgResult<()> {
		let mut tables = self.inner.write();
		if tables.clients.contains_key(&client.client_id) {
			return Err(Error::AlreadyExists("client".into()));
		}
		tables.clients.insert(client.client_id.clone(), client.clone());
		Ok(())
	}

	async fn read_by_client_id(&self, client_id: &str) -> TgResult<OAuth2Client> {
		self.inner
			.read()
			.clients
			.get(client_id)
			.filter(|c| c.deleted_at.is_none())
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn read(&self, tenant_id: &TenantId, client_id: &str) -> TgResult<OAuth2Client> {
		self.inner
			.read()
			.clients
			.get(client_id)
			.filter(|c| c.deleted_at.is_none() && c.tenant_id == *tenant_id)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn update(&self, client: &OAuth2Client) -> TgResult<()> {
		let mut tables = self.inner.write();
		match tables.clients.get_mut(&client.client_id) {
			Some(existing) if existing.deleted_at.is_none() => {
				*existing = client.clone();
				Ok(())
			}
			_ => Err(Error::NotFound),
		}
	}

	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<OAuth2Client>> {
		let mut items: Vec<OAuth2Client> = self
			.inner
			.read()
			.clients
			.values()
			.filter(|c| c.deleted_at.is_none() && c.tenant_id == *tenant_id)
			.cloned()
			.collect();
		items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
		Ok(items)
	}

	async fn soft_delete(
		&self,
		tenant_id: &TenantId,
		client_id: &str,
		at: Timestamp,
	) -> TgResult<()> {
		let mut tables = self.inner.write();
		match tables.clients.get_mut(client_id) {
			Some(client) if client.deleted_at.is_none() && client.tenant_id == *tenant_id => {
				client.deleted_at = Some(at);
				client.is_active = false;
				Ok(())
			}
			_ => Err(Error::NotFound),
		}
	}
}

#[async_trait]
impl AuthCodeRepo for MemoryStore {
	async fn create(&self, code: &AuthorizationCode) -> TgResult<()> {
		let mut tables = self.inner.write();
		if tables.auth_codes.contains_key(&code.code) {
			return Err(Error::AlreadyExists("authorization code".into()));
		}
		tables.auth_codes.insert(code.code.clone(), code.clone());
		Ok(())
	}

	async fn read(&self, code: &str) -> TgResult<AuthorizationCode> {
		self.inner.read().auth_codes.get(code).cloned().ok_or(Error::NotFound)
	}

	async fn mark_used(&self, code: &str, used_at: Timestamp) -> TgResult<bool> {
		let mut tables = self.inner.write();
		match tables.auth_codes.get_mut(code) {
			Some(record) if !record.is_used => {
				record.is_used = true;
				record.used_at = Some(used_at);
				Ok(true)
			}
			Some(_) => Ok(false),
			None => Err(Error::NotFound),
		}
	}
}

#[async_trait]
impl AccessTokenRepo for MemoryStore {
	async fn create(&self, token: &AccessToken) -> TgResult<()> {
		self.inner.write().access_tokens.insert(token.id.clone(), token.clone());
		Ok(())
	}

	async fn read_by_hash(&self, token_hash: &str) -> TgResult<AccessToken> {
		self.inner
			.read()
			.access_tokens
			.values()
			.find(|t| t.token_hash == token_hash)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()> {
		match self.inner.write().access_tokens.get_mut(id) {
			Some(token) => {
				token.is_revoked = true;
				token.revoked_at = Some(at);
				Ok(())
			}
			None => Err(Error::NotFound),
		}
	}
}

#[async_trait]
impl RefreshTokenRepo for MemoryStore {
	async fn create(&self, token: &RefreshToken) -> TgResult<()> {
		self.inner.write().refresh_tokens.insert(token.id.clone(), token.clone());
		Ok(())
	}

	async fn read_by_hash(&self, token_hash: &str) -> TgResult<RefreshToken> {
		self.inner
			.read()
			.refresh_tokens
			.values()
			.find(|t| t.token_hash == token_hash)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()> {
		match self.inner.write().refresh_tokens.get_mut(id) {
			Some(token) => {
				token.is_revoked = true;
				token.revoked_at = Some(at);
				Ok(())
			}
			None => Err(Error::NotFound),
		}
	}
}

#[async_trait]
impl SigningKeyRepo for MemoryStore {
	async fn create(&self, key: &SigningKey) -> TgResult<()> {
		self.inner.write().signing_keys.push(key.clone());
		Ok(())
	}

	async fn read_current(&self) -> TgResult<SigningKey> {
		let tables = self.inner.read();
		tables
			.signing_keys
			.iter()
			.filter(|k| k.expires_at.is_none_or(|exp| !exp.has_passed()))
			.max_by_key(|k| k.created_at)
			.cloned()
			.ok_or(Error::NotFound)
	}
}


// vim: ts=4
