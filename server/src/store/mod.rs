//! Repository contracts and persisted entity types.
//!
//! The core depends on these traits only; concrete backends live in adapter
//! crates (`trustgate-store-sqlite`) plus the in-memory implementation in
//! this module, which backs the unit and service tests.
//!
//! Conventions every implementation must hold:
//! - every tenant-scoped read/write carries an explicit tenant predicate;
//! - soft-deleted rows (`deleted_at` set) are invisible to reads;
//! - multi-row mutations run in one transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Error, TgResult};
use crate::types::{TenantId, Timestamp, UserId};

pub mod memory;

// Entities //
//**********//

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	pub id: UserId,
	/// `None` marks a platform operator; tenant membership is immutable
	/// after creation.
	pub tenant_id: Option<TenantId>,
	pub email: String,
	pub email_verified: bool,
	pub profile: Value,
	#[serde(skip)]
	pub failed_login_attempts: i64,
	#[serde(skip)]
	pub locked_until: Option<Timestamp>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
	#[serde(skip)]
	pub deleted_at: Option<Timestamp>,
}

#[derive(Clone, Debug)]
pub struct Credential {
	pub user_id: UserId,
	pub password_hash: String,
	pub updated_at: Timestamp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
	Active,
	Suspended,
	Deleted,
}

impl TenantStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Suspended => "suspended",
			Self::Deleted => "deleted",
		}
	}

	pub fn parse(s: &str) -> TgResult<Self> {
		match s {
			"active" => Ok(Self::Active),
			"suspended" => Ok(Self::Suspended),
			"deleted" => Ok(Self::Deleted),
			other => Err(Error::Internal(format!("unknown tenant status: {}", other))),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
	pub id: TenantId,
	pub name: String,
	pub status: TenantStatus,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
	Platform,
	Tenant,
	Client,
}

impl RoleScope {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Platform => "platform",
			Self::Tenant => "tenant",
			Self::Client => "client",
		}
	}

	pub fn parse(s: &str) -> TgResult<Self> {
		match s {
			"platform" => Ok(Self::Platform),
			"tenant" => Ok(Self::Tenant),
			"client" => Ok(Self::Client),
			other => Err(Error::Internal(format!("unknown role scope: {}", other))),
		}
	}
}

/// Named permission bundle. Permissions follow `<domain>:<verb>`; the
/// wildcard `"*"` grants everything within the role's scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
	pub id: String,
	pub name: String,
	pub scope: RoleScope,
	pub permissions: Vec<String>,
}

/// The sole carrier of privilege. `scope = platform` requires a null
/// scope context; tenant/client scopes require the tenant or client id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
	pub id: String,
	pub user_id: UserId,
	pub role_id: String,
	pub scope: RoleScope,
	pub scope_context_id: Option<String>,
	pub granted_at: Timestamp,
	pub granted_by: Option<UserId>,
}

impl Assignment {
	/// Check the scope/context integrity constraint.
	pub fn validate(&self) -> TgResult<()> {
		match (self.scope, &self.scope_context_id) {
			(RoleScope::Platform, None) => Ok(()),
			(RoleScope::Platform, Some(_)) => Err(Error::ValidationError(
				"platform assignments must not carry a scope context".into(),
			)),
			(_, Some(_)) => Ok(()),
			(_, None) => Err(Error::ValidationError(
				"tenant and client assignments require a scope context".into(),
			)),
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionNamespace {
	Auth,
	Admin,
}

impl SessionNamespace {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Auth => "auth",
			Self::Admin => "admin",
		}
	}

	pub fn parse(s: &str) -> TgResult<Self> {
		match s {
			"auth" => Ok(Self::Auth),
			"admin" => Ok(Self::Admin),
			other => Err(Error::Internal(format!("unknown session namespace: {}", other))),
		}
	}
}

/// Server-side session. The id is the opaque cookie value and the primary
/// key; it never encodes state.
#[derive(Clone, Debug)]
pub struct Session {
	pub id: String,
	pub tenant_id: Option<TenantId>,
	pub user_id: UserId,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub expires_at: Timestamp,
	pub created_at: Timestamp,
	pub last_seen_at: Timestamp,
	pub namespace: SessionNamespace,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Client {
	pub id: String,
	/// Opaque public identifier used on the wire
	pub client_id: String,
	pub tenant_id: TenantId,
	/// SHA-256 of the client secret; `None` for public clients
	#[serde(skip)]
	pub client_secret_hash: Option<String>,
	pub name: String,
	/// Registered redirect URIs, matched byte-for-byte
	pub redirect_uris: Vec<String>,
	pub allowed_scopes: Vec<String>,
	pub grant_types: Vec<String>,
	pub response_types: Vec<String>,
	pub token_endpoint_auth_method: String,
	pub access_token_ttl: i64,
	pub refresh_token_ttl: i64,
	pub id_token_ttl: i64,
	pub is_active: bool,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
	#[serde(skip)]
	pub deleted_at: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
	#[serde(rename = "plain")]
	Plain,
	S256,
}

impl CodeChallengeMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Plain => "plain",
			Self::S256 => "S256",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"plain" => Some(Self::Plain),
			"S256" => Some(Self::S256),
			_ => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct AuthorizationCode {
	pub code: String,
	pub client_id: String,
	pub user_id: UserId,
	pub redirect_uri: String,
	pub scope: String,
	pub state: Option<String>,
	pub nonce: Option<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<CodeChallengeMethod>,
	pub expires_at: Timestamp,
	pub is_used: bool,
	pub used_at: Option<Timestamp>,
	pub created_at: Timestamp,
}

/// Issued access token. Only the SHA-256 digest of the raw token is stored.
#[derive(Clone, Debug)]
pub struct AccessToken {
	pub id: String,
	pub token_hash: String,
	pub tenant_id: TenantId,
	pub client_id: String,
	pub user_id: UserId,
	pub scope: String,
	pub expires_at: Timestamp,
	pub is_revoked: bool,
	pub revoked_at: Option<Timestamp>,
	pub created_at: Timestamp,
}

#[derive(Clone, Debug)]
pub struct RefreshToken {
	pub id: String,
	pub token_hash: String,
	/// The access token this refresh token was minted alongside
	pub access_token_id: String,
	pub tenant_id: TenantId,
	pub client_id: String,
	pub user_id: UserId,
	pub scope: String,
	pub expires_at: Timestamp,
	pub is_revoked: bool,
	pub revoked_at: Option<Timestamp>,
	pub created_at: Timestamp,
}

/// RS256 signing key. The private key is sealed with the master key
/// (AEAD, per-record nonce) before it reaches the store.
#[derive(Clone, Debug)]
pub struct SigningKey {
	pub id: String,
	pub algorithm: String,
	pub public_key_pem: String,
	pub private_key_encrypted: Vec<u8>,
	pub created_at: Timestamp,
	pub expires_at: Option<Timestamp>,
}

// Repository contracts //
//**********************//

#[async_trait]
pub trait IdentityRepo: Debug + Send + Sync {
	async fn create(&self, identity: &Identity) -> TgResult<()>;
	async fn read(&self, id: &UserId) -> TgResult<Identity>;
	/// Look up by email. `tenant_id = Some(t)` searches within the tenant,
	/// `None` searches platform identities and then all tenants (control
	/// plane login derives the tenant from the matched record).
	async fn read_by_email(&self, tenant_id: Option<&TenantId>, email: &str) -> TgResult<Identity>;
	async fn update(&self, identity: &Identity) -> TgResult<()>;
	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<Identity>>;
	async fn soft_delete(&self, id: &UserId, at: Timestamp) -> TgResult<()>;
}

#[async_trait]
pub trait CredentialRepo: Debug + Send + Sync {
	/// Insert or replace the credential row for a user.
	async fn upsert(&self, credential: &Credential) -> TgResult<()>;
	async fn read(&self, user_id: &UserId) -> TgResult<Credential>;
}

#[async_trait]
pub trait SessionRepo: Debug + Send + Sync {
	async fn create(&self, session: &Session) -> TgResult<()>;
	async fn read(&self, id: &str) -> TgResult<Session>;
	async fn touch(&self, id: &str, last_seen_at: Timestamp) -> TgResult<()>;
	async fn delete(&self, id: &str) -> TgResult<()>;
	async fn delete_expired(&self, now: Timestamp) -> TgResult<u64>;
}

#[async_trait]
pub trait TenantRepo: Debug + Send + Sync {
	async fn create(&self, tenant: &Tenant) -> TgResult<()>;
	async fn read(&self, id: &TenantId) -> TgResult<Tenant>;
	async fn update(&self, tenant: &Tenant) -> TgResult<()>;
	async fn list(&self) -> TgResult<Vec<Tenant>>;
}

#[async_trait]
pub trait RoleRepo: Debug + Send + Sync {
	/// Insert the role if absent; used by idempotent seeding.
	async fn upsert(&self, role: &RoleDefinition) -> TgResult<()>;
	async fn read(&self, id: &str) -> TgResult<RoleDefinition>;
	async fn read_by_name(&self, name: &str) -> TgResult<RoleDefinition>;
	async fn list(&self) -> TgResult<Vec<RoleDefinition>>;
}

#[async_trait]
pub trait AssignmentRepo: Debug + Send + Sync {
	/// Fails with `AlreadyExists` on the
	/// `(user, role, scope, scope_context)` unique constraint.
	async fn create(&self, assignment: &Assignment) -> TgResult<()>;
	async fn delete(
		&self,
		user_id: &UserId,
		role_id: &str,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<()>;
	async fn list_for_user(&self, user_id: &UserId) -> TgResult<Vec<Assignment>>;
	async fn list_for_context(
		&self,
		scope: RoleScope,
		scope_context_id: Option<&str>,
	) -> TgResult<Vec<Assignment>>;
	async fn list_for_role(&self, role_id: &str) -> TgResult<Vec<Assignment>>;
}

#[async_trait]
pub trait ClientRepo: Debug + Send + Sync {
	async fn create(&self, client: &OAuth2Client) -> TgResult<()>;
	async fn read_by_client_id(&self, client_id: &str) -> TgResult<OAuth2Client>;
	async fn read(&self, tenant_id: &TenantId, client_id: &str) -> TgResult<OAuth2Client>;
	async fn update(&self, client: &OAuth2Client) -> TgResult<()>;
	async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<OAuth2Client>>;
	async fn soft_delete(&self, tenant_id: &TenantId, client_id: &str, at: Timestamp)
		-> TgResult<()>;
}

#[async_trait]
pub trait AuthCodeRepo: Debug + Send + Sync {
	async fn create(&self, code: &AuthorizationCode) -> TgResult<()>;
	async fn read(&self, code: &str) -> TgResult<AuthorizationCode>;
	/// Atomically flip `is_used`. Returns `false` when another exchange
	/// already won; at most one caller ever sees `true` for a given code.
	async fn mark_used(&self, code: &str, used_at: Timestamp) -> TgResult<bool>;
}

#[async_trait]
pub trait AccessTokenRepo: Debug + Send + Sync {
	async fn create(&self, token: &AccessToken) -> TgResult<()>;
	async fn read_by_hash(&self, token_hash: &str) -> TgResult<AccessToken>;
	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()>;
}

#[async_trait]
pub trait RefreshTokenRepo: Debug + Send + Sync {
	async fn create(&self, token: &RefreshToken) -> TgResult<()>;
	async fn read_by_hash(&self, token_hash: &str) -> TgResult<RefreshToken>;
	async fn revoke(&self, id: &str, at: Timestamp) -> TgResult<()>;
}

#[async_trait]
pub trait SigningKeyRepo: Debug + Send + Sync {
	async fn create(&self, key: &SigningKey) -> TgResult<()>;
	/// The newest non-expired key; `NotFound` on first boot.
	async fn read_current(&self) -> TgResult<SigningKey>;
}

/// Aggregated store handle carried in the app state.
#[derive(Clone, Debug)]
pub struct Store {
	pub identities: Arc<dyn IdentityRepo>,
	pub credentials: Arc<dyn CredentialRepo>,
	pub sessions: Arc<dyn SessionRepo>,
	pub tenants: Arc<dyn TenantRepo>,
	pub roles: Arc<dyn RoleRepo>,
	pub assignments: Arc<dyn AssignmentRepo>,
	pub clients: Arc<dyn ClientRepo>,
	pub auth_codes: Arc<dyn AuthCodeRepo>,
	pub access_tokens: Arc<dyn AccessTokenRepo>,
	pub refresh_tokens: Arc<dyn RefreshTokenRepo>,
	pub signing_keys: Arc<dyn SigningKeyRepo>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn assignment_integrity() {
		let mut a = Assignment {
			id: "a1".into(),
			user_id: "u1".into(),
			role_id: "r1".into(),
			scope: RoleScope::Platform,
			scope_context_id: None,
			granted_at: Timestamp::now(),
			granted_by: None,
		};
		assert!(a.validate().is_ok());

		a.scope_context_id = Some("t1".into());
		assert!(a.validate().is_err());

		a.scope = RoleScope::Tenant;
		assert!(a.validate().is_ok());

		a.scope_context_id = None;
		assert!(a.validate().is_err());
	}

	#[test]
	fn challenge_method_parse() {
		assert_eq!(CodeChallengeMethod::parse("plain"), Some(CodeChallengeMethod::Plain));
		assert_eq!(CodeChallengeMethod::parse("S256"), Some(CodeChallengeMethod::S256));
		// case matters on the wire
		assert_eq!(CodeChallengeMethod::parse("s256"), None);
	}
}

// vim: ts=4
