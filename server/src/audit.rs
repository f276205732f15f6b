//! Security audit logging.
//!
//! Every security-relevant event is emitted as one structured record on the
//! `audit` tracing target. Metadata values under sensitive-looking keys are
//! redacted before the record leaves the process.

use serde::Serialize;
use serde_json::Value;

use crate::types::{TenantId, Timestamp, UserId};

/// Substrings that mark a metadata key as sensitive (matched against the
/// lower-cased key).
const SENSITIVE_KEY_PARTS: &[&str] = &[
	"password",
	"secret",
	"token",
	"key",
	"authorization",
	"hash",
	"credential",
	"private",
	"api_key",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
	LoginSuccess,
	LoginFailure,
	UserLocked,
	Logout,
	PasswordChanged,
	TokenIssued,
	TokenRevoked,
	RoleAssigned,
	RoleRevoked,
	ClientCreated,
	ClientDeleted,
	SecretRotated,
	TenantCreated,
	PlatformAdminBootstrap,
}

impl AuditKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::LoginSuccess => "login_success",
			Self::LoginFailure => "login_failure",
			Self::UserLocked => "user_locked",
			Self::Logout => "logout",
			Self::PasswordChanged => "password_changed",
			Self::TokenIssued => "token_issued",
			Self::TokenRevoked => "token_revoked",
			Self::RoleAssigned => "role_assigned",
			Self::RoleRevoked => "role_revoked",
			Self::ClientCreated => "client_created",
			Self::ClientDeleted => "client_deleted",
			Self::SecretRotated => "secret_rotated",
			Self::TenantCreated => "tenant_created",
			Self::PlatformAdminBootstrap => "platform_admin_bootstrap",
		}
	}
}

/// Remote-peer details attached to audit records.
#[derive(Clone, Debug, Default)]
pub struct ClientMeta {
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
	#[serde(rename = "type")]
	pub kind: AuditKind,
	pub tenant_id: Option<TenantId>,
	pub actor_id: Option<UserId>,
	pub resource: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub timestamp: Timestamp,
	pub metadata: Value,
}

impl AuditEvent {
	pub fn new(kind: AuditKind) -> Self {
		Self {
			kind,
			tenant_id: None,
			actor_id: None,
			resource: None,
			ip_address: None,
			user_agent: None,
			timestamp: Timestamp::now(),
			metadata: Value::Null,
		}
	}

	pub fn tenant(mut self, tenant_id: Option<TenantId>) -> Self {
		self.tenant_id = tenant_id;
		self
	}

	pub fn actor(mut self, actor_id: impl Into<UserId>) -> Self {
		self.actor_id = Some(actor_id.into());
		self
	}

	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn client(mut self, meta: &ClientMeta) -> Self {
		self.ip_address = meta.ip_address.clone();
		self.user_agent = meta.user_agent.clone();
		self
	}

	pub fn metadata(mut self, metadata: Value) -> Self {
		self.metadata = metadata;
		self
	}
}

/// Emits audit records to the configured tracing sink.
///
/// The logger is stateless; fan-out and persistence are the subscriber's
/// concern.
#[derive(Clone, Debug, Default)]
pub struct AuditLogger;

impl AuditLogger {
	pub fn new() -> Self {
		Self
	}

	pub fn emit(&self, mut event: AuditEvent) {
		event.metadata = redact(event.metadata);
		match serde_json::to_string(&event) {
			Ok(record) => tracing::info!(target: "audit", %record, kind = event.kind.as_str()),
			Err(err) => tracing::warn!("audit record serialization failed: {}", err),
		}
	}
}

fn is_sensitive_key(key: &str) -> bool {
	let lower = key.to_ascii_lowercase();
	SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// Replace values under sensitive keys with `[REDACTED]`, recursing into
/// nested objects and arrays.
fn redact(value: Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(
			map.into_iter()
				.map(|(k, v)| {
					if is_sensitive_key(&k) {
						(k, Value::String(REDACTED.into()))
					} else {
						(k, redact(v))
					}
				})
				.collect(),
		),
		Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
		other => other,
	}
}


// vim: ts=4
