//! Identity provisioning, credentials and password authentication.
//!
//! Provisioning never creates a credential; an identity cannot log in until
//! a password is attached. Authentication carries the lockout accounting.

use serde_json::{json, Value};

use crate::audit::{AuditEvent, AuditKind, AuditLogger, ClientMeta};
use crate::config::LockoutConfig;
use crate::prelude::*;
use crate::store::{Credential, Identity, Store};
use crate::core::utils::new_uuid;

pub mod password;

pub use password::PasswordHasher;

/// RFC-pragmatic bounds; full address grammar is not the service's business.
const EMAIL_MAX_LEN: usize = 254;
const EMAIL_MIN_LEN: usize = 3;

pub fn validate_email(email: &str) -> TgResult<()> {
	if email.len() < EMAIL_MIN_LEN || email.len() > EMAIL_MAX_LEN {
		return Err(Error::InvalidEmail);
	}
	let mut parts = email.split('@');
	let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
		return Err(Error::InvalidEmail);
	};
	if local.is_empty() || domain.is_empty() || !domain.contains('.') {
		return Err(Error::InvalidEmail);
	}
	if domain.starts_with('.') || domain.ends_with('.') {
		return Err(Error::InvalidEmail);
	}
	Ok(())
}

#[derive(Clone, Debug)]
pub struct IdentityService {
	store: Store,
	hasher: PasswordHasher,
	lockout: LockoutConfig,
	audit: AuditLogger,
}

impl IdentityService {
	pub fn new(store: Store, hasher: PasswordHasher, lockout: LockoutConfig, audit: AuditLogger) -> Self {
		Self { store, hasher, lockout, audit }
	}

	/// Create an identity without a credential. The account is not usable
	/// for login until `add_password` runs.
	pub async fn provision(
		&self,
		tenant_id: Option<TenantId>,
		email: &str,
		profile: Value,
	) -> TgResult<Identity> {
		validate_email(email)?;
		let now = Timestamp::now();
		let identity = Identity {
			id: UserId(new_uuid()),
			tenant_id,
			email: email.to_string(),
			email_verified: false,
			profile,
			failed_login_attempts: 0,
			locked_until: None,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		};
		self.store.identities.create(&identity).await?;
		Ok(identity)
	}

	/// Attach or replace the password credential of an identity.
	pub async fn add_password(&self, user_id: &UserId, password: &str) -> TgResult<()> {
		self.hasher.check_strength(password)?;
		// The identity must exist; credentials are never free-floating
		self.store.identities.read(user_id).await?;
		let password_hash = self.hasher.hash(password.to_string()).await?;
		self.store
			.credentials
			.upsert(&Credential { user_id: user_id.clone(), password_hash, updated_at: Timestamp::now() })
			.await
	}

	/// Verify email+password and account for failures.
	///
	/// `tenant_id = None` performs a global lookup; the control plane derives
	/// the tenant from the record that matched. Every terminal outcome emits
	/// an audit event.
	pub async fn authenticate(
		&self,
		tenant_id: Option<&TenantId>,
		email: &str,
		password: &str,
		meta: &ClientMeta,
	) -> TgResult<Identity> {
		let mut identity = match self.store.identities.read_by_email(tenant_id, email).await {
			Ok(identity) => identity,
			Err(Error::NotFound) => {
				self.audit_login_failure(tenant_id.cloned(), None, meta, "unknown_identity");
				return Err(Error::InvalidCredentials);
			}
			Err(err) => return Err(err),
		};

		if identity.locked_until.is_some_and(|until| !until.has_passed()) {
			self.audit_login_failure(
				identity.tenant_id.clone(),
				Some(identity.id.clone()),
				meta,
				"locked",
			);
			return Err(Error::AccountLocked);
		}

		let credential = match self.store.credentials.read(&identity.id).await {
			Ok(credential) => credential,
			Err(Error::NotFound) => {
				// Provisioned but never given a password; not a lockout case
				self.audit_login_failure(
					identity.tenant_id.clone(),
					Some(identity.id.clone()),
					meta,
					"no_credential",
				);
				return Err(Error::InvalidCredentials);
			}
			Err(err) => return Err(err),
		};

		if self.hasher.verify(password.to_string(), credential.password_hash).await? {
			if identity.failed_login_attempts > 0 || identity.locked_until.is_some() {
				identity.failed_login_attempts = 0;
				identity.locked_until = None;
				identity.updated_at = Timestamp::now();
				self.store.identities.update(&identity).await?;
			}
			self.audit.emit(
				AuditEvent::new(AuditKind::LoginSuccess)
					.tenant(identity.tenant_id.clone())
					.actor(identity.id.as_str())
					.client(meta),
			);
			return Ok(identity);
		}

		identity.failed_login_attempts += 1;
		let now = Timestamp::now();
		identity.updated_at = now;
		let locked = identity.failed_login_attempts >= self.lockout.max_attempts;
		if locked {
			identity.locked_until = Some(now.add_seconds(self.lockout.duration));
		}
		self.store.identities.update(&identity).await?;

		if locked {
			warn!("account locked after {} failed attempts", identity.failed_login_attempts);
			self.audit.emit(
				AuditEvent::new(AuditKind::UserLocked)
					.tenant(identity.tenant_id.clone())
					.actor(identity.id.as_str())
					.client(meta)
					.metadata(json!({ "failedAttempts": identity.failed_login_attempts })),
			);
		}
		self.audit_login_failure(
			identity.tenant_id.clone(),
			Some(identity.id.clone()),
			meta,
			"bad_password",
		);
		Err(Error::InvalidCredentials)
	}

	/// Self-service password change: old password must verify first.
	pub async fn change_password(
		&self,
		user_id: &UserId,
		old_password: &str,
		new_password: &str,
		meta: &ClientMeta,
	) -> TgResult<()> {
		self.hasher.check_strength(new_password)?;
		let identity = self.store.identities.read(user_id).await?;
		let credential = self.store.credentials.read(user_id).await?;
		if !self.hasher.verify(old_password.to_string(), credential.password_hash).await? {
			return Err(Error::InvalidCredentials);
		}
		let password_hash = self.hasher.hash(new_password.to_string()).await?;
		self.store
			.credentials
			.upsert(&Credential { user_id: user_id.clone(), password_hash, updated_at: Timestamp::now() })
			.await?;
		self.audit.emit(
			AuditEvent::new(AuditKind::PasswordChanged)
				.tenant(identity.tenant_id)
				.actor(user_id.as_str())
				.client(meta),
		);
		Ok(())
	}

	pub async fn get(&self, user_id: &UserId) -> TgResult<Identity> {
		self.store.identities.read(user_id).await
	}

	pub async fn list_by_tenant(&self, tenant_id: &TenantId) -> TgResult<Vec<Identity>> {
		self.store.identities.list_by_tenant(tenant_id).await
	}

	pub async fn update_profile(&self, user_id: &UserId, profile: Value) -> TgResult<Identity> {
		let mut identity = self.store.identities.read(user_id).await?;
		identity.profile = profile;
		identity.updated_at = Timestamp::now();
		self.store.identities.update(&identity).await?;
		Ok(identity)
	}

	fn audit_login_failure(
		&self,
		tenant_id: Option<TenantId>,
		actor: Option<UserId>,
		meta: &ClientMeta,
		reason: &str,
	) {
		let mut event = AuditEvent::new(AuditKind::LoginFailure)
			.tenant(tenant_id)
			.client(meta)
			.metadata(json!({ "reason": reason }));
		if let Some(actor) = actor {
			event = event.actor(actor.as_str());
		}
		self.audit.emit(event);
	}
}


// vim: ts=4
