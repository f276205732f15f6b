//! First-run platform-admin bootstrap.
//!
//! Driven by `OT_BOOTSTRAP_ADMIN_EMAIL`. The operation keys its
//! idempotence off the platform-admin assignment: once any identity holds
//! it, a later start writes nothing and leaves silently.

use serde_json::json;

use crate::audit::{AuditEvent, AuditKind, ClientMeta};
use crate::authz::ROLE_PLATFORM_ADMIN;
use crate::core::utils::{new_uuid, random_token};
use crate::prelude::*;
use crate::store::{Assignment, RoleScope};

/// Printed passwords carry 96 bits of entropy.
const BOOTSTRAP_PASSWORD_BYTES: usize = 12;

pub async fn run(app: &App) -> TgResult<()> {
	let Some(ref admin_email) = app.config.bootstrap.admin_email else {
		debug!("bootstrap: no admin email configured, skipping");
		return Ok(());
	};

	let role = app.store.roles.read_by_name(ROLE_PLATFORM_ADMIN).await?;
	if !app.store.assignments.list_for_role(&role.id).await?.is_empty() {
		debug!("bootstrap: a platform admin already exists, skipping");
		return Ok(());
	}

	// Reuse an existing identity for the address, otherwise provision a
	// platform operator (no tenant binding)
	let identity = match app.store.identities.read_by_email(None, admin_email).await {
		Ok(identity) => identity,
		Err(Error::NotFound) => {
			let identity = app
				.identity
				.provision(None, admin_email, json!({ "name": "Platform administrator" }))
				.await?;
			let password = random_token(BOOTSTRAP_PASSWORD_BYTES);
			app.identity.add_password(&identity.id, &password).await?;
			// The only place the password ever appears; it is not logged
			println!("bootstrap: created platform admin {} with password: {}", admin_email, password);
			identity
		}
		Err(err) => return Err(err),
	};

	let assignment = Assignment {
		id: new_uuid(),
		user_id: identity.id.clone(),
		role_id: role.id.clone(),
		scope: RoleScope::Platform,
		scope_context_id: None,
		granted_at: Timestamp::now(),
		granted_by: None,
	};
	assignment.validate()?;
	app.store.assignments.create(&assignment).await?;

	if let Some(ref tenant_name) = app.config.bootstrap.tenant_name {
		match app.tenants.create_tenant(tenant_name, &identity.id, &ClientMeta::default()).await {
			Ok(_) | Err(Error::AlreadyExists(_)) => {}
			Err(err) => return Err(err),
		}
	}

	info!("bootstrap: granted platform admin to {}", admin_email);
	app.audit.emit(
		AuditEvent::new(AuditKind::PlatformAdminBootstrap)
			.actor(identity.id.as_str())
			.resource("assignment")
			.metadata(json!({ "email": admin_email })),
	);
	Ok(())
}


// vim: ts=4
