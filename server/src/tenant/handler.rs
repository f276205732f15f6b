//! Tenant administration endpoints: tenants, membership roles and OAuth2
//! clients.
//!
//! Authorization is evaluated per request against the path tenant; a
//! tenant-scoped role for one tenant grants nothing for another, so
//! cross-tenant requests die here with 403.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::ClientMeta;
use crate::authz::{PLATFORM_MANAGE_TENANTS, TENANT_MANAGE_CLIENTS, TENANT_MANAGE_USERS, TENANT_READ};
use crate::core::extract::Auth;
use crate::prelude::*;
use crate::store::{Identity, OAuth2Client, RoleDefinition, RoleScope, Tenant};
use crate::tenant::NewClient;

async fn require_perm(
	app: &App,
	actor: &UserId,
	scope: RoleScope,
	scope_context_id: Option<&str>,
	permission: &str,
) -> TgResult<()> {
	if app.authz.has_permission(actor, scope, scope_context_id, permission).await? {
		Ok(())
	} else {
		Err(Error::PermissionDenied)
	}
}

// Tenants //
//*********//

/// # GET /api/v1/tenants
pub async fn list_tenants(State(app): State<App>, Auth(session): Auth) -> TgResult<Json<Vec<Tenant>>> {
	require_perm(&app, &session.user_id, RoleScope::Platform, None, PLATFORM_MANAGE_TENANTS).await?;
	Ok(Json(app.tenants.list_tenants().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantReq {
	pub name: String,
}

/// # POST /api/v1/tenants
pub async fn create_tenant(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Json(req): Json<CreateTenantReq>,
) -> TgResult<(StatusCode, Json<Tenant>)> {
	require_perm(&app, &session.user_id, RoleScope::Platform, None, PLATFORM_MANAGE_TENANTS).await?;
	let tenant = app.tenants.create_tenant(&req.name, &session.user_id, &meta).await?;
	Ok((StatusCode::CREATED, Json(tenant)))
}

/// # GET /api/v1/tenants/{id}
pub async fn get_tenant(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
) -> TgResult<Json<Tenant>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_READ).await?;
	Ok(Json(app.tenants.get_tenant(&TenantId(tenant_id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetTenantStatusReq {
	pub status: crate::store::TenantStatus,
}

/// # PUT /api/v1/tenants/{id}/status
///
/// Suspend or reactivate a tenant. Clients of a suspended tenant stop
/// receiving authorization codes.
pub async fn set_tenant_status(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
	Json(req): Json<SetTenantStatusReq>,
) -> TgResult<Json<Tenant>> {
	require_perm(&app, &session.user_id, RoleScope::Platform, None, PLATFORM_MANAGE_TENANTS).await?;
	Ok(Json(app.tenants.set_status(&TenantId(tenant_id), req.status).await?))
}

// Users and roles //
//*****************//

/// # GET /api/v1/tenants/{id}/users
pub async fn list_tenant_users(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
) -> TgResult<Json<Vec<Identity>>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_READ).await?;
	Ok(Json(app.identity.list_by_tenant(&TenantId(tenant_id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProvisionUserReq {
	pub email: String,
	#[serde(default)]
	pub profile: serde_json::Value,
}

/// # POST /api/v1/tenants/{id}/users
///
/// Provision an identity in the tenant. No credential is attached; the
/// account cannot log in until a password is set.
pub async fn provision_tenant_user(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
	Json(req): Json<ProvisionUserReq>,
) -> TgResult<(StatusCode, Json<Identity>)> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_USERS)
		.await?;
	let tenant_id = TenantId(tenant_id);
	// The tenant must exist and be addressable before provisioning into it
	app.tenants.get_tenant(&tenant_id).await?;
	let profile = if req.profile.is_null() { json!({}) } else { req.profile };
	let identity = app.identity.provision(Some(tenant_id), &req.email, profile).await?;
	Ok((StatusCode::CREATED, Json(identity)))
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordReq {
	pub password: String,
}

/// # POST /api/v1/tenants/{id}/users/{uid}/password
///
/// Attach or replace the initial credential of a provisioned identity.
pub async fn set_user_password(
	State(app): State<App>,
	Auth(session): Auth,
	Path((tenant_id, user_id)): Path<(String, String)>,
	Json(req): Json<SetPasswordReq>,
) -> TgResult<Json<serde_json::Value>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_USERS)
		.await?;
	let target = UserId(user_id);
	let identity = app.identity.get(&target).await?;
	if identity.tenant_id.as_ref().map(TenantId::as_str) != Some(tenant_id.as_str()) {
		return Err(Error::NotFound);
	}
	app.identity.add_password(&target, &req.password).await?;
	Ok(Json(json!({})))
}

/// # DELETE /api/v1/tenants/{id}/users/{uid}
///
/// Soft-delete an identity. The email becomes reusable within the
/// tenant; the row stays for audit correlation.
pub async fn delete_tenant_user(
	State(app): State<App>,
	Auth(session): Auth,
	Path((tenant_id, user_id)): Path<(String, String)>,
) -> TgResult<Json<serde_json::Value>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_USERS)
		.await?;
	let target = UserId(user_id);
	let identity = app.identity.get(&target).await?;
	if identity.tenant_id.as_ref().map(TenantId::as_str) != Some(tenant_id.as_str()) {
		return Err(Error::NotFound);
	}
	app.store.identities.soft_delete(&target, Timestamp::now()).await?;
	Ok(Json(json!({})))
}

/// # GET /api/v1/tenants/{id}/users/{uid}/roles
pub async fn get_user_roles(
	State(app): State<App>,
	Auth(session): Auth,
	Path((tenant_id, user_id)): Path<(String, String)>,
) -> TgResult<Json<Vec<RoleDefinition>>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_READ).await?;
	Ok(Json(app.tenants.user_roles(&TenantId(tenant_id), &UserId(user_id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleReq {
	pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRes {
	pub role: String,
	pub user_id: String,
	pub tenant_id: String,
}

/// # POST /api/v1/tenants/{id}/users/{uid}/roles
pub async fn assign_user_role(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Path((tenant_id, user_id)): Path<(String, String)>,
	Json(req): Json<AssignRoleReq>,
) -> TgResult<(StatusCode, Json<AssignRoleRes>)> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_USERS)
		.await?;
	app.tenants
		.assign_role(&TenantId(tenant_id.clone()), &UserId(user_id.clone()), &req.role, &session.user_id, &meta)
		.await?;
	Ok((
		StatusCode::CREATED,
		Json(AssignRoleRes { role: req.role, user_id, tenant_id }),
	))
}

/// # DELETE /api/v1/tenants/{id}/users/{uid}/roles/{role}
pub async fn revoke_user_role(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Path((tenant_id, user_id, role)): Path<(String, String, String)>,
) -> TgResult<Json<serde_json::Value>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_USERS)
		.await?;
	app.tenants
		.revoke_role(&TenantId(tenant_id), &UserId(user_id), &role, &session.user_id, &meta)
		.await?;
	Ok(Json(json!({})))
}

/// # GET /api/v1/tenants/{id}/owners
pub async fn list_tenant_owners(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
) -> TgResult<Json<Vec<Identity>>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_READ).await?;
	let tenant_id = TenantId(tenant_id);
	let users = app.tenants.tenant_users(&tenant_id).await?;
	let mut owners = Vec::new();
	for user in users {
		let roles = app.tenants.user_roles(&tenant_id, &user.id).await?;
		if roles.iter().any(|r| r.name == crate::authz::ROLE_TENANT_OWNER) {
			owners.push(user);
		}
	}
	Ok(Json(owners))
}

// OAuth2 clients //
//****************//

/// # GET /api/v1/tenants/{id}/clients
pub async fn list_clients(
	State(app): State<App>,
	Auth(session): Auth,
	Path(tenant_id): Path<String>,
) -> TgResult<Json<Vec<OAuth2Client>>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_CLIENTS)
		.await?;
	Ok(Json(app.tenants.list_clients(&TenantId(tenant_id)).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientReq {
	pub name: String,
	pub redirect_uris: Vec<String>,
	#[serde(default)]
	pub allowed_scopes: Vec<String>,
	#[serde(default)]
	pub grant_types: Vec<String>,
	#[serde(default = "default_confidential")]
	pub confidential: bool,
}

fn default_confidential() -> bool {
	true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRes {
	#[serde(flatten)]
	pub client: OAuth2Client,
	/// Shown exactly once; only a digest is stored
	pub client_secret: Option<String>,
}

/// # POST /api/v1/tenants/{id}/clients
pub async fn create_client(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Path(tenant_id): Path<String>,
	Json(req): Json<CreateClientReq>,
) -> TgResult<(StatusCode, Json<CreateClientRes>)> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_CLIENTS)
		.await?;
	let (client, client_secret) = app
		.tenants
		.create_client(
			&TenantId(tenant_id),
			NewClient {
				name: req.name,
				redirect_uris: req.redirect_uris,
				allowed_scopes: req.allowed_scopes,
				grant_types: req.grant_types,
				confidential: req.confidential,
			},
			&session.user_id,
			&meta,
		)
		.await?;
	Ok((StatusCode::CREATED, Json(CreateClientRes { client, client_secret })))
}

/// # DELETE /api/v1/tenants/{id}/clients/{cid}
pub async fn delete_client(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Path((tenant_id, client_id)): Path<(String, String)>,
) -> TgResult<Json<serde_json::Value>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_CLIENTS)
		.await?;
	app.tenants.delete_client(&TenantId(tenant_id), &client_id, &session.user_id, &meta).await?;
	Ok(Json(json!({})))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateSecretRes {
	pub client_id: String,
	pub client_secret: String,
}

/// # POST /api/v1/tenants/{id}/clients/{cid}/rotate-secret
pub async fn rotate_client_secret(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Path((tenant_id, client_id)): Path<(String, String)>,
) -> TgResult<Json<RotateSecretRes>> {
	require_perm(&app, &session.user_id, RoleScope::Tenant, Some(&tenant_id), TENANT_MANAGE_CLIENTS)
		.await?;
	let client_secret = app
		.tenants
		.rotate_client_secret(&TenantId(tenant_id), &client_id, &session.user_id, &meta)
		.await?;
	Ok(Json(RotateSecretRes { client_id, client_secret }))
}

// vim: ts=4
