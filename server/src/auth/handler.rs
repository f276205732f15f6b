//! Control-plane authentication endpoints: login, logout, register (closed)
//! and the session introspection route.

use axum::{
	extract::State,
	http::{header, HeaderMap, HeaderValue, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEvent, AuditKind, ClientMeta};
use crate::config::SessionConfig;
use crate::core::extract::{cookie_value, Auth};
use crate::prelude::*;
use crate::store::{Assignment, Identity, SessionNamespace};

/// Build the Set-Cookie value for a session id. `max_age = 0` clears.
pub fn session_cookie(config: &SessionConfig, value: &str, max_age: i64) -> TgResult<HeaderValue> {
	let mut cookie = format!(
		"{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
		config.cookie_name, value, config.cookie_path, max_age, config.same_site.as_str()
	);
	if config.cookie_secure {
		cookie.push_str("; Secure");
	}
	if let Some(ref domain) = config.cookie_domain {
		cookie.push_str("; Domain=");
		cookie.push_str(domain);
	}
	HeaderValue::from_str(&cookie)
		.map_err(|_| Error::Internal("session cookie contains invalid characters".into()))
}

#[derive(Debug, Deserialize)]
pub struct LoginReq {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRes {
	pub user: Identity,
	pub current_tenant: Option<TenantId>,
}

/// # POST /api/v1/auth/login
///
/// Control-plane login. The tenant is derived from the authenticated user
/// record; only identities with management privileges may enter. Any
/// session id the client presented beforehand is destroyed (fixation).
pub async fn post_login(
	State(app): State<App>,
	meta: ClientMeta,
	headers: HeaderMap,
	Json(req): Json<LoginReq>,
) -> TgResult<Response> {
	let identity = app.identity.authenticate(None, &req.email, &req.password, &meta).await?;

	if !app.authz.may_use_control_plane(&identity.id).await? {
		info!("control-plane login denied for non-admin identity");
		return Err(Error::InsufficientPrivileges);
	}

	// Session fixation: whatever cookie the client arrived with is dead now
	if let Some(old) = cookie_value(&headers, &app.config.session.cookie_name) {
		app.sessions.destroy(&old).await.ok();
	}

	let session = app.sessions.create(&identity, SessionNamespace::Admin, &meta).await?;
	let cookie = session_cookie(&app.config.session, &session.id, app.config.session.lifetime)?;

	let body = LoginRes { current_tenant: identity.tenant_id.clone(), user: identity };
	let mut res = (StatusCode::OK, Json(body)).into_response();
	res.headers_mut().insert(header::SET_COOKIE, cookie);
	res.headers_mut()
		.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
	Ok(res)
}

/// # POST /api/v1/auth/logout
pub async fn post_logout(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
) -> TgResult<Response> {
	app.sessions.destroy(&session.id).await?;
	app.audit.emit(
		AuditEvent::new(AuditKind::Logout)
			.tenant(session.tenant_id.clone())
			.actor(session.user_id.as_str())
			.client(&meta),
	);

	let cookie = session_cookie(&app.config.session, "", 0)?;
	let mut res = (StatusCode::OK, Json(json!({}))).into_response();
	res.headers_mut().insert(header::SET_COOKIE, cookie);
	Ok(res)
}

/// # POST /api/v1/auth/register
///
/// Self-registration is closed; identities are provisioned by
/// administrators.
pub async fn post_register() -> TgResult<Response> {
	Err(Error::RegistrationDisabled)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeRes {
	pub user: Identity,
	pub assignments: Vec<AssignmentView>,
	pub current_tenant: Option<TenantId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
	pub role: String,
	pub scope: String,
	pub scope_context_id: Option<String>,
	pub granted_at: Timestamp,
}

/// # GET /api/v1/auth/me
pub async fn get_me(State(app): State<App>, Auth(session): Auth) -> TgResult<Json<MeRes>> {
	let user = app.identity.get(&session.user_id).await?;
	let assignments = app.store.assignments.list_for_user(&session.user_id).await?;

	let mut views = Vec::with_capacity(assignments.len());
	for assignment in assignments {
		views.push(assignment_view(&app, assignment).await?);
	}

	Ok(Json(MeRes { user, assignments: views, current_tenant: session.tenant_id }))
}

async fn assignment_view(app: &App, assignment: Assignment) -> TgResult<AssignmentView> {
	let role = match app.store.roles.read(&assignment.role_id).await {
		Ok(role) => role.name,
		Err(Error::NotFound) => assignment.role_id.clone(),
		Err(err) => return Err(err),
	};
	Ok(AssignmentView {
		role,
		scope: assignment.scope.as_str().to_string(),
		scope_context_id: assignment.scope_context_id,
		granted_at: assignment.granted_at,
	})
}

// vim: ts=4
