//! Route construction per operational mode.
//!
//! Each mode mounts a disjoint route set; anything not mounted answers 404.
//! The global layers implement the outer middleware stack (request id,
//! rate limit, panic recovery, timeout, logging); the per-group layers add
//! tenant-context rules, CSRF and session authentication.

use axum::{
	http::{header, HeaderValue, StatusCode},
	middleware,
	response::IntoResponse,
	routing::{delete, get, post, put},
	Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth;
use crate::config::Mode;
use crate::core::middleware::{
	cross_tenant_guard, rate_limit, reject_tenant_header, request_id, require_csrf,
	require_session,
};
use crate::oauth2;
use crate::oidc;
use crate::prelude::*;
use crate::tenant;
use crate::user;

/// # GET /health
async fn get_health() -> impl IntoResponse {
	let mut res = Json(json!({
		"status": "pass",
		"service": crate::core::app::SERVICE_NAME,
		"version": crate::core::app::VERSION,
	}))
	.into_response();
	res.headers_mut()
		.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache"));
	res
}

// ============================================================================
// AUTH MODE - protocol surface and resource-owner authentication
// ============================================================================
fn auth_routes(app: App) -> Router<App> {
	// OIDC metadata and the token-side protocol endpoints. No sessions;
	// tenant context comes from the client, never from headers.
	let protocol = Router::new()
		.route("/.well-known/openid-configuration", get(oidc::handler::get_discovery))
		.route("/jwks.json", get(oidc::handler::get_jwks))
		.route("/oauth2/token", post(oauth2::handler::post_token))
		.route("/oauth2/revoke", post(oauth2::handler::post_revoke))
		.route_layer(middleware::from_fn(reject_tenant_header));

	// The authorize endpoint needs the resource owner's session
	let authorize = Router::new()
		.route("/oauth2/authorize", get(oauth2::handler::get_authorize))
		.route_layer(middleware::from_fn_with_state(app.clone(), require_session))
		.route_layer(middleware::from_fn(reject_tenant_header));

	// Browser-facing authentication API
	let login = Router::new()
		.route("/api/v1/auth/login", post(auth::handler::post_login))
		.route("/api/v1/auth/register", post(auth::handler::post_register))
		.route_layer(middleware::from_fn(require_csrf))
		.route_layer(middleware::from_fn(reject_tenant_header));

	let logout = Router::new()
		.route("/api/v1/auth/logout", post(auth::handler::post_logout))
		.route_layer(middleware::from_fn(require_csrf))
		.route_layer(middleware::from_fn(cross_tenant_guard))
		.route_layer(middleware::from_fn_with_state(app, require_session));

	protocol.merge(authorize).merge(login).merge(logout)
}

// ============================================================================
// ADMIN MODE - control-plane API for the admin UI
// ============================================================================
fn admin_routes(app: App) -> Router<App> {
	Router::new()
		.route("/api/v1/auth/me", get(auth::handler::get_me))

		// --- Self service ---
		.route("/api/v1/user/profile", get(user::handler::get_profile))
		.route("/api/v1/user/profile", put(user::handler::put_profile))
		.route("/api/v1/user/change-password", post(user::handler::post_change_password))

		// --- Tenant management ---
		.route("/api/v1/tenants", get(tenant::handler::list_tenants))
		.route("/api/v1/tenants", post(tenant::handler::create_tenant))
		.route("/api/v1/tenants/{id}", get(tenant::handler::get_tenant))
		.route("/api/v1/tenants/{id}/status", put(tenant::handler::set_tenant_status))
		.route("/api/v1/tenants/{id}/users", get(tenant::handler::list_tenant_users))
		.route("/api/v1/tenants/{id}/users", post(tenant::handler::provision_tenant_user))
		.route(
			"/api/v1/tenants/{id}/users/{uid}/password",
			post(tenant::handler::set_user_password),
		)
		.route("/api/v1/tenants/{id}/users/{uid}", delete(tenant::handler::delete_tenant_user))
		.route("/api/v1/tenants/{id}/users/{uid}/roles", get(tenant::handler::get_user_roles))
		.route("/api/v1/tenants/{id}/users/{uid}/roles", post(tenant::handler::assign_user_role))
		.route(
			"/api/v1/tenants/{id}/users/{uid}/roles/{role}",
			delete(tenant::handler::revoke_user_role),
		)
		.route("/api/v1/tenants/{id}/owners", get(tenant::handler::list_tenant_owners))

		// --- OAuth2 client management ---
		.route("/api/v1/tenants/{id}/clients", get(tenant::handler::list_clients))
		.route("/api/v1/tenants/{id}/clients", post(tenant::handler::create_client))
		.route("/api/v1/tenants/{id}/clients/{cid}", delete(tenant::handler::delete_client))
		.route(
			"/api/v1/tenants/{id}/clients/{cid}/rotate-secret",
			post(tenant::handler::rotate_client_secret),
		)
		.route_layer(middleware::from_fn(require_csrf))
		.route_layer(middleware::from_fn(cross_tenant_guard))
		.route_layer(middleware::from_fn_with_state(app, require_session))
}

/// Build the router for an operational mode. Routes outside the mode's set
/// are simply absent and answer 404.
pub fn build_router(app: App, mode: Mode) -> Router {
	let mut router = Router::new().route("/health", get(get_health));
	if mode.serves_auth() {
		router = router.merge(auth_routes(app.clone()));
	}
	if mode.serves_admin() {
		router = router.merge(admin_routes(app.clone()));
	}

	// Global stack, innermost first: logging, timeout, panic recovery,
	// rate limit, request id
	router
		.layer(TraceLayer::new_for_http())
		.layer(TimeoutLayer::new(Duration::from_secs(app.config.server.request_timeout)))
		.layer(CatchPanicLayer::custom(|_: Box<dyn std::any::Any + Send>| {
			(StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
		}))
		.layer(middleware::from_fn_with_state(app.clone(), rate_limit))
		.layer(middleware::from_fn(request_id))
		.with_state(app)
}

// vim: ts=4
