//! Shared fixtures for the service-level tests: an app over the in-memory
//! store, seeded tenants/users/clients and small HTTP helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use trustgate::audit::ClientMeta;
use trustgate::config::{
	BootstrapConfig, Config, DatabaseConfig, LockoutConfig, Mode, OidcConfig, PasswordConfig,
	RateLimitConfig, SameSite, ServerConfig, SessionConfig,
};
use trustgate::core::app::{App, AppState};
use trustgate::prelude::*;
use trustgate::store::memory::MemoryStore;
use trustgate::store::{Identity, OAuth2Client};
use trustgate::tenant::NewClient;

pub const CSRF_HEADER: (&str, &str) = ("x-requested-with", "XMLHttpRequest");

pub fn test_config() -> Config {
	Config {
		server: ServerConfig {
			listen: "127.0.0.1:0".into(),
			request_timeout: 60,
			shutdown_timeout: 30,
		},
		database: DatabaseConfig { path: ":memory:".into(), max_open: 2, max_idle: 1 },
		session: SessionConfig {
			cookie_name: "tg_session".into(),
			cookie_domain: None,
			cookie_path: "/".into(),
			cookie_secure: false,
			same_site: SameSite::Lax,
			lifetime: 3600,
			idle_timeout: 600,
		},
		password: PasswordConfig { memory_kib: 8, iterations: 1, parallelism: 1, min_length: 8 },
		lockout: LockoutConfig { max_attempts: 3, duration: 900 },
		rate_limit: RateLimitConfig { rps: 1000, burst: 1000, sweep_interval: 600 },
		oidc: OidcConfig { issuer: "http://idp.test".into(), master_key: [7u8; 32] },
		bootstrap: BootstrapConfig::default(),
	}
}

pub async fn test_app() -> App {
	AppState::build(test_config(), MemoryStore::new().store()).await.expect("app state")
}

pub fn router(app: &App, mode: Mode) -> Router {
	trustgate::routes::build_router(app.clone(), mode)
}

/// Create a tenant plus a user holding the given role (or none); attach a
/// password so the user can authenticate.
pub async fn seed_user(
	app: &App,
	tenant_name: &str,
	email: &str,
	password: &str,
	role: Option<&str>,
) -> (TenantId, Identity) {
	let admin = UserId("seed-admin".to_string());
	let tenant = match app
		.tenants
		.create_tenant(tenant_name, &admin, &ClientMeta::default())
		.await
	{
		Ok(tenant) => tenant,
		Err(Error::AlreadyExists(_)) => {
			let all = app.tenants.list_tenants().await.expect("tenants");
			all.into_iter().find(|t| t.name == tenant_name).expect("tenant by name")
		}
		Err(err) => panic!("seed tenant: {err}"),
	};

	let identity = app
		.identity
		.provision(Some(tenant.id.clone()), email, json!({ "name": email }))
		.await
		.expect("provision");
	app.identity.add_password(&identity.id, password).await.expect("password");

	if let Some(role) = role {
		app.tenants
			.assign_role(&tenant.id, &identity.id, role, &admin, &ClientMeta::default())
			.await
			.expect("role");
	}
	(tenant.id, identity)
}

/// Platform operator with the platform_admin role.
pub async fn seed_platform_admin(app: &App, email: &str, password: &str) -> Identity {
	let identity = app
		.identity
		.provision(None, email, json!({ "name": "ops" }))
		.await
		.expect("provision");
	app.identity.add_password(&identity.id, password).await.expect("password");

	let role = app.store.roles.read_by_name("platform_admin").await.expect("role");
	app.store
		.assignments
		.create(&trustgate::store::Assignment {
			id: format!("seed-{}", identity.id.0),
			user_id: identity.id.clone(),
			role_id: role.id,
			scope: trustgate::store::RoleScope::Platform,
			scope_context_id: None,
			granted_at: Timestamp::now(),
			granted_by: None,
		})
		.await
		.expect("assignment");
	identity
}

pub async fn seed_client(
	app: &App,
	tenant_id: &TenantId,
	redirect_uri: &str,
	scopes: &[&str],
	confidential: bool,
) -> (OAuth2Client, Option<String>) {
	app.tenants
		.create_client(
			tenant_id,
			NewClient {
				name: "Test client".into(),
				redirect_uris: vec![redirect_uri.to_string()],
				allowed_scopes: scopes.iter().map(|s| s.to_string()).collect(),
				grant_types: vec![],
				confidential,
			},
			&UserId("seed-admin".to_string()),
			&ClientMeta::default(),
		)
		.await
		.expect("client")
}

pub async fn body_json(response: Response<Body>) -> Value {
	let bytes = response.into_body().collect().await.expect("body").to_bytes();
	serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.header(CSRF_HEADER.0, CSRF_HEADER.1)
		.body(Body::from(body.to_string()))
		.expect("request")
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
		.body(Body::from(body.to_string()))
		.expect("request")
}

/// Log in through the HTTP surface; returns the session cookie value.
pub async fn login(router: &Router, email: &str, password: &str) -> String {
	let req = json_request(
		"POST",
		"/api/v1/auth/login",
		json!({ "email": email, "password": password }),
	);
	let res = router.clone().oneshot(req).await.expect("login response");
	assert_eq!(res.status(), StatusCode::OK, "login should succeed");
	session_cookie(&res).expect("session cookie")
}

/// Extract the session cookie value from a Set-Cookie header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
	let raw = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
	let (name_value, _) = raw.split_once(';')?;
	let (name, value) = name_value.split_once('=')?;
	(name == "tg_session" && !value.is_empty()).then(|| value.to_string())
}

/// Decode a JWT payload without verifying the signature.
pub fn jwt_payload(token: &str) -> Value {
	use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
	let payload = token.split('.').nth(1).expect("jwt payload segment");
	let bytes = URL_SAFE_NO_PAD.decode(payload).expect("jwt payload base64");
	serde_json::from_slice(&bytes).expect("jwt payload json")
}

pub fn jwt_header(token: &str) -> Value {
	use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
	let header = token.split('.').next().expect("jwt header segment");
	let bytes = URL_SAFE_NO_PAD.decode(header).expect("jwt header base64");
	serde_json::from_slice(&bytes).expect("jwt header json")
}

// vim: ts=4
