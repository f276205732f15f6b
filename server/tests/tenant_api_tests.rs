//! Tenant administration over HTTP: cross-tenant denial, platform
//! authority, client management and mode-based route sets.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use trustgate::config::Mode;

fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
	req.headers_mut().insert(
		header::COOKIE,
		format!("tg_session={}", cookie).parse().expect("cookie header"),
	);
	req
}

fn get_request(uri: &str, cookie: &str) -> Request<Body> {
	with_cookie(
		Request::builder().uri(uri).body(Body::empty()).expect("request"),
		cookie,
	)
}

#[tokio::test]
async fn cross_tenant_admin_request_is_denied() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (_tenant_a, _) =
		seed_user(&app, "tenant-a", "ua@a.example", "hunter2hunter2", Some("tenant_admin")).await;
	let (tenant_b, user_b) =
		seed_user(&app, "tenant-b", "ub@b.example", "hunter2hunter2", Some("tenant_member")).await;
	let cookie = login(&router, "ua@a.example", "hunter2hunter2").await;

	// uA (admin of A) targets tenant B: structurally denied
	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/roles", tenant_b.0, user_b.id.0),
			json!({ "role": "tenant_member" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("assign");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);

	// Reading B's users is denied too
	let res = router
		.clone()
		.oneshot(get_request(&format!("/api/v1/tenants/{}/users", tenant_b.0), &cookie))
		.await
		.expect("list");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn platform_admin_crosses_tenants() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (tenant, user) =
		seed_user(&app, "acme", "u1@acme.example", "hunter2hunter2", None).await;
	seed_platform_admin(&app, "root@idp.example", "hunter2hunter2").await;
	let cookie = login(&router, "root@idp.example", "hunter2hunter2").await;

	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/roles", tenant.0, user.id.0),
			json!({ "role": "tenant_owner" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("assign");
	assert_eq!(res.status(), StatusCode::CREATED);

	// Duplicate grant conflicts
	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/roles", tenant.0, user.id.0),
			json!({ "role": "tenant_owner" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("assign");
	assert_eq!(res.status(), StatusCode::CONFLICT);

	// The grantee shows up among the owners
	let res = router
		.clone()
		.oneshot(get_request(&format!("/api/v1/tenants/{}/owners", tenant.0), &cookie))
		.await
		.expect("owners");
	assert_eq!(res.status(), StatusCode::OK);
	let owners = body_json(res).await;
	assert_eq!(owners[0]["email"], "u1@acme.example");

	// Revoke and verify
	let req = with_cookie(
		json_request(
			"DELETE",
			&format!("/api/v1/tenants/{}/users/{}/roles/tenant_owner", tenant.0, user.id.0),
			json!({}),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("revoke");
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_listing_requires_platform_authority() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	let res = router
		.clone()
		.oneshot(get_request("/api/v1/tenants", &cookie))
		.await
		.expect("list");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);

	let req = with_cookie(json_request("POST", "/api/v1/tenants", json!({ "name": "new" })), &cookie);
	let res = router.clone().oneshot(req).await.expect("create");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_creation_by_platform_admin() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_platform_admin(&app, "root@idp.example", "hunter2hunter2").await;
	let cookie = login(&router, "root@idp.example", "hunter2hunter2").await;

	let req = with_cookie(json_request("POST", "/api/v1/tenants", json!({ "name": "acme" })), &cookie);
	let res = router.clone().oneshot(req).await.expect("create");
	assert_eq!(res.status(), StatusCode::CREATED);
	let tenant = body_json(res).await;
	assert_eq!(tenant["name"], "acme");
	assert_eq!(tenant["status"], "active");

	// Duplicate name conflicts
	let req = with_cookie(json_request("POST", "/api/v1/tenants", json!({ "name": "acme" })), &cookie);
	let res = router.clone().oneshot(req).await.expect("create");
	assert_eq!(res.status(), StatusCode::CONFLICT);

	let res = router
		.clone()
		.oneshot(get_request("/api/v1/tenants", &cookie))
		.await
		.expect("list");
	assert_eq!(res.status(), StatusCode::OK);
	let tenants = body_json(res).await;
	assert_eq!(tenants.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn client_management_roundtrip() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (tenant, _) =
		seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	// Create a confidential client; the secret appears exactly once
	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/clients", tenant.0),
			json!({
				"name": "Console",
				"redirectUris": ["https://app.example/cb"],
				"allowedScopes": ["openid", "profile"],
			}),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("create client");
	assert_eq!(res.status(), StatusCode::CREATED);
	let created = body_json(res).await;
	let client_id = created["clientId"].as_str().expect("clientId").to_string();
	assert!(created["clientSecret"].is_string());

	// Listing does not expose secrets or hashes
	let res = router
		.clone()
		.oneshot(get_request(&format!("/api/v1/tenants/{}/clients", tenant.0), &cookie))
		.await
		.expect("list clients");
	assert_eq!(res.status(), StatusCode::OK);
	let listed = body_json(res).await;
	assert_eq!(listed[0]["clientId"], client_id.as_str());
	assert!(listed[0].get("clientSecret").is_none());
	assert!(listed[0].get("clientSecretHash").is_none());

	// Rotate
	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/clients/{}/rotate-secret", tenant.0, client_id),
			json!({}),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("rotate");
	assert_eq!(res.status(), StatusCode::OK);
	assert!(body_json(res).await["clientSecret"].is_string());

	// Delete, then the client is gone
	let req = with_cookie(
		json_request(
			"DELETE",
			&format!("/api/v1/tenants/{}/clients/{}", tenant.0, client_id),
			json!({}),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("delete");
	assert_eq!(res.status(), StatusCode::OK);

	let res = router
		.clone()
		.oneshot(get_request(&format!("/api/v1/tenants/{}/clients", tenant.0), &cookie))
		.await
		.expect("list clients");
	let listed = body_json(res).await;
	assert!(listed.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn provisioned_user_cannot_login_until_password_is_set() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (tenant, _) =
		seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users", tenant.0),
			json!({ "email": "new@acme.example" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("provision");
	assert_eq!(res.status(), StatusCode::CREATED);
	let user = body_json(res).await;
	let uid = user["id"].as_str().expect("id").to_string();

	// No credential yet: login reads as invalid credentials
	let res = router
		.clone()
		.oneshot(json_request(
			"POST",
			"/api/v1/auth/login",
			json!({ "email": "new@acme.example", "password": "hunter2hunter2" }),
		))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

	// Grant a role and set a password; now login works
	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/roles", tenant.0, uid),
			json!({ "role": "tenant_admin" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("role");
	assert_eq!(res.status(), StatusCode::CREATED);

	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/password", tenant.0, uid),
			json!({ "password": "hunter2hunter2" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("password");
	assert_eq!(res.status(), StatusCode::OK);

	let res = router
		.clone()
		.oneshot(json_request(
			"POST",
			"/api/v1/auth/login",
			json!({ "email": "new@acme.example", "password": "hunter2hunter2" }),
		))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_role_name_is_a_validation_error() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (tenant, user) =
		seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	let req = with_cookie(
		json_request(
			"POST",
			&format!("/api/v1/tenants/{}/users/{}/roles", tenant.0, user.id.0),
			json!({ "role": "platform_admin" }),
		),
		&cookie,
	);
	let res = router.clone().oneshot(req).await.expect("assign");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_header_mismatch_is_a_cross_tenant_attempt() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let (tenant, _) =
		seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	// Header naming another tenant: 403
	let mut req = get_request(&format!("/api/v1/tenants/{}/users", tenant.0), &cookie);
	req.headers_mut().insert("x-tenant-id", "some-other-tenant".parse().expect("header"));
	let res = router.clone().oneshot(req).await.expect("request");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);

	// Header naming the session's own tenant is still a protocol violation
	let mut req = get_request(&format!("/api/v1/tenants/{}/users", tenant.0), &cookie);
	req.headers_mut().insert("x-tenant-id", tenant.0.parse().expect("header"));
	let res = router.clone().oneshot(req).await.expect("request");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn route_sets_are_disjoint_per_mode() {
	let app = test_app().await;
	let auth_router = router(&app, Mode::Auth);
	let admin_router = router(&app, Mode::Admin);

	// Admin surface is absent in auth mode
	let res = auth_router
		.clone()
		.oneshot(Request::builder().uri("/api/v1/tenants").body(Body::empty()).expect("request"))
		.await
		.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);

	// Protocol surface is absent in admin mode
	let res = admin_router
		.clone()
		.oneshot(
			Request::builder()
				.uri("/.well-known/openid-configuration")
				.body(Body::empty())
				.expect("request"),
		)
		.await
		.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);

	// Health answers everywhere
	for r in [&auth_router, &admin_router] {
		let res = r
			.clone()
			.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
			.await
			.expect("response");
		assert_eq!(res.status(), StatusCode::OK);
		let body = body_json(res).await;
		assert_eq!(body["status"], "pass");
		assert_eq!(body["service"], "trustgate");
	}
}

// vim: ts=4
