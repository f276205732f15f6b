//! Control-plane login semantics: privilege gating, lockout, session
//! fixation, tenant-header rejection and logout.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use trustgate::config::Mode;

fn login_request(email: &str, password: &str) -> Request<Body> {
	json_request("POST", "/api/v1/auth/login", json!({ "email": email, "password": password }))
}

fn me_request(cookie: &str) -> Request<Body> {
	Request::builder()
		.uri("/api/v1/auth/me")
		.header(header::COOKIE, format!("tg_session={}", cookie))
		.body(Body::empty())
		.expect("request")
}

#[tokio::test]
async fn tenant_admin_can_log_in() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	let res = router
		.clone()
		.oneshot(login_request("admin@acme.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::OK);
	let cookie = session_cookie(&res).expect("cookie");
	let raw_set_cookie = res.headers()[header::SET_COOKIE].to_str().expect("header").to_string();
	assert!(raw_set_cookie.contains("HttpOnly"));
	assert!(raw_set_cookie.contains("SameSite=Lax"));

	let body = body_json(res).await;
	assert_eq!(body["user"]["email"], "admin@acme.example");
	assert!(body["currentTenant"].is_string());

	// The session works against /me
	let res = router.clone().oneshot(me_request(&cookie)).await.expect("me");
	assert_eq!(res.status(), StatusCode::OK);
	let me = body_json(res).await;
	assert_eq!(me["assignments"][0]["role"], "tenant_admin");
}

#[tokio::test]
async fn plain_member_is_rejected_with_403() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "member@acme.example", "hunter2hunter2", Some("tenant_member")).await;

	let res = router
		.clone()
		.oneshot(login_request("member@acme.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
	assert_eq!(body_json(res).await["error"], "insufficient_privileges");
}

#[tokio::test]
async fn user_without_roles_is_rejected() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "nobody@acme.example", "hunter2hunter2", None).await;

	let res = router
		.clone()
		.oneshot(login_request("nobody@acme.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn platform_admin_can_log_in() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_platform_admin(&app, "root@idp.example", "hunter2hunter2").await;

	let res = router
		.clone()
		.oneshot(login_request("root@idp.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::OK);
	let body = body_json(res).await;
	assert!(body["currentTenant"].is_null());
}

#[tokio::test]
async fn bad_password_is_a_single_opaque_401() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	// Wrong password and unknown email read identically
	let res = router
		.clone()
		.oneshot(login_request("admin@acme.example", "wrong-password"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	let wrong_pw = body_json(res).await;

	let res = router
		.clone()
		.oneshot(login_request("ghost@acme.example", "wrong-password"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	let unknown = body_json(res).await;
	assert_eq!(wrong_pw, unknown);
}

#[tokio::test]
async fn lockout_after_repeated_failures() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	// test config locks after 3 attempts
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	for _ in 0..3 {
		let res = router
			.clone()
			.oneshot(login_request("admin@acme.example", "wrong-password"))
			.await
			.expect("login");
		assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	}

	// Locked now, even with the right password
	let res = router
		.clone()
		.oneshot(login_request("admin@acme.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(body_json(res).await["error"], "account locked");
}

#[tokio::test]
async fn login_destroys_the_presented_session() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	let first = login(&router, "admin@acme.example", "hunter2hunter2").await;

	// Log in again while presenting the first session id
	let mut req = login_request("admin@acme.example", "hunter2hunter2");
	req.headers_mut().insert(
		header::COOKIE,
		format!("tg_session={}", first).parse().expect("cookie header"),
	);
	let res = router.clone().oneshot(req).await.expect("login");
	assert_eq!(res.status(), StatusCode::OK);
	let second = session_cookie(&res).expect("cookie");
	assert_ne!(first, second);

	// The old id is unusable afterwards
	let res = router.clone().oneshot(me_request(&first)).await.expect("me");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	let res = router.clone().oneshot(me_request(&second)).await.expect("me");
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_on_login_is_rejected() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	let mut req = login_request("admin@acme.example", "hunter2hunter2");
	req.headers_mut().insert("x-tenant-id", "foo".parse().expect("header"));
	let res = router.clone().oneshot(req).await.expect("login");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
	let body = body_json(res).await;
	assert!(
		body["error"].as_str().expect("error").contains("tenant context"),
		"error should name the tenant context rule: {body}"
	);
}

#[tokio::test]
async fn logout_destroys_the_session() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/auth/logout")
		.header(header::COOKIE, format!("tg_session={}", cookie))
		.header(CSRF_HEADER.0, CSRF_HEADER.1)
		.body(Body::empty())
		.expect("request");
	let res = router.clone().oneshot(req).await.expect("logout");
	assert_eq!(res.status(), StatusCode::OK);

	let res = router.clone().oneshot(me_request(&cookie)).await.expect("me");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_is_disabled() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	let res = router
		.clone()
		.oneshot(json_request("POST", "/api/v1/auth/register", json!({ "email": "x@y.example" })))
		.await
		.expect("register");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn state_changing_requests_need_the_csrf_marker() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;

	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/auth/login")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(
			json!({ "email": "admin@acme.example", "password": "hunter2hunter2" }).to_string(),
		))
		.expect("request");
	let res = router.clone().oneshot(req).await.expect("login");
	assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn change_password_roundtrip() {
	let app = test_app().await;
	let router = router(&app, Mode::All);
	seed_user(&app, "acme", "admin@acme.example", "hunter2hunter2", Some("tenant_admin")).await;
	let cookie = login(&router, "admin@acme.example", "hunter2hunter2").await;

	let mut req = json_request(
		"POST",
		"/api/v1/user/change-password",
		json!({ "currentPassword": "hunter2hunter2", "newPassword": "correct-horse-battery" }),
	);
	req.headers_mut().insert(
		header::COOKIE,
		format!("tg_session={}", cookie).parse().expect("cookie header"),
	);
	let res = router.clone().oneshot(req).await.expect("change password");
	assert_eq!(res.status(), StatusCode::OK);

	// Old password no longer works, new one does
	let res = router
		.clone()
		.oneshot(login_request("admin@acme.example", "hunter2hunter2"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
	let res = router
		.clone()
		.oneshot(login_request("admin@acme.example", "correct-horse-battery"))
		.await
		.expect("login");
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn short_password_is_rejected_at_exact_boundary() {
	let app = test_app().await;
	// 7 chars fails, 8 passes (configured minimum is 8)
	let (_, identity) =
		seed_user(&app, "acme", "len@acme.example", "hunter2hunter2", None).await;
	assert!(app.identity.add_password(&identity.id, "1234567").await.is_err());
	assert!(app.identity.add_password(&identity.id, "12345678").await.is_ok());
}

// vim: ts=4
