//! Custom middlewares: request ids, rate limiting, tenant-context rules,
//! CSRF and session authentication.
//!
//! Stack order (outermost first): request id / tracing, rate limit, panic
//! recovery, timeout, logging, tenant resolution, CSRF, session auth,
//! cross-tenant check. The route groups in `routes.rs` compose these in
//! that order.

use axum::{
	body::Body,
	extract::State,
	http::{header, HeaderValue, Method, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};

use crate::core::extract::{cookie_value, remote_ip};
use crate::prelude::*;

/// Client-asserted tenant header. Never trusted; its presence alone is an
/// error.
pub const X_TENANT_ID: &str = "x-tenant-id";

/// CSRF double-submit marker required on state-changing browser calls.
pub const X_REQUESTED_WITH: &str = "x-requested-with";
const CSRF_EXPECTED: &str = "XMLHttpRequest";

const X_REQUEST_ID: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Assign a request id, run the request inside a span carrying it, and
/// echo it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
	use tracing::Instrument;

	let id = crate::core::utils::new_uuid();
	req.extensions_mut().insert(RequestId(id.clone()));
	let span = info_span!("request", %id, method = %req.method(), path = %req.uri().path());
	let mut res = next.run(req).instrument(span).await;
	if let Ok(value) = HeaderValue::from_str(&id) {
		res.headers_mut().insert(X_REQUEST_ID, value);
	}
	res
}

/// Token-bucket rate limit keyed by remote address.
pub async fn rate_limit(State(app): State<App>, req: Request<Body>, next: Next) -> Response {
	if let Some(ip) = remote_ip(&req) {
		if let Err(limited) = app.rate_limiter.check(ip) {
			return limited.into_response();
		}
	}
	next.run(req).await
}

/// Unauthenticated and protocol endpoints must not receive a client-supplied
/// tenant; tenant context is derived server-side.
pub async fn reject_tenant_header(req: Request<Body>, next: Next) -> TgResult<Response> {
	if req.headers().contains_key(X_TENANT_ID) {
		return Err(Error::TenantHeaderForbidden);
	}
	Ok(next.run(req).await)
}

/// Resolve the session cookie and make the session available to handlers.
/// Missing, expired or idle sessions end the request with 401.
pub async fn require_session(
	State(app): State<App>,
	mut req: Request<Body>,
	next: Next,
) -> TgResult<Response> {
	let cookie = cookie_value(req.headers(), &app.config.session.cookie_name)
		.ok_or(Error::Unauthorized)?;
	let session = match app.sessions.authenticate(&cookie).await {
		Ok(session) => session,
		Err(Error::NotFound) => return Err(Error::Unauthorized),
		Err(err) => return Err(err),
	};
	req.extensions_mut().insert(session);
	Ok(next.run(req).await)
}

/// After session auth: a client-supplied tenant header is still rejected.
/// Naming a tenant other than the session's is classified as a
/// cross-tenant attempt (403); otherwise it is a plain protocol violation
/// (400).
pub async fn cross_tenant_guard(req: Request<Body>, next: Next) -> TgResult<Response> {
	if let Some(asserted) = req.headers().get(X_TENANT_ID) {
		let session = req.extensions().get::<crate::store::Session>();
		let session_tenant =
			session.and_then(|s| s.tenant_id.as_ref()).map(|t| t.as_str().as_bytes());
		if session_tenant.is_some() && session_tenant != Some(asserted.as_bytes()) {
			warn!("cross-tenant header on authenticated request");
			return Err(Error::CrossTenant);
		}
		return Err(Error::TenantHeaderForbidden);
	}
	Ok(next.run(req).await)
}

/// State-changing browser calls must carry the non-simple marker header.
pub async fn require_csrf(req: Request<Body>, next: Next) -> TgResult<Response> {
	let method = req.method();
	let state_changing =
		!(method == Method::GET || method == Method::HEAD || method == Method::OPTIONS);
	if state_changing {
		let ok = req
			.headers()
			.get(X_REQUESTED_WITH)
			.and_then(|v| v.to_str().ok())
			.is_some_and(|v| v == CSRF_EXPECTED);
		if !ok {
			warn!("missing CSRF marker on {} {}", req.method(), req.uri().path());
			return Err(Error::PermissionDenied);
		}
	}
	Ok(next.run(req).await)
}

/// No-store headers for token and session responses.
pub fn no_store_headers() -> [(header::HeaderName, HeaderValue); 2] {
	[
		(header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
		(header::PRAGMA, HeaderValue::from_static("no-cache")),
	]
}

// vim: ts=4
