//! Wire layer of the OAuth2 endpoints: parameter extraction, client
//! authentication transport (Basic or body) and redirect construction.

use axum::{
	extract::{Query, State},
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Form, Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;

use crate::audit::ClientMeta;
use crate::core::extract::Auth;
use crate::core::middleware::no_store_headers;
use crate::error::OAuthError;
use crate::prelude::*;

use super::{AuthorizeQuery, AuthorizeRejection, ClientCredentials, TokenRequest};

/// Client credentials from the Authorization header (Basic) or, failing
/// that, from the form body (RFC 6749 §2.3.1). Basic wins when both are
/// present.
fn client_credentials(headers: &HeaderMap, body: &TokenRequest) -> Option<ClientCredentials> {
	if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
		if let Some(encoded) = value.strip_prefix("Basic ") {
			let decoded = BASE64.decode(encoded.trim()).ok()?;
			let decoded = String::from_utf8(decoded).ok()?;
			let (id, secret) = decoded.split_once(':')?;
			return Some(ClientCredentials {
				client_id: id.to_string(),
				client_secret: (!secret.is_empty()).then(|| secret.to_string()),
			});
		}
	}
	body.client_id.as_ref().map(|id| ClientCredentials {
		client_id: id.clone(),
		client_secret: body.client_secret.clone(),
	})
}

/// 302 back to the client with query parameters appended.
fn redirect_with(redirect_uri: &str, params: &str) -> Response {
	let separator = if redirect_uri.contains('?') { '&' } else { '?' };
	let location = format!("{}{}{}", redirect_uri, separator, params);
	match header::HeaderValue::from_str(&location) {
		Ok(value) => {
			let mut res = StatusCode::FOUND.into_response();
			res.headers_mut().insert(header::LOCATION, value);
			res
		}
		Err(_) => OAuthError::server_error().into_response(),
	}
}

fn rejection_response(rejection: AuthorizeRejection) -> Response {
	match rejection {
		AuthorizeRejection::Direct(error) => error.into_response(),
		AuthorizeRejection::Redirect { redirect_uri, error } => {
			redirect_with(&redirect_uri, &error.to_query())
		}
	}
}

/// # GET /oauth2/authorize
///
/// Requires an authenticated resource-owner session. Success answers with
/// a 302 carrying `code` (and `state`); validation failures answer
/// directly or via error redirect depending on whether the redirect URI
/// could be trusted.
pub async fn get_authorize(
	State(app): State<App>,
	Auth(session): Auth,
	Query(query): Query<AuthorizeQuery>,
) -> Response {
	let ctx = match app.oauth2.validate_authorize(&query).await {
		Ok(ctx) => ctx,
		Err(rejection) => return rejection_response(rejection),
	};

	let code = match app
		.oauth2
		.issue_code(&ctx, &session.user_id, session.tenant_id.as_ref())
		.await
	{
		Ok(code) => code,
		Err(rejection) => return rejection_response(rejection),
	};

	let mut params = format!("code={}", code);
	if let Some(ref state) = ctx.state {
		params.push_str("&state=");
		params.push_str(&url::form_urlencoded::byte_serialize(state.as_bytes()).collect::<String>());
	}
	redirect_with(&ctx.redirect_uri, &params)
}

/// # POST /oauth2/token
pub async fn post_token(
	State(app): State<App>,
	headers: HeaderMap,
	meta: ClientMeta,
	Form(body): Form<TokenRequest>,
) -> Response {
	let Some(credentials) = client_credentials(&headers, &body) else {
		return OAuthError::invalid_client("client authentication required").into_response();
	};

	match app.oauth2.token_grant(&credentials, &body, &meta).await {
		Ok(tokens) => {
			let mut res = (StatusCode::OK, Json(tokens)).into_response();
			for (name, value) in no_store_headers() {
				res.headers_mut().insert(name, value);
			}
			res
		}
		Err(error) => error.into_response(),
	}
}

#[derive(Debug, serde::Deserialize)]
pub struct RevokeRequest {
	pub token: Option<String>,
	#[allow(dead_code)]
	pub token_type_hint: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

/// # POST /oauth2/revoke
///
/// RFC 7009: 200 whether or not the token was known, so existence never
/// leaks. Only client authentication failures are reported.
pub async fn post_revoke(
	State(app): State<App>,
	headers: HeaderMap,
	meta: ClientMeta,
	Form(body): Form<RevokeRequest>,
) -> Response {
	let as_token_request = TokenRequest {
		client_id: body.client_id.clone(),
		client_secret: body.client_secret.clone(),
		..TokenRequest::default()
	};
	let Some(credentials) = client_credentials(&headers, &as_token_request) else {
		return OAuthError::invalid_client("client authentication required").into_response();
	};
	let Some(token) = body.token.filter(|t| !t.is_empty()) else {
		return OAuthError::invalid_request("token is required").into_response();
	};

	match app.oauth2.revoke(&credentials, &token, &meta).await {
		Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
		Err(error) => error.into_response(),
	}
}


// vim: ts=4
