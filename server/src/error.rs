//! Error handling subsystem. Implements the service error taxonomy and the
//! OAuth2 protocol error shape.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;
use crate::types::ErrorResponse;

pub type TgResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Validation (400)
	ValidationError(String),
	InvalidEmail,
	WeakPassword(usize),
	TenantHeaderForbidden,

	// Addressing (404)
	NotFound,

	// Conflicts (409)
	AlreadyExists(String),
	Conflict(String),

	// Authentication (401)
	Unauthorized,
	InvalidCredentials,
	AccountLocked,

	// Authorization (403)
	PermissionDenied,
	InsufficientPrivileges,
	CrossTenant,
	RegistrationDisabled,

	// Internal (500)
	DbError,
	CryptoError(String),
	ConfigError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("json error: {}", err);
		Error::Internal("serialization error".into())
	}
}

impl From<jsonwebtoken::errors::Error> for Error {
	fn from(err: jsonwebtoken::errors::Error) -> Self {
		warn!("jwt error: {}", err);
		Error::CryptoError("token signing error".into())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", err);
		Error::Internal("task execution failed".into())
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match self {
			Error::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
			Error::InvalidEmail => (StatusCode::BAD_REQUEST, "invalid email address".to_string()),
			Error::WeakPassword(min) => {
				(StatusCode::BAD_REQUEST, format!("password must be at least {} characters", min))
			}
			Error::TenantHeaderForbidden => (
				StatusCode::BAD_REQUEST,
				"tenant context must not be supplied by the client".to_string(),
			),
			Error::NotFound => (StatusCode::NOT_FOUND, "resource not found".to_string()),
			Error::AlreadyExists(what) => (StatusCode::CONFLICT, format!("{} already exists", what)),
			Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
			// A single message for all pre-authentication failures so that
			// account existence is not disclosed
			Error::Unauthorized | Error::InvalidCredentials => {
				(StatusCode::UNAUTHORIZED, "invalid credentials".to_string())
			}
			Error::AccountLocked => (StatusCode::UNAUTHORIZED, "account locked".to_string()),
			Error::PermissionDenied => (StatusCode::FORBIDDEN, "permission denied".to_string()),
			Error::InsufficientPrivileges => {
				(StatusCode::FORBIDDEN, "insufficient_privileges".to_string())
			}
			Error::CrossTenant => (StatusCode::FORBIDDEN, "cross-tenant access denied".to_string()),
			Error::RegistrationDisabled => {
				(StatusCode::FORBIDDEN, "registration is disabled".to_string())
			}
			// Server errors (5xx): opaque message, detail only in logs
			Error::DbError => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
			Error::CryptoError(msg) => {
				warn!("crypto error: {}", msg);
				(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
			}
			Error::ConfigError(msg) => {
				warn!("config error: {}", msg);
				(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
			}
			Error::Internal(msg) => {
				warn!("internal error: {}", msg);
				(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
			}
			Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
		};

		(status, Json(ErrorResponse::new(message))).into_response()
	}
}

// OAuth2 protocol errors //
//************************//

/// RFC 6749 error codes used by the protocol endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorKind {
	InvalidRequest,
	InvalidClient,
	InvalidGrant,
	UnauthorizedClient,
	UnsupportedGrantType,
	UnsupportedResponseType,
	InvalidScope,
	AccessDenied,
	ServerError,
}

impl OAuthErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::InvalidRequest => "invalid_request",
			Self::InvalidClient => "invalid_client",
			Self::InvalidGrant => "invalid_grant",
			Self::UnauthorizedClient => "unauthorized_client",
			Self::UnsupportedGrantType => "unsupported_grant_type",
			Self::UnsupportedResponseType => "unsupported_response_type",
			Self::InvalidScope => "invalid_scope",
			Self::AccessDenied => "access_denied",
			Self::ServerError => "server_error",
		}
	}
}

/// Wire shape for protocol errors, per RFC 6749 §5.2.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthError {
	pub error: OAuthErrorKind,
	pub error_description: Option<String>,
	pub error_uri: Option<String>,
	pub state: Option<String>,
}

impl OAuthError {
	pub fn new(error: OAuthErrorKind) -> Self {
		Self { error, error_description: None, error_uri: None, state: None }
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());
		self
	}

	pub fn with_state(mut self, state: Option<String>) -> Self {
		self.state = state;
		self
	}

	pub fn invalid_request(description: impl Into<String>) -> Self {
		Self::new(OAuthErrorKind::InvalidRequest).with_description(description)
	}

	pub fn invalid_client(description: impl Into<String>) -> Self {
		Self::new(OAuthErrorKind::InvalidClient).with_description(description)
	}

	pub fn invalid_grant(description: impl Into<String>) -> Self {
		Self::new(OAuthErrorKind::InvalidGrant).with_description(description)
	}

	pub fn invalid_scope(description: impl Into<String>) -> Self {
		Self::new(OAuthErrorKind::InvalidScope).with_description(description)
	}

	pub fn server_error() -> Self {
		Self::new(OAuthErrorKind::ServerError)
	}

	/// Query-string fragment for error redirects back to the client.
	pub fn to_query(&self) -> String {
		let mut q = format!("error={}", self.error.as_str());
		if let Some(ref d) = self.error_description {
			q.push_str("&error_description=");
			q.push_str(&urlencode(d));
		}
		if let Some(ref s) = self.state {
			q.push_str("&state=");
			q.push_str(&urlencode(s));
		}
		q
	}
}

impl From<Error> for OAuthError {
	fn from(err: Error) -> Self {
		match err {
			Error::NotFound => Self::invalid_grant("unknown grant"),
			Error::Unauthorized | Error::InvalidCredentials => {
				Self::invalid_client("client authentication failed")
			}
			Error::ValidationError(msg) => Self::invalid_request(msg),
			other => {
				warn!("protocol-facing internal error: {}", other);
				Self::server_error()
			}
		}
	}
}

impl IntoResponse for OAuthError {
	fn into_response(self) -> axum::response::Response {
		let status = match self.error {
			OAuthErrorKind::InvalidClient => StatusCode::UNAUTHORIZED,
			OAuthErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
			_ => StatusCode::BAD_REQUEST,
		};
		let mut res = (status, Json(self)).into_response();
		if status == StatusCode::UNAUTHORIZED {
			res.headers_mut().insert(
				axum::http::header::WWW_AUTHENTICATE,
				axum::http::HeaderValue::from_static("Basic realm=\"oauth2\""),
			);
		}
		res
	}
}

fn urlencode(s: &str) -> String {
	url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}


// vim: ts=4
