//! OAuth 2.0 engine: authorization-code grant with PKCE, refresh grant and
//! RFC 7009 revocation.
//!
//! Raw codes and tokens exist only on the wire; the store sees SHA-256
//! digests. The code exchange is serialized through the store's atomic
//! `mark_used`, so a code converts into tokens at most once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::skip_serializing_none;
use std::fmt::Debug;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditKind, AuditLogger, ClientMeta};
use crate::core::utils::{ct_eq, new_uuid, random_token, sha256_b64url};
use crate::error::{OAuthError, OAuthErrorKind};
use crate::oidc::OidcService;
use crate::prelude::*;
use crate::store::{
	AccessToken, AuthorizationCode, CodeChallengeMethod, OAuth2Client, RefreshToken, Store,
	TenantStatus,
};

pub mod handler;

/// Authorization codes live for five minutes.
const CODE_TTL: i64 = 300;
const CODE_BYTES: usize = 32;
const TOKEN_BYTES: usize = 32;

/// Capability the code grant uses to mint ID tokens. The OIDC engine
/// implements it without knowing who calls.
#[async_trait]
pub trait IdTokenMinter: Debug + Send + Sync {
	async fn mint_id_token(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
		audience: &str,
		nonce: Option<&str>,
		access_token: Option<&str>,
		ttl: i64,
	) -> TgResult<String>;
}

#[async_trait]
impl IdTokenMinter for OidcService {
	async fn mint_id_token(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
		audience: &str,
		nonce: Option<&str>,
		access_token: Option<&str>,
		ttl: i64,
	) -> TgResult<String> {
		self.sign_id_token(tenant_id, user_id, audience, nonce, access_token, ttl)
	}
}

/// Query parameters of GET /oauth2/authorize.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
	pub client_id: Option<String>,
	pub redirect_uri: Option<String>,
	pub response_type: Option<String>,
	pub scope: Option<String>,
	pub state: Option<String>,
	pub nonce: Option<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<String>,
}

/// A validated authorize request, safe to issue a code for.
#[derive(Clone, Debug)]
pub struct AuthorizeContext {
	pub client: OAuth2Client,
	pub redirect_uri: String,
	pub scope: String,
	pub state: Option<String>,
	pub nonce: Option<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<CodeChallengeMethod>,
}

/// How an authorize failure reaches the client: as a JSON body when the
/// redirect URI could not be trusted, as an error redirect otherwise.
#[derive(Debug)]
pub enum AuthorizeRejection {
	Direct(OAuthError),
	Redirect { redirect_uri: String, error: OAuthError },
}

/// Client credentials presented at the token endpoint (HTTP Basic or body
/// parameters, RFC 6749 §2.3.1).
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	pub client_id: String,
	pub client_secret: Option<String>,
}

/// Form body of POST /oauth2/token.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenRequest {
	pub grant_type: Option<String>,
	pub code: Option<String>,
	pub redirect_uri: Option<String>,
	pub code_verifier: Option<String>,
	pub refresh_token: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: String,
	pub expires_in: i64,
	pub refresh_token: Option<String>,
	pub id_token: Option<String>,
	pub scope: Option<String>,
}

/// True when every requested scope token is allowed for the client.
fn scope_allowed(requested: &str, allowed: &[String]) -> bool {
	requested.split_whitespace().all(|token| allowed.iter().any(|a| a == token))
}

/// PKCE verification per RFC 7636 §4.6.
fn verify_pkce(code: &AuthorizationCode, verifier: Option<&str>) -> Result<(), OAuthError> {
	let Some(challenge) = code.code_challenge.as_deref() else {
		// No challenge bound at issuance; nothing to verify
		return Ok(());
	};
	let Some(verifier) = verifier else {
		return Err(OAuthError::invalid_grant("code_verifier is required"));
	};
	let ok = match code.code_challenge_method.unwrap_or(CodeChallengeMethod::Plain) {
		CodeChallengeMethod::Plain => ct_eq(challenge, verifier),
		CodeChallengeMethod::S256 => ct_eq(challenge, &sha256_b64url(verifier)),
	};
	if ok {
		Ok(())
	} else {
		Err(OAuthError::invalid_grant("code verifier does not match"))
	}
}

#[derive(Clone, Debug)]
pub struct OAuth2Service {
	store: Store,
	audit: AuditLogger,
	minter: Arc<dyn IdTokenMinter>,
}

impl OAuth2Service {
	pub fn new(store: Store, audit: AuditLogger, minter: Arc<dyn IdTokenMinter>) -> Self {
		Self { store, audit, minter }
	}

	/// Validate an authorize request. Errors before the redirect URI is
	/// known to be registered come back as direct responses; everything
	/// after redirects with RFC error parameters.
	pub async fn validate_authorize(
		&self,
		query: &AuthorizeQuery,
	) -> Result<AuthorizeContext, AuthorizeRejection> {
		let direct = |err: OAuthError| AuthorizeRejection::Direct(err);

		let client_id = query
			.client_id
			.as_deref()
			.filter(|s| !s.is_empty())
			.ok_or_else(|| direct(OAuthError::invalid_request("client_id is required")))?;
		let redirect_uri = query
			.redirect_uri
			.as_deref()
			.filter(|s| !s.is_empty())
			.ok_or_else(|| direct(OAuthError::invalid_request("redirect_uri is required")))?;

		let client = match self.store.clients.read_by_client_id(client_id).await {
			Ok(client) => client,
			Err(Error::NotFound) => {
				return Err(direct(OAuthError::invalid_request("unknown client")))
			}
			Err(err) => return Err(direct(err.into())),
		};
		if !client.is_active {
			return Err(direct(OAuthError::invalid_request("client is inactive")));
		}

		// Exact byte-for-byte match against the registered URIs; no
		// normalization, no prefixes
		if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
			return Err(direct(OAuthError::invalid_request("redirect_uri is not registered")));
		}

		// From here on the redirect URI is trusted, so errors redirect
		let redirect =
			|error: OAuthError| AuthorizeRejection::Redirect {
				redirect_uri: redirect_uri.to_string(),
				error: error.with_state(query.state.clone()),
			};

		match self.store.tenants.read(&client.tenant_id).await {
			Ok(tenant) if tenant.status == TenantStatus::Active => {}
			Ok(_) => return Err(redirect(OAuthError::new(OAuthErrorKind::AccessDenied))),
			Err(err) => return Err(redirect(err.into())),
		}

		if query.response_type.as_deref() != Some("code") {
			return Err(redirect(
				OAuthError::new(OAuthErrorKind::UnsupportedResponseType)
					.with_description("only the code response type is supported"),
			));
		}

		let scope = query.scope.clone().unwrap_or_default();
		if !scope_allowed(&scope, &client.allowed_scopes) {
			return Err(redirect(OAuthError::invalid_scope("scope exceeds client allowance")));
		}

		let code_challenge_method = match (&query.code_challenge, &query.code_challenge_method) {
			(None, _) => None,
			(Some(_), None) => Some(CodeChallengeMethod::Plain),
			(Some(_), Some(method)) => match CodeChallengeMethod::parse(method) {
				Some(method) => Some(method),
				None => {
					return Err(redirect(OAuthError::invalid_request(
						"code_challenge_method must be plain or S256",
					)))
				}
			},
		};

		Ok(AuthorizeContext {
			client,
			redirect_uri: redirect_uri.to_string(),
			scope,
			state: query.state.clone(),
			nonce: query.nonce.clone(),
			code_challenge: query.code_challenge.clone(),
			code_challenge_method,
		})
	}

	/// Issue an authorization code for an authenticated resource owner.
	/// The session tenant must be the client's tenant; platform operators
	/// do not authorize against tenant applications.
	pub async fn issue_code(
		&self,
		ctx: &AuthorizeContext,
		user_id: &UserId,
		user_tenant: Option<&TenantId>,
	) -> Result<String, AuthorizeRejection> {
		if user_tenant != Some(&ctx.client.tenant_id) {
			return Err(AuthorizeRejection::Redirect {
				redirect_uri: ctx.redirect_uri.clone(),
				error: OAuthError::new(OAuthErrorKind::AccessDenied)
					.with_description("cross-tenant authorization")
					.with_state(ctx.state.clone()),
			});
		}

		let code = AuthorizationCode {
			code: random_token(CODE_BYTES),
			client_id: ctx.client.client_id.clone(),
			user_id: user_id.clone(),
			redirect_uri: ctx.redirect_uri.clone(),
			scope: ctx.scope.clone(),
			state: ctx.state.clone(),
			nonce: ctx.nonce.clone(),
			code_challenge: ctx.code_challenge.clone(),
			code_challenge_method: ctx.code_challenge_method,
			expires_at: Timestamp::from_now(CODE_TTL),
			is_used: false,
			used_at: None,
			created_at: Timestamp::now(),
		};
		self.store.auth_codes.create(&code).await.map_err(|err| {
			AuthorizeRejection::Redirect {
				redirect_uri: ctx.redirect_uri.clone(),
				error: OAuthError::from(err).with_state(ctx.state.clone()),
			}
		})?;
		Ok(code.code)
	}

	/// Authenticate the client at the token/revocation endpoint.
	async fn authenticate_client(
		&self,
		credentials: &ClientCredentials,
	) -> Result<OAuth2Client, OAuthError> {
		let client = match self.store.clients.read_by_client_id(&credentials.client_id).await {
			Ok(client) => client,
			Err(Error::NotFound) => {
				return Err(OAuthError::invalid_client("client authentication failed"))
			}
			Err(err) => return Err(err.into()),
		};
		if !client.is_active {
			return Err(OAuthError::invalid_client("client is inactive"));
		}
		match &client.client_secret_hash {
			Some(stored_hash) => {
				let presented = credentials
					.client_secret
					.as_deref()
					.ok_or_else(|| OAuthError::invalid_client("client secret is required"))?;
				if !ct_eq(stored_hash, &sha256_b64url(presented)) {
					return Err(OAuthError::invalid_client("client authentication failed"));
				}
			}
			None => {
				// Public client: nothing to verify; PKCE carries the proof
			}
		}
		Ok(client)
	}

	/// POST /oauth2/token dispatch.
	pub async fn token_grant(
		&self,
		credentials: &ClientCredentials,
		request: &TokenRequest,
		meta: &ClientMeta,
	) -> Result<TokenResponse, OAuthError> {
		let client = self.authenticate_client(credentials).await?;
		match request.grant_type.as_deref() {
			Some("authorization_code") => self.exchange_code(&client, request, meta).await,
			Some("refresh_token") => self.refresh_grant(&client, request, meta).await,
			Some(other) => Err(OAuthError::new(OAuthErrorKind::UnsupportedGrantType)
				.with_description(format!("unsupported grant type: {}", other))),
			None => Err(OAuthError::invalid_request("grant_type is required")),
		}
	}

	async fn exchange_code(
		&self,
		client: &OAuth2Client,
		request: &TokenRequest,
		meta: &ClientMeta,
	) -> Result<TokenResponse, OAuthError> {
		let raw_code = request
			.code
			.as_deref()
			.filter(|s| !s.is_empty())
			.ok_or_else(|| OAuthError::invalid_request("code is required"))?;

		let code = match self.store.auth_codes.read(raw_code).await {
			Ok(code) => code,
			Err(Error::NotFound) => {
				return Err(OAuthError::invalid_grant("unknown authorization code"))
			}
			Err(err) => return Err(err.into()),
		};

		if code.is_used {
			warn!("authorization code replay for client {}", client.client_id);
			return Err(OAuthError::invalid_grant("authorization code already used"));
		}
		if code.expires_at.has_passed() {
			return Err(OAuthError::invalid_grant("authorization code expired"));
		}
		if code.client_id != client.client_id {
			return Err(OAuthError::invalid_grant("authorization code was issued to another client"));
		}
		if request.redirect_uri.as_deref() != Some(code.redirect_uri.as_str()) {
			return Err(OAuthError::invalid_grant("redirect_uri does not match"));
		}
		verify_pkce(&code, request.code_verifier.as_deref())?;

		// The winner of this update owns the code; a concurrent exchange
		// that lost sees the replay error
		let won = self.store.auth_codes.mark_used(raw_code, Timestamp::now()).await?;
		if !won {
			return Err(OAuthError::invalid_grant("authorization code already used"));
		}

		let (access_raw, access_token) = self.mint_access_token(client, &code.user_id, &code.scope).await?;

		let refresh_raw = if client.grant_types.iter().any(|g| g == "refresh_token") {
			Some(self.mint_refresh_token(client, &access_token, &code.user_id, &code.scope).await?)
		} else {
			None
		};

		let id_token = if code.scope.split_whitespace().any(|s| s == "openid") {
			Some(
				self.minter
					.mint_id_token(
						&client.tenant_id,
						&code.user_id,
						&client.client_id,
						code.nonce.as_deref(),
						Some(&access_raw),
						client.id_token_ttl,
					)
					.await?,
			)
		} else {
			None
		};

		self.audit.emit(
			AuditEvent::new(AuditKind::TokenIssued)
				.tenant(Some(client.tenant_id.clone()))
				.actor(code.user_id.as_str())
				.resource("access_token")
				.client(meta)
				.metadata(json!({
					"clientId": client.client_id,
					"grant": "authorization_code",
					"scope": code.scope,
				})),
		);

		Ok(TokenResponse {
			access_token: access_raw,
			token_type: "Bearer".into(),
			expires_in: client.access_token_ttl,
			refresh_token: refresh_raw,
			id_token,
			scope: Some(code.scope),
		})
	}

	async fn refresh_grant(
		&self,
		client: &OAuth2Client,
		request: &TokenRequest,
		meta: &ClientMeta,
	) -> Result<TokenResponse, OAuthError> {
		if !client.grant_types.iter().any(|g| g == "refresh_token") {
			return Err(OAuthError::new(OAuthErrorKind::UnauthorizedClient)
				.with_description("client is not allowed the refresh grant"));
		}
		let raw = request
			.refresh_token
			.as_deref()
			.filter(|s| !s.is_empty())
			.ok_or_else(|| OAuthError::invalid_request("refresh_token is required"))?;

		let stored = match self.store.refresh_tokens.read_by_hash(&sha256_b64url(raw)).await {
			Ok(token) => token,
			Err(Error::NotFound) => return Err(OAuthError::invalid_grant("unknown refresh token")),
			Err(err) => return Err(err.into()),
		};
		if stored.is_revoked {
			return Err(OAuthError::invalid_grant("refresh token revoked"));
		}
		if stored.expires_at.has_passed() {
			return Err(OAuthError::invalid_grant("refresh token expired"));
		}
		if stored.client_id != client.client_id {
			return Err(OAuthError::invalid_grant("refresh token was issued to another client"));
		}

		let (access_raw, _) = self.mint_access_token(client, &stored.user_id, &stored.scope).await?;

		self.audit.emit(
			AuditEvent::new(AuditKind::TokenIssued)
				.tenant(Some(client.tenant_id.clone()))
				.actor(stored.user_id.as_str())
				.resource("access_token")
				.client(meta)
				.metadata(json!({
					"clientId": client.client_id,
					"grant": "refresh_token",
					"scope": stored.scope,
				})),
		);

		// The refresh token is not rotated; it stays valid until revoked
		// or expired
		Ok(TokenResponse {
			access_token: access_raw,
			token_type: "Bearer".into(),
			expires_in: client.access_token_ttl,
			refresh_token: None,
			id_token: None,
			scope: Some(stored.scope),
		})
	}

	/// RFC 7009: revoke the presented refresh token. The outcome is 200
	/// whether or not the token existed, so callers cannot probe for
	/// token validity.
	pub async fn revoke(
		&self,
		credentials: &ClientCredentials,
		token: &str,
		meta: &ClientMeta,
	) -> Result<(), OAuthError> {
		let client = self.authenticate_client(credentials).await?;
		match self.store.refresh_tokens.read_by_hash(&sha256_b64url(token)).await {
			Ok(stored) if stored.client_id == client.client_id && !stored.is_revoked => {
				self.store.refresh_tokens.revoke(&stored.id, Timestamp::now()).await?;
				self.audit.emit(
					AuditEvent::new(AuditKind::TokenRevoked)
						.tenant(Some(client.tenant_id.clone()))
						.actor(stored.user_id.as_str())
						.resource("refresh_token")
						.client(meta)
						.metadata(json!({ "clientId": client.client_id })),
				);
			}
			// Unknown, foreign or already-revoked tokens are not disclosed
			Ok(_) | Err(Error::NotFound) => {}
			Err(err) => return Err(err.into()),
		}
		Ok(())
	}

	async fn mint_access_token(
		&self,
		client: &OAuth2Client,
		user_id: &UserId,
		scope: &str,
	) -> Result<(String, AccessToken), OAuthError> {
		let raw = random_token(TOKEN_BYTES);
		let token = AccessToken {
			id: new_uuid(),
			token_hash: sha256_b64url(&raw),
			tenant_id: client.tenant_id.clone(),
			client_id: client.client_id.clone(),
			user_id: user_id.clone(),
			scope: scope.to_string(),
			expires_at: Timestamp::from_now(client.access_token_ttl),
			is_revoked: false,
			revoked_at: None,
			created_at: Timestamp::now(),
		};
		self.store.access_tokens.create(&token).await?;
		Ok((raw, token))
	}

	async fn mint_refresh_token(
		&self,
		client: &OAuth2Client,
		access_token: &AccessToken,
		user_id: &UserId,
		scope: &str,
	) -> Result<String, OAuthError> {
		let raw = random_token(TOKEN_BYTES);
		let token = RefreshToken {
			id: new_uuid(),
			token_hash: sha256_b64url(&raw),
			access_token_id: access_token.id.clone(),
			tenant_id: client.tenant_id.clone(),
			client_id: client.client_id.clone(),
			user_id: user_id.clone(),
			scope: scope.to_string(),
			expires_at: Timestamp::from_now(client.refresh_token_ttl),
			is_revoked: false,
			revoked_at: None,
			created_at: Timestamp::now(),
		};
		self.store.refresh_tokens.create(&token).await?;
		Ok(raw)
	}
}


// vim: ts=4
