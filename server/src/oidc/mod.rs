//! OpenID Connect engine: discovery metadata, JWKS publication and
//! ID-token construction.
//!
//! This module knows nothing about the OAuth2 engine; the code grant calls
//! in through the `IdTokenMinter` capability it owns.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::core::utils::sha256_b64url;
use crate::prelude::*;

pub mod handler;
pub mod keys;

pub use keys::ActiveKey;

/// Subject identifier, pairwise per tenant: the same human gets a
/// different `sub` in every tenant, and a stable one within a tenant.
pub fn pairwise_sub(tenant_id: &TenantId, user_id: &UserId) -> String {
	sha256_b64url(&format!("{}:{}", tenant_id.0, user_id.0))
}

/// `at_hash` per OIDC Core §3.1.3.6: base64url of the left half of
/// SHA-256 over the ASCII access token.
pub fn at_hash(access_token: &str) -> String {
	let digest = Sha256::digest(access_token.as_bytes());
	BASE64_URL.encode(&digest[..digest.len() / 2])
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryDocument {
	pub issuer: String,
	pub authorization_endpoint: String,
	pub token_endpoint: String,
	pub jwks_uri: String,
	pub response_types_supported: Vec<String>,
	pub subject_types_supported: Vec<String>,
	pub id_token_signing_alg_values_supported: Vec<String>,
	pub scopes_supported: Vec<String>,
	pub grant_types_supported: Vec<String>,
	pub token_endpoint_auth_methods_supported: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
	pub kty: String,
	#[serde(rename = "use")]
	pub use_: String,
	pub alg: String,
	pub kid: String,
	pub n: String,
	pub e: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwkSet {
	pub keys: Vec<Jwk>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize)]
pub struct IdTokenClaims {
	pub iss: String,
	pub sub: String,
	pub aud: String,
	pub exp: i64,
	pub iat: i64,
	pub nonce: Option<String>,
	pub at_hash: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OidcService {
	issuer: String,
	key: Arc<ActiveKey>,
}

impl OidcService {
	pub fn new(issuer: String, key: Arc<ActiveKey>) -> Self {
		Self { issuer: issuer.trim_end_matches('/').to_string(), key }
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	pub fn discovery(&self) -> DiscoveryDocument {
		DiscoveryDocument {
			issuer: self.issuer.clone(),
			authorization_endpoint: format!("{}/oauth2/authorize", self.issuer),
			token_endpoint: format!("{}/oauth2/token", self.issuer),
			jwks_uri: format!("{}/jwks.json", self.issuer),
			response_types_supported: vec!["code".into()],
			subject_types_supported: vec!["public".into()],
			id_token_signing_alg_values_supported: vec!["RS256".into()],
			scopes_supported: vec!["openid".into(), "profile".into(), "email".into()],
			grant_types_supported: vec!["authorization_code".into(), "refresh_token".into()],
			token_endpoint_auth_methods_supported: vec![
				"client_secret_basic".into(),
				"client_secret_post".into(),
			],
		}
	}

	pub fn jwks(&self) -> JwkSet {
		JwkSet {
			keys: vec![Jwk {
				kty: "RSA".into(),
				use_: "sig".into(),
				alg: "RS256".into(),
				kid: self.key.kid.clone(),
				n: self.key.modulus_b64.clone(),
				e: self.key.exponent_b64.clone(),
			}],
		}
	}

	/// Build and sign an ID token.
	///
	/// `nonce` is echoed iff non-empty; `at_hash` is present iff an access
	/// token accompanies the ID token.
	pub fn sign_id_token(
		&self,
		tenant_id: &TenantId,
		user_id: &UserId,
		audience: &str,
		nonce: Option<&str>,
		access_token: Option<&str>,
		ttl: i64,
	) -> TgResult<String> {
		let now = Timestamp::now();
		let claims = IdTokenClaims {
			iss: self.issuer.clone(),
			sub: pairwise_sub(tenant_id, user_id),
			aud: audience.to_string(),
			exp: now.0 + ttl,
			iat: now.0,
			nonce: nonce.filter(|n| !n.is_empty()).map(str::to_string),
			at_hash: access_token.map(at_hash),
		};
		let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
		header.kid = Some(self.key.kid.clone());
		Ok(jsonwebtoken::encode(&header, &claims, &self.key.encoding_key)?)
	}
}


// vim: ts=4
