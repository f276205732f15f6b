//! Public OIDC metadata endpoints.

use axum::{extract::State, Json};

use crate::prelude::*;

use super::{DiscoveryDocument, JwkSet};

/// # GET /.well-known/openid-configuration
pub async fn get_discovery(State(app): State<App>) -> Json<DiscoveryDocument> {
	Json(app.oidc.discovery())
}

/// # GET /jwks.json
pub async fn get_jwks(State(app): State<App>) -> Json<JwkSet> {
	Json(app.oidc.jwks())
}

// vim: ts=4
