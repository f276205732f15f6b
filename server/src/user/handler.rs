//! Self-service endpoints: profile and password change.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::audit::ClientMeta;
use crate::core::extract::Auth;
use crate::prelude::*;
use crate::store::Identity;

/// # GET /api/v1/user/profile
pub async fn get_profile(State(app): State<App>, Auth(session): Auth) -> TgResult<Json<Identity>> {
	Ok(Json(app.identity.get(&session.user_id).await?))
}

/// # PUT /api/v1/user/profile
///
/// Replaces the free-form profile document. Email and tenant binding are
/// not part of the profile and cannot be changed here.
pub async fn put_profile(
	State(app): State<App>,
	Auth(session): Auth,
	Json(profile): Json<Value>,
) -> TgResult<Json<Identity>> {
	if !profile.is_object() {
		return Err(Error::ValidationError("profile must be a JSON object".into()));
	}
	Ok(Json(app.identity.update_profile(&session.user_id, profile).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordReq {
	pub current_password: String,
	pub new_password: String,
}

/// # POST /api/v1/user/change-password
pub async fn post_change_password(
	State(app): State<App>,
	Auth(session): Auth,
	meta: ClientMeta,
	Json(req): Json<ChangePasswordReq>,
) -> TgResult<Json<serde_json::Value>> {
	if req.new_password == req.current_password {
		return Err(Error::ValidationError(
			"new password must differ from the current password".into(),
		));
	}
	app.identity
		.change_password(&session.user_id, &req.current_password, &req.new_password, &meta)
		.await?;
	Ok(Json(serde_json::json!({})))
}

// vim: ts=4
