//! Axum extractors for the authenticated session and remote-peer metadata.

use axum::{
	extract::{ConnectInfo, FromRequestParts},
	http::{header, request::Parts, HeaderMap},
};
use std::net::{IpAddr, SocketAddr};

use crate::audit::ClientMeta;
use crate::prelude::*;
use crate::store::Session;

/// Authenticated session, inserted by the session middleware.
#[derive(Clone, Debug)]
pub struct Auth(pub Session);

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> TgResult<Self> {
		parts.extensions.get::<Session>().cloned().map(Auth).ok_or(Error::Unauthorized)
	}
}

impl<S> FromRequestParts<S> for ClientMeta
where
	S: Send + Sync,
{
	type Rejection = std::convert::Infallible;

	async fn from_request_parts(
		parts: &mut Parts,
		_state: &S,
	) -> Result<Self, Self::Rejection> {
		let ip_address = remote_ip_from_parts(parts).map(|ip| ip.to_string());
		let user_agent = parts
			.headers
			.get(header::USER_AGENT)
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);
		Ok(ClientMeta { ip_address, user_agent })
	}
}

pub fn remote_ip_from_parts(parts: &Parts) -> Option<IpAddr> {
	parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip())
}

pub fn remote_ip<B>(req: &axum::http::Request<B>) -> Option<IpAddr> {
	req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip())
}

/// Value of the named cookie, if the request carries one.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
	let raw = headers.get(header::COOKIE)?.to_str().ok()?;
	raw.split(';').find_map(|pair| {
		let (k, v) = pair.trim().split_once('=')?;
		(k == name).then(|| v.to_string())
	})
}


// vim: ts=4
