//! Trustgate: a multi-tenant identity provider.
//!
//! Password authentication with server-side sessions, OAuth 2.0 /
//! OpenID Connect issuance and scoped role-based authorization under
//! strict tenant isolation. Persistence is abstracted behind the
//! repository contracts in [`store`]; adapter crates provide the concrete
//! backends.

pub mod audit;
pub mod auth;
pub mod authz;
pub mod bootstrap;
pub mod config;
pub mod core;
pub mod error;
pub mod identity;
pub mod oauth2;
pub mod oidc;
pub mod prelude;
pub mod routes;
pub mod session;
pub mod store;
pub mod tenant;
pub mod types;
pub mod user;

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::{Config, Mode};
use crate::core::app::AppState;
use crate::prelude::*;
use crate::store::Store;

/// Initialize the tracing subscriber from `RUST_LOG`.
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
}

async fn shutdown_signal(drain_bound: u64) {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.ok();
	};
	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => warn!("failed to install SIGTERM handler: {}", err),
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {}
		() = terminate => {}
	}

	info!("shutdown signal received, draining in-flight requests");
	// Bound the drain: if requests refuse to finish, leave anyway
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_secs(drain_bound)).await;
		warn!("drain bound of {}s exceeded, exiting", drain_bound);
		std::process::exit(0);
	});
}

/// Run the server in the given operational mode until shutdown.
///
/// Seeds roles, loads the signing key, runs the bootstrap step and serves
/// the mode's route set. Startup failures propagate; callers translate
/// them into exit code 1.
pub async fn run(config: Config, store: Store, mode: Mode) -> TgResult<()> {
	let app = AppState::build(config, store).await?;
	bootstrap::run(&app).await?;
	app.spawn_background();

	let router = routes::build_router(app.clone(), mode);
	let listener = tokio::net::TcpListener::bind(&app.config.server.listen).await?;
	info!(
		"trustgate {} listening on {} (mode: {})",
		crate::core::app::VERSION,
		app.config.server.listen,
		mode.as_str()
	);

	let drain_bound = app.config.server.shutdown_timeout;
	axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal(drain_bound))
		.await?;

	info!("shutdown complete");
	Ok(())
}

// vim: ts=4
