//! App state type and construction.

use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::authz::{seed_roles, AuthzService};
use crate::config::Config;
use crate::identity::{IdentityService, PasswordHasher};
use crate::oauth2::OAuth2Service;
use crate::oidc::{keys, OidcService};
use crate::prelude::*;
use crate::session::SessionService;
use crate::store::Store;
use crate::tenant::TenantService;
use crate::core::rate_limit::RateLimitManager;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "trustgate";

pub struct AppState {
	pub config: Config,
	pub store: Store,
	pub audit: AuditLogger,
	pub identity: IdentityService,
	pub sessions: SessionService,
	pub authz: AuthzService,
	pub tenants: TenantService,
	pub oauth2: OAuth2Service,
	pub oidc: OidcService,
	pub rate_limiter: Arc<RateLimitManager>,
}

pub type App = Arc<AppState>;

impl AppState {
	/// Wire up all services over a store. Seeds the role catalog and loads
	/// (or generates) the signing key, so a failure here is a startup
	/// failure.
	pub async fn build(config: Config, store: Store) -> TgResult<App> {
		for role in seed_roles() {
			store.roles.upsert(&role).await?;
		}

		let key = keys::load_or_generate(&store, &config.oidc.master_key).await?;
		let oidc = OidcService::new(config.oidc.issuer.clone(), Arc::new(key));

		let audit = AuditLogger::new();
		let hasher = PasswordHasher::new(&config.password);
		let identity = IdentityService::new(
			store.clone(),
			hasher,
			config.lockout.clone(),
			audit.clone(),
		);
		let sessions = SessionService::new(store.clone(), &config.session);
		let authz = AuthzService::new(store.clone());
		let tenants = TenantService::new(store.clone(), audit.clone());
		let oauth2 = OAuth2Service::new(store.clone(), audit.clone(), Arc::new(oidc.clone()));
		let rate_limiter = RateLimitManager::new(&config.rate_limit);

		Ok(Arc::new(AppState {
			config,
			store,
			audit,
			identity,
			sessions,
			authz,
			tenants,
			oauth2,
			oidc,
			rate_limiter,
		}))
	}

	/// Start the periodic collectors (session expiry, rate-limit sweep).
	pub fn spawn_background(self: &Arc<Self>) {
		crate::session::spawn_sweeper(self.store.sessions.clone());
		crate::core::rate_limit::spawn_sweeper(self.rate_limiter.clone());
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState").field("service", &SERVICE_NAME).finish()
	}
}

// vim: ts=4
