//! Server-side sessions.
//!
//! Session ids are opaque CSPRNG tokens; all state lives in the store.
//! Expiry and idle timeout are enforced on read, so a stale row behaves
//! exactly like a missing one. A background sweep deletes expired rows.

use std::time::Duration;

use crate::audit::ClientMeta;
use crate::config::SessionConfig;
use crate::core::utils::random_token;
use crate::prelude::*;
use crate::store::{Identity, Session, SessionNamespace, Store};

/// 32 bytes -> 256 bits of entropy in the cookie value.
const SESSION_ID_BYTES: usize = 32;

/// Interval of the expired-session sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
pub struct SessionService {
	store: Store,
	lifetime: i64,
	idle_timeout: i64,
}

impl SessionService {
	pub fn new(store: Store, config: &SessionConfig) -> Self {
		Self { store, lifetime: config.lifetime, idle_timeout: config.idle_timeout }
	}

	/// Create a session for an authenticated identity. The tenant binding
	/// mirrors the identity and never changes afterwards.
	pub async fn create(
		&self,
		identity: &Identity,
		namespace: SessionNamespace,
		meta: &ClientMeta,
	) -> TgResult<Session> {
		let now = Timestamp::now();
		let session = Session {
			id: random_token(SESSION_ID_BYTES),
			tenant_id: identity.tenant_id.clone(),
			user_id: identity.id.clone(),
			ip_address: meta.ip_address.clone(),
			user_agent: meta.user_agent.clone(),
			expires_at: now.add_seconds(self.lifetime),
			created_at: now,
			last_seen_at: now,
			namespace,
		};
		self.store.sessions.create(&session).await?;
		Ok(session)
	}

	/// Resolve a session id from a cookie. Expired or idle sessions are
	/// destroyed and reported as absent; live ones get `last_seen_at`
	/// refreshed.
	pub async fn authenticate(&self, id: &str) -> TgResult<Session> {
		let mut session = self.store.sessions.read(id).await?;
		let now = Timestamp::now();
		if session.expires_at.has_passed()
			|| now.0 - session.last_seen_at.0 > self.idle_timeout
		{
			self.store.sessions.delete(id).await?;
			return Err(Error::NotFound);
		}
		self.store.sessions.touch(id, now).await?;
		session.last_seen_at = now;
		Ok(session)
	}

	/// Destroy a session. Unknown ids are fine; logout is idempotent.
	pub async fn destroy(&self, id: &str) -> TgResult<()> {
		self.store.sessions.delete(id).await
	}

	pub async fn sweep(&self) -> TgResult<u64> {
		self.store.sessions.delete_expired(Timestamp::now()).await
	}
}

/// Periodic expired-session collector. Runs until the process exits.
pub fn spawn_sweeper(sessions: std::sync::Arc<dyn SessionRepo>) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			ticker.tick().await;
			match sessions.delete_expired(Timestamp::now()).await {
				Ok(0) => {}
				Ok(n) => debug!("session sweep removed {} expired sessions", n),
				Err(err) => warn!("session sweep failed: {}", err),
			}
		}
	})
}


// vim: ts=4
