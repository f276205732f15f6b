//! Per-IP rate limiting.
//!
//! A token bucket per remote address, kept in an in-memory map behind a
//! read-write lock. A periodic sweep replaces the whole map; active clients
//! simply obtain a fresh bucket on their next request.

use axum::{http::StatusCode, response::IntoResponse, Json};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::prelude::*;
use crate::types::ErrorResponse;

#[derive(Clone, Copy, Debug)]
struct TokenBucket {
	tokens: f64,
	last_refill: Instant,
}

impl TokenBucket {
	fn new(burst: u32) -> Self {
		Self { tokens: f64::from(burst), last_refill: Instant::now() }
	}

	/// Refill by elapsed time, then try to take one token.
	fn try_take(&mut self, rps: u32, burst: u32) -> bool {
		let now = Instant::now();
		let elapsed = now.duration_since(self.last_refill).as_secs_f64();
		self.tokens = (self.tokens + elapsed * f64::from(rps)).min(f64::from(burst));
		self.last_refill = now;
		if self.tokens >= 1.0 {
			self.tokens -= 1.0;
			true
		} else {
			false
		}
	}
}

/// 429 response with a retry hint.
#[derive(Debug)]
pub struct RateLimited;

impl IntoResponse for RateLimited {
	fn into_response(self) -> axum::response::Response {
		let mut res = (
			StatusCode::TOO_MANY_REQUESTS,
			Json(ErrorResponse::new("rate limit exceeded")),
		)
			.into_response();
		res.headers_mut()
			.insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
		res
	}
}

#[derive(Debug)]
pub struct RateLimitManager {
	buckets: RwLock<HashMap<IpAddr, TokenBucket>>,
	rps: u32,
	burst: u32,
	sweep_interval: Duration,
}

impl RateLimitManager {
	pub fn new(config: &RateLimitConfig) -> Arc<Self> {
		Arc::new(Self {
			buckets: RwLock::new(HashMap::new()),
			rps: config.rps.max(1),
			burst: config.burst.max(1),
			sweep_interval: Duration::from_secs(config.sweep_interval.max(1)),
		})
	}

	/// Take one token for the address. `Err(RateLimited)` maps to 429.
	pub fn check(&self, ip: IpAddr) -> Result<(), RateLimited> {
		let mut buckets = self.buckets.write();
		let bucket = buckets.entry(ip).or_insert_with(|| TokenBucket::new(self.burst));
		if bucket.try_take(self.rps, self.burst) {
			Ok(())
		} else {
			Err(RateLimited)
		}
	}

	fn sweep(&self) {
		let mut buckets = self.buckets.write();
		let dropped = buckets.len();
		*buckets = HashMap::new();
		if dropped > 0 {
			debug!("rate-limit sweep dropped {} buckets", dropped);
		}
	}
}

/// Periodic whole-map replacement; bounds memory without per-entry TTLs.
pub fn spawn_sweeper(manager: Arc<RateLimitManager>) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(manager.sweep_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// The first tick fires immediately; skip it
		ticker.tick().await;
		loop {
			ticker.tick().await;
			manager.sweep();
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn manager(rps: u32, burst: u32) -> Arc<RateLimitManager> {
		RateLimitManager::new(&RateLimitConfig { rps, burst, sweep_interval: 600 })
	}

	#[test]
	fn burst_then_reject() {
		let limiter = manager(1, 5);
		let ip: IpAddr = "203.0.113.7".parse().expect("ip");
		for _ in 0..5 {
			assert!(limiter.check(ip).is_ok());
		}
		// Bucket drained; the next request within the same second fails
		assert!(limiter.check(ip).is_err());
	}

	#[test]
	fn addresses_are_independent() {
		let limiter = manager(1, 1);
		let a: IpAddr = "203.0.113.7".parse().expect("ip");
		let b: IpAddr = "203.0.113.8".parse().expect("ip");
		assert!(limiter.check(a).is_ok());
		assert!(limiter.check(a).is_err());
		assert!(limiter.check(b).is_ok());
	}

	#[test]
	fn sweep_resets_buckets() {
		let limiter = manager(1, 1);
		let ip: IpAddr = "203.0.113.7".parse().expect("ip");
		assert!(limiter.check(ip).is_ok());
		assert!(limiter.check(ip).is_err());
		limiter.sweep();
		assert!(limiter.check(ip).is_ok());
	}
}

// vim: ts=4
