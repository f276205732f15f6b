//! Password hashing with Argon2id.
//!
//! Hashing runs on blocking threads; cost parameters come from
//! configuration and are encoded into the PHC hash string, so verification
//! keeps working across parameter changes.

use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
	Algorithm, Argon2, Params, Version,
};

use crate::config::PasswordConfig;
use crate::error::{Error, TgResult};

#[derive(Clone, Debug)]
pub struct PasswordHasher {
	memory_kib: u32,
	iterations: u32,
	parallelism: u32,
	min_length: usize,
}

impl PasswordHasher {
	pub fn new(config: &PasswordConfig) -> Self {
		Self {
			memory_kib: config.memory_kib,
			iterations: config.iterations,
			parallelism: config.parallelism,
			min_length: config.min_length,
		}
	}

	pub fn min_length(&self) -> usize {
		self.min_length
	}

	/// Reject passwords below the configured length floor.
	pub fn check_strength(&self, password: &str) -> TgResult<()> {
		if password.chars().count() < self.min_length {
			return Err(Error::WeakPassword(self.min_length));
		}
		Ok(())
	}

	fn params(&self) -> TgResult<Params> {
		Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
			.map_err(|err| Error::ConfigError(format!("invalid argon2 parameters: {}", err)))
	}

	/// Hash a password. CPU-heavy (~10 ms at default cost), so it runs on
	/// the blocking pool.
	pub async fn hash(&self, password: String) -> TgResult<String> {
		let params = self.params()?;
		tokio::task::spawn_blocking(move || {
			let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
			let salt = SaltString::generate(&mut OsRng);
			argon2
				.hash_password(password.as_bytes(), &salt)
				.map(|hash| hash.to_string())
				.map_err(|err| Error::CryptoError(format!("password hash failed: {}", err)))
		})
		.await?
	}

	/// Verify a password against a stored PHC string. The comparison inside
	/// argon2 is constant-time; a mismatch returns `Ok(false)`.
	pub async fn verify(&self, password: String, stored_hash: String) -> TgResult<bool> {
		tokio::task::spawn_blocking(move || {
			let parsed = PasswordHash::new(&stored_hash)
				.map_err(|err| Error::CryptoError(format!("stored hash unparsable: {}", err)))?;
			match Argon2::default().verify_password(password.as_bytes(), &parsed) {
				Ok(()) => Ok(true),
				Err(argon2::password_hash::Error::Password) => Ok(false),
				Err(err) => Err(Error::CryptoError(format!("password verify failed: {}", err))),
			}
		})
		.await?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::PasswordConfig;

	fn hasher() -> PasswordHasher {
		// Cheap parameters; production cost comes from config
		PasswordHasher::new(&PasswordConfig {
			memory_kib: 8,
			iterations: 1,
			parallelism: 1,
			min_length: 8,
		})
	}

	#[tokio::test]
	async fn hash_roundtrip() {
		let h = hasher();
		let hash = h.hash("correct horse".into()).await.expect("hash");
		assert!(hash.starts_with("$argon2id$"));
		assert!(h.verify("correct horse".into(), hash.clone()).await.expect("verify"));
		assert!(!h.verify("wrong horse".into(), hash).await.expect("verify"));
	}

	#[tokio::test]
	async fn hashes_are_salted() {
		let h = hasher();
		let a = h.hash("same password".into()).await.expect("hash");
		let b = h.hash("same password".into()).await.expect("hash");
		assert_ne!(a, b);
	}

	#[test]
	fn strength_floor_is_inclusive() {
		let h = hasher();
		assert!(h.check_strength("1234567").is_err());
		assert!(h.check_strength("12345678").is_ok());
	}
}

// vim: ts=4
