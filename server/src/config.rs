//! Environment configuration.
//!
//! All settings come from `OT_*` environment variables. Invalid or missing
//! required values fail startup; there are no insecure fallbacks.

use base64::{engine::general_purpose::STANDARD as BASE64, engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use std::env;

use crate::error::{Error, TgResult};

/// Development placeholder that must never reach production. Startup is
/// refused when the configured master key equals this value.
const MASTER_KEY_SENTINEL: &str = "insecure_dev_key_must_change_!!";

/// Operational mode of a Trustgate process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
	/// OAuth2/OIDC surface plus resource-owner login
	Auth,
	/// Control-plane API for the admin UI
	Admin,
	/// Both route sets in one process
	All,
}

impl Mode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Mode::Auth => "auth",
			Mode::Admin => "admin",
			Mode::All => "all",
		}
	}

	pub fn serves_auth(&self) -> bool {
		matches!(self, Mode::Auth | Mode::All)
	}

	pub fn serves_admin(&self) -> bool {
		matches!(self, Mode::Admin | Mode::All)
	}
}

impl std::str::FromStr for Mode {
	type Err = Error;

	fn from_str(s: &str) -> TgResult<Self> {
		match s {
			"auth" => Ok(Mode::Auth),
			"admin" => Ok(Mode::Admin),
			"all" => Ok(Mode::All),
			other => Err(Error::ConfigError(format!("unknown mode: {}", other))),
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
	Lax,
	Strict,
	None,
}

impl SameSite {
	pub fn as_str(&self) -> &'static str {
		match self {
			SameSite::Lax => "Lax",
			SameSite::Strict => "Strict",
			SameSite::None => "None",
		}
	}
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
	pub listen: String,
	/// Per-request deadline in seconds
	pub request_timeout: u64,
	/// Graceful-shutdown drain bound in seconds
	pub shutdown_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
	pub path: String,
	pub max_open: u32,
	pub max_idle: u32,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
	pub cookie_name: String,
	pub cookie_domain: Option<String>,
	pub cookie_path: String,
	pub cookie_secure: bool,
	pub same_site: SameSite,
	/// Absolute lifetime in seconds
	pub lifetime: i64,
	/// Idle timeout in seconds, enforced on read
	pub idle_timeout: i64,
}

/// Argon2id cost parameters plus the password policy floor.
#[derive(Clone, Debug)]
pub struct PasswordConfig {
	pub memory_kib: u32,
	pub iterations: u32,
	pub parallelism: u32,
	pub min_length: usize,
}

#[derive(Clone, Debug)]
pub struct LockoutConfig {
	pub max_attempts: i64,
	/// Lock duration in seconds after the threshold is reached
	pub duration: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
	pub rps: u32,
	pub burst: u32,
	/// Bucket-table sweep interval in seconds
	pub sweep_interval: u64,
}

#[derive(Clone, Debug)]
pub struct OidcConfig {
	/// Issuer URL; authorize/token/jwks URIs are derived from it
	pub issuer: String,
	/// 32-byte master key for signing-key encryption at rest
	pub master_key: [u8; 32],
}

#[derive(Clone, Debug, Default)]
pub struct BootstrapConfig {
	pub admin_email: Option<String>,
	pub tenant_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
	pub server: ServerConfig,
	pub database: DatabaseConfig,
	pub session: SessionConfig,
	pub password: PasswordConfig,
	pub lockout: LockoutConfig,
	pub rate_limit: RateLimitConfig,
	pub oidc: OidcConfig,
	pub bootstrap: BootstrapConfig,
}

impl Config {
	pub fn from_env() -> TgResult<Self> {
		Ok(Config {
			server: ServerConfig {
				listen: env_or("OT_LISTEN", "127.0.0.1:8080"),
				request_timeout: parse_env("OT_REQUEST_TIMEOUT", 60)?,
				shutdown_timeout: parse_env("OT_SHUTDOWN_TIMEOUT", 30)?,
			},
			database: DatabaseConfig {
				path: env_or("OT_DATABASE_PATH", "./data/trustgate.db"),
				max_open: parse_env("OT_DB_MAX_OPEN", 10)?,
				max_idle: parse_env("OT_DB_MAX_IDLE", 2)?,
			},
			session: SessionConfig {
				cookie_name: env_or("OT_SESSION_COOKIE_NAME", "tg_session"),
				cookie_domain: env::var("OT_SESSION_COOKIE_DOMAIN").ok(),
				cookie_path: env_or("OT_SESSION_COOKIE_PATH", "/"),
				cookie_secure: parse_env("OT_SESSION_COOKIE_SECURE", true)?,
				same_site: parse_same_site(&env_or("OT_SESSION_SAME_SITE", "lax"))?,
				lifetime: parse_env("OT_SESSION_LIFETIME", 86_400)?,
				idle_timeout: parse_env("OT_SESSION_IDLE_TIMEOUT", 3600)?,
			},
			password: PasswordConfig {
				memory_kib: parse_env("OT_PASSWORD_MEMORY_KIB", 65_536)?,
				iterations: parse_env("OT_PASSWORD_ITERATIONS", 3)?,
				parallelism: parse_env("OT_PASSWORD_PARALLELISM", 4)?,
				min_length: parse_env("OT_PASSWORD_MIN_LENGTH", 8)?,
			},
			lockout: LockoutConfig {
				max_attempts: parse_env("OT_LOCKOUT_MAX_ATTEMPTS", 5)?,
				duration: parse_env("OT_LOCKOUT_DURATION", 900)?,
			},
			rate_limit: RateLimitConfig {
				rps: parse_env("OT_RATE_LIMIT_RPS", 10)?,
				burst: parse_env("OT_RATE_LIMIT_BURST", 20)?,
				sweep_interval: parse_env("OT_RATE_LIMIT_SWEEP_INTERVAL", 600)?,
			},
			oidc: OidcConfig {
				issuer: env_or("OT_ISSUER", "http://localhost:8080"),
				master_key: parse_master_key(env::var("OT_MASTER_KEY").ok().as_deref())?,
			},
			bootstrap: BootstrapConfig {
				admin_email: env::var("OT_BOOTSTRAP_ADMIN_EMAIL").ok(),
				tenant_name: env::var("OT_BOOTSTRAP_TENANT_NAME").ok(),
			},
		})
	}
}

fn env_or(key: &str, default: &str) -> String {
	env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> TgResult<T>
where
	T: std::str::FromStr,
{
	match env::var(key) {
		Ok(val) => val
			.parse()
			.map_err(|_| Error::ConfigError(format!("invalid value for {}: {}", key, val))),
		Err(_) => Ok(default),
	}
}

fn parse_same_site(s: &str) -> TgResult<SameSite> {
	match s.to_ascii_lowercase().as_str() {
		"lax" => Ok(SameSite::Lax),
		"strict" => Ok(SameSite::Strict),
		"none" => Ok(SameSite::None),
		other => Err(Error::ConfigError(format!("invalid OT_SESSION_SAME_SITE: {}", other))),
	}
}

/// Decode and validate the signing-key master key.
///
/// Accepts 64 hex chars, base64, or unpadded base64url, all decoding to
/// exactly 32 bytes. A missing key or the development sentinel refuses
/// startup.
pub fn parse_master_key(raw: Option<&str>) -> TgResult<[u8; 32]> {
	let raw = raw.ok_or_else(|| Error::ConfigError("OT_MASTER_KEY is not set".into()))?;
	if raw == MASTER_KEY_SENTINEL {
		return Err(Error::ConfigError(
			"OT_MASTER_KEY is set to the development placeholder; generate a real key".into(),
		));
	}

	let bytes = if raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
		hex::decode(raw).map_err(|_| Error::ConfigError("OT_MASTER_KEY: invalid hex".into()))?
	} else {
		BASE64
			.decode(raw)
			.or_else(|_| BASE64_URL.decode(raw))
			.map_err(|_| Error::ConfigError("OT_MASTER_KEY: invalid encoding".into()))?
	};

	let key: [u8; 32] = bytes
		.try_into()
		.map_err(|_| Error::ConfigError("OT_MASTER_KEY must decode to 32 bytes".into()))?;
	Ok(key)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn master_key_sentinel_is_refused() {
		assert!(matches!(
			parse_master_key(Some("insecure_dev_key_must_change_!!")),
			Err(Error::ConfigError(_))
		));
	}

	#[test]
	fn master_key_missing_is_refused() {
		assert!(parse_master_key(None).is_err());
	}

	#[test]
	fn master_key_hex_roundtrip() {
		let hex_key = "00".repeat(32);
		let key = parse_master_key(Some(&hex_key)).expect("hex key");
		assert_eq!(key, [0u8; 32]);
	}

	#[test]
	fn master_key_base64url() {
		let encoded = BASE64_URL.encode([7u8; 32]);
		let key = parse_master_key(Some(&encoded)).expect("b64url key");
		assert_eq!(key, [7u8; 32]);
	}

	#[test]
	fn master_key_wrong_length() {
		let encoded = BASE64.encode([1u8; 16]);
		assert!(parse_master_key(Some(&encoded)).is_err());
	}

	#[test]
	fn mode_parsing() {
		assert_eq!("auth".parse::<Mode>().expect("auth"), Mode::Auth);
		assert!(Mode::Auth.serves_auth());
		assert!(!Mode::Auth.serves_admin());
		assert!(Mode::All.serves_admin());
		assert!("proxy".parse::<Mode>().is_err());
	}
}

// vim: ts=4
