//! Small helpers shared across the crate: identifiers, random tokens and
//! digest encodings.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Time-ordered UUID for entity primary keys.
pub fn new_uuid() -> String {
	uuid::Uuid::now_v7().to_string()
}

/// Opaque CSPRNG token, base64url without padding. 32 bytes yields the
/// 256-bit entropy required for session ids, codes and bearer tokens.
pub fn random_token(bytes: usize) -> String {
	let mut buf = vec![0u8; bytes];
	rand::rngs::OsRng.fill_bytes(&mut buf);
	BASE64_URL.encode(buf)
}

/// base64url(SHA-256(input)); the at-rest form of tokens and client secrets.
pub fn sha256_b64url(input: &str) -> String {
	BASE64_URL.encode(Sha256::digest(input.as_bytes()))
}

/// Constant-time string equality for secret digests.
pub fn ct_eq(a: &str, b: &str) -> bool {
	a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn random_tokens_are_distinct() {
		let a = random_token(32);
		let b = random_token(32);
		assert_ne!(a, b);
		// 32 bytes -> 43 base64url chars, no padding
		assert_eq!(a.len(), 43);
		assert!(!a.contains('='));
	}

	#[test]
	fn sha256_digest_is_stable() {
		// echo -n "t1:u1" | sha256sum
		assert_eq!(sha256_b64url("t1:u1"), sha256_b64url("t1:u1"));
		assert_ne!(sha256_b64url("t1:u1"), sha256_b64url("t1:u2"));
	}

	#[test]
	fn ct_eq_matches_equality() {
		assert!(ct_eq("abc", "abc"));
		assert!(!ct_eq("abc", "abd"));
		assert!(!ct_eq("abc", "abcd"));
	}
}

// vim: ts=4
