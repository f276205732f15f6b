//! Signing-key lifecycle.
//!
//! One RSA-2048 key, loaded at boot and generated on first run. The private
//! key is sealed with the master key (ChaCha20-Poly1305, per-record nonce
//! prepended to the ciphertext) before it reaches the store. The kid is a
//! digest of the modulus, so it is stable across restarts for the same key
//! material.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chacha20poly1305::{
	aead::{Aead, AeadCore, KeyInit, OsRng},
	ChaCha20Poly1305, Nonce,
};
use rsa::{
	pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
	traits::PublicKeyParts,
	RsaPrivateKey,
};
use sha2::{Digest, Sha256};

use crate::core::utils::new_uuid;
use crate::prelude::*;
use crate::store::{SigningKey, Store};

const RSA_BITS: usize = 2048;
const NONCE_LEN: usize = 12;
const KID_LEN: usize = 16;

/// Decrypted signing key, ready for JOSE use. Kept read-only after boot;
/// concurrent signings share it freely.
pub struct ActiveKey {
	pub kid: String,
	pub encoding_key: jsonwebtoken::EncodingKey,
	pub public_key_pem: String,
	/// JWKS `n`, base64url unpadded big-endian modulus
	pub modulus_b64: String,
	/// JWKS `e`
	pub exponent_b64: String,
}

impl std::fmt::Debug for ActiveKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ActiveKey").field("kid", &self.kid).finish()
	}
}

/// kid = base64url(SHA-256(modulus bytes)), truncated.
pub fn derive_kid(modulus: &[u8]) -> String {
	let digest = Sha256::digest(modulus);
	let encoded = BASE64_URL.encode(digest);
	encoded[..KID_LEN].to_string()
}

fn seal(master_key: &[u8; 32], plaintext: &[u8]) -> TgResult<Vec<u8>> {
	let cipher = ChaCha20Poly1305::new(master_key.into());
	let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
	let ciphertext = cipher
		.encrypt(&nonce, plaintext)
		.map_err(|_| Error::CryptoError("signing key encryption failed".into()))?;
	let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
	sealed.extend_from_slice(&nonce);
	sealed.extend_from_slice(&ciphertext);
	Ok(sealed)
}

fn unseal(master_key: &[u8; 32], sealed: &[u8]) -> TgResult<Vec<u8>> {
	if sealed.len() <= NONCE_LEN {
		return Err(Error::CryptoError("sealed signing key is truncated".into()));
	}
	let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
	let cipher = ChaCha20Poly1305::new(master_key.into());
	cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|_| Error::CryptoError("signing key decryption failed; wrong master key?".into()))
}

fn activate(private_pem: &str) -> TgResult<ActiveKey> {
	let private = RsaPrivateKey::from_pkcs8_pem(private_pem)
		.map_err(|err| Error::CryptoError(format!("signing key unparsable: {}", err)))?;
	let public = private.to_public_key();
	let modulus = public.n().to_bytes_be();
	let exponent = public.e().to_bytes_be();
	let public_key_pem = public
		.to_public_key_pem(LineEnding::LF)
		.map_err(|err| Error::CryptoError(format!("public key encoding failed: {}", err)))?;
	let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(private_pem.as_bytes())?;

	Ok(ActiveKey {
		kid: derive_kid(&modulus),
		encoding_key,
		public_key_pem,
		modulus_b64: BASE64_URL.encode(&modulus),
		exponent_b64: BASE64_URL.encode(&exponent),
	})
}

/// Generate a fresh RSA keypair on the blocking pool (keygen takes a
/// noticeable fraction of a second).
async fn generate_private_pem() -> TgResult<String> {
	tokio::task::spawn_blocking(|| {
		let mut rng = rand::rngs::OsRng;
		let private = RsaPrivateKey::new(&mut rng, RSA_BITS)
			.map_err(|err| Error::CryptoError(format!("RSA key generation failed: {}", err)))?;
		private
			.to_pkcs8_pem(LineEnding::LF)
			.map(|pem| pem.to_string())
			.map_err(|err| Error::CryptoError(format!("private key encoding failed: {}", err)))
	})
	.await?
}

/// Load the current signing key, generating and persisting one on first
/// boot.
pub async fn load_or_generate(store: &Store, master_key: &[u8; 32]) -> TgResult<ActiveKey> {
	match store.signing_keys.read_current().await {
		Ok(record) => {
			let private_pem = unseal(master_key, &record.private_key_encrypted)?;
			let private_pem = String::from_utf8(private_pem)
				.map_err(|_| Error::CryptoError("decrypted signing key is not UTF-8".into()))?;
			let key = activate(&private_pem)?;
			info!("loaded signing key kid={}", key.kid);
			Ok(key)
		}
		Err(Error::NotFound) => {
			let private_pem = generate_private_pem().await?;
			let key = activate(&private_pem)?;
			let record = SigningKey {
				id: new_uuid(),
				algorithm: "RS256".into(),
				public_key_pem: key.public_key_pem.clone(),
				private_key_encrypted: seal(master_key, private_pem.as_bytes())?,
				created_at: Timestamp::now(),
				expires_at: None,
			};
			store.signing_keys.create(&record).await?;
			info!("generated signing key kid={}", key.kid);
			Ok(key)
		}
		Err(err) => Err(err),
	}
}


// vim: ts=4
