//! Credential hashing and secret generation.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix on every generated API key secret.
pub const API_KEY_PREFIX: &str = "tg_";

/// Number of leading characters kept as a non-secret display prefix.
pub const DISPLAY_PREFIX_LEN: usize = 10;

/// Stable hash of a raw credential value (hex SHA-256).
///
/// Used for API key secrets and blacklist lookups; raw credentials are
/// never stored.
pub fn hash_credential(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Random hex string built from `bytes` random bytes.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Generate a fresh API key secret.
pub fn generate_api_key_secret() -> String {
    format!("{}{}", API_KEY_PREFIX, random_hex(32))
}

/// Generate an opaque refresh token value.
pub fn generate_refresh_token() -> String {
    random_hex(32)
}

/// Non-secret display prefix of a credential.
pub fn display_prefix(secret: &str) -> String {
    secret.chars().take(DISPLAY_PREFIX_LEN).collect()
}
