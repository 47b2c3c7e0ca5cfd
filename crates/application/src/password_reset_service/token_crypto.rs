use std::fmt::Write;

use jobgate_core::{AppError, AppResult};
use sha2::{Digest, Sha256};

/// Generates a random 32-byte token and its SHA-256 hash.
///
/// Returns `(raw_token_hex, sha256_hash_hex)`.
pub(super) fn generate_token() -> AppResult<(String, String)> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate reset token: {error}")))?;

    let raw_token = to_hex(&bytes);
    let hash = hash_token(&raw_token);
    Ok((raw_token, hash))
}

/// Hashes a raw token for storage and lookup.
pub(super) fn hash_token(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
