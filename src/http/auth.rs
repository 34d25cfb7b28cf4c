// SPDX-License-Identifier: MIT

use axum::http::HeaderMap;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::core::Agent;
use crate::error::Error;

/// Generates a fresh, opaque API key. Returned to the caller exactly once at
/// registration time -- only its hash is ever persisted.
pub fn generate_api_key() -> String {
    const ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let key: String = (0..40).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("ark_{key}")
}

/// Generates a fresh per-agent HMAC signing secret.
pub fn generate_webhook_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracts the bearer token from `Authorization: Bearer <token>` and checks it
/// hashes to `agent.api_key_hash`. This crate's authentication is intentionally
/// unelaborated: a single stored hash per agent, no token rotation, no scopes.
pub fn authenticate(headers: &HeaderMap, agent: &Agent) -> Result<String, Error> {
    let token = bearer_token(headers)?;
    if hash_api_key(&token) != agent.api_key_hash {
        return Err(Error::Unauthorized);
    }
    Ok(token)
}

pub fn bearer_token(headers: &HeaderMap) -> Result<String, Error> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Unauthorized)?;
    value
        .strip_prefix("Bearer ")
        .map(str::to_owned)
        .ok_or(Error::Unauthorized)
}
