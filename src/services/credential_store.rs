//! Username → password verifier lookup used by the `/token` route.
//!
//! Verifiers are Argon2 PHC strings. The default store is a fixed table
//! loaded once at startup; anything that can answer
//! [`CredentialStore::verify_credential`] can replace it.

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use std::{collections::HashMap, fs, path::Path};
use tracing::warn;

pub const DEMO_USERNAME: &str = "admin";
pub const DEMO_PASSWORD: &str = "secret";
const DUMMY_PASSWORD: &str = "unknown-user-placeholder";

pub trait CredentialStore: Send + Sync {
    /// True only when `username` exists and `password` matches its verifier.
    fn verify_credential(&self, username: &str, password: &str) -> bool;
}

/// Immutable in-memory credential table.
#[derive(Debug, Clone)]
pub struct StaticCredentialStore {
    verifiers: HashMap<String, String>,
    /// Checked against when the username is unknown, so a miss costs the
    /// same Argon2 work as a wrong password.
    dummy_verifier: String,
}

impl Default for StaticCredentialStore {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl StaticCredentialStore {
    pub fn new(verifiers: HashMap<String, String>) -> Self {
        let dummy_verifier = hash_password(DUMMY_PASSWORD).unwrap_or_else(|err| {
            warn!("could not prepare dummy verifier: {}", err);
            String::new()
        });
        Self {
            verifiers,
            dummy_verifier,
        }
    }

    /// Load a JSON object of `{"username": "$argon2id$..."}` entries.
    ///
    /// Every verifier is parsed up front so a typo fails startup instead of
    /// silently locking a user out.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading credentials file {}", path.display()))?;
        let verifiers: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing credentials file {}", path.display()))?;

        for (username, verifier) in &verifiers {
            PasswordHash::new(verifier).map_err(|err| {
                anyhow::anyhow!("invalid verifier for user `{username}`: {err}")
            })?;
        }

        Ok(Self::new(verifiers))
    }

    /// Single well-known user for local development.
    pub fn with_demo_user() -> Result<Self> {
        warn!(
            "no credentials file configured; installing demo user `{}`",
            DEMO_USERNAME
        );
        let verifier = hash_password(DEMO_PASSWORD)?;
        Ok(Self::new(HashMap::from([(
            DEMO_USERNAME.to_string(),
            verifier,
        )])))
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn verify_credential(&self, username: &str, password: &str) -> bool {
        let Some(verifier) = self.verifiers.get(username) else {
            if let Ok(parsed) = PasswordHash::new(&self.dummy_verifier) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
            }
            return false;
        };
        match PasswordHash::new(verifier) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                warn!(username, "stored verifier is malformed: {}", err);
                false
            }
        }
    }
}

/// Hash `password` into a PHC string suitable for the credentials file.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("password hashing failed: {err}"))?;
    Ok(hash.to_string())
}
