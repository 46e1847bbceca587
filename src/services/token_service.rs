//! Issues and verifies HS256 bearer tokens.
//!
//! Tokens are stateless: the signed claims carry the subject, issue time and
//! expiry, and nothing is stored server-side. There is no revocation; a token
//! stays valid until `exp`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::credential_store::CredentialStore;
use crate::models::token::{Claims, Token};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect username or password")]
    Unauthorized,
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error(transparent)]
    Signing(#[from] jsonwebtoken::errors::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone)]
pub struct TokenService {
    credentials: Arc<dyn CredentialStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(credentials: Arc<dyn CredentialStore>, secret: &[u8], ttl: Duration) -> Self {
        Self {
            credentials,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Check `username`/`password` against the credential store and mint a
    /// token for that subject.
    pub fn issue(&self, username: &str, password: &str) -> AuthResult<Token> {
        if !self.credentials.verify_credential(username, password) {
            warn!(username, "rejected login");
            return Err(AuthError::Unauthorized);
        }
        let token = self.sign(username, Utc::now())?;
        debug!(
            subject = %token.subject,
            issued_at = %token.issued_at,
            expires_at = %token.expires_at,
            "issued access token"
        );
        Ok(token)
    }

    /// Resolve a bearer token to its subject.
    ///
    /// Signature is checked before expiry, so a tampered token is reported as
    /// invalid even when it is also past `exp`.
    pub fn verify(&self, token: &str) -> AuthResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.sub)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    fn sign(&self, subject: &str, issued_at: DateTime<Utc>) -> AuthResult<Token> {
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let encoded = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(Token {
            access_token: encoded,
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }
}
