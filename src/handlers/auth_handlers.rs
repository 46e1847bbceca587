//! `POST /token`: exchange a username/password form for a bearer token.

use axum::{Form, Json, extract::State};
use serde::Deserialize;

use crate::{
    errors::AppError,
    models::token::TokenResponse,
    services::token_service::{AuthError, TokenService},
};

/// OAuth2 password-grant style form. Extra fields such as `grant_type` and
/// `scope` are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

pub async fn issue_token(
    State(tokens): State<TokenService>,
    Form(form): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    // Argon2 verification is CPU-bound; keep it off the async workers.
    let issued = tokio::task::spawn_blocking(move || tokens.issue(&form.username, &form.password))
        .await
        .map_err(|err| AppError::internal(format!("token issue task failed: {err}")))?;
    match issued {
        Ok(token) => Ok(Json(token.into())),
        Err(AuthError::Unauthorized) => {
            Err(AppError::bad_request("Incorrect username or password"))
        }
        Err(err) => Err(err.into()),
    }
}
