//! Bearer-token gate for the `/buckets` routes.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    errors::AppError,
    services::token_service::{AuthError, TokenService},
};

/// Subject resolved from a verified token, available to handlers through
/// `Extension<AuthenticatedSubject>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub String);

/// Requires `Authorization: Bearer <token>` and admits the request only when
/// the token verifies. Rejections never reach the handler, so the provider is
/// not contacted.
pub async fn require_bearer(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let subject = tokens.verify(token).map_err(|err| {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "token rejected: {}",
            err
        );
        AppError::from(err)
    })?;

    request.extensions_mut().insert(AuthenticatedSubject(subject));
    Ok(next.run(request).await)
}

/// Pull the token out of the Authorization header. The scheme name is
/// matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthorized);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }
    Ok(token)
}
