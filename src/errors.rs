use crate::services::{bucket_service::BucketError, token_service::AuthError};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "detail": self.message,
            "status": self.status.as_u16()
        }));

        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Token failures on protected routes are all 401s. The `/token` route maps
/// rejected credentials itself, since that surface answers 400 instead.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => AppError::unauthorized("Not authenticated"),
            AuthError::InvalidToken => AppError::unauthorized("Could not validate credentials"),
            AuthError::ExpiredToken => AppError::unauthorized("Token has expired"),
            AuthError::Signing(err) => AppError::internal(format!("could not sign token: {err}")),
        }
    }
}

impl From<BucketError> for AppError {
    fn from(err: BucketError) -> Self {
        let status = match &err {
            BucketError::InvalidBucketName { .. } | BucketError::InvalidFolderName { .. } => {
                StatusCode::BAD_REQUEST
            }
            BucketError::Conflict(_) => StatusCode::CONFLICT,
            BucketError::NotFound(_) => StatusCode::NOT_FOUND,
            BucketError::Forbidden(_) => StatusCode::FORBIDDEN,
            BucketError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_errors_map_to_http_statuses() {
        let cases = [
            (
                BucketError::InvalidBucketName {
                    name: "AB".into(),
                    reason: "too short".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (BucketError::Conflict("b".into()), StatusCode::CONFLICT),
            (BucketError::NotFound("b".into()), StatusCode::NOT_FOUND),
            (BucketError::Forbidden("b".into()), StatusCode::FORBIDDEN),
            (
                BucketError::Provider("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[test]
    fn unauthorized_responses_carry_bearer_challenge() {
        let response = AppError::from(AuthError::ExpiredToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
