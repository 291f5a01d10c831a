//! Error taxonomy for the session subsystem
//!
//! Every failure the subsystem can surface is a variant of [`AuthError`], so the
//! HTTP layer translates errors into status codes in exactly one place (the
//! [`ResponseError`] impl below). Cache failures are never downgraded to a
//! "not revoked" / "not rate limited" answer; they surface as internal errors
//! and the request is rejected.

use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::token::SYMMETRIC_KEY_SIZE;

/// Unified error type for token, cache, and session operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured symmetric key does not match the cipher's key size.
    /// Startup-fatal: no codec is ever constructed from a bad key.
    #[error("invalid key size: must be exactly {} bytes, got {0}", SYMMETRIC_KEY_SIZE)]
    InvalidKey(usize),

    /// Request body failed field validation
    #[error("{0}")]
    InvalidRequest(String),

    /// No usable bearer token in the authorization header
    #[error("authorization header is not provided")]
    MissingCredentials,

    /// Unknown subject or wrong password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Decryption or authentication of the token failed
    #[error("token is invalid")]
    InvalidToken,

    /// Token is cryptographically valid but past its expiry
    #[error("token has expired")]
    ExpiredToken,

    /// Token was explicitly signed out and must not be honored again
    #[error("token has been revoked")]
    RevokedToken,

    /// No refresh session record to consume: stale or already-used token
    #[error("unable to refresh access")]
    SessionNotFound,

    /// Login attempt counter for this client exceeded the window limit
    #[error("too many requests. Try again in 15 minutes")]
    RateLimited,

    /// A payload with an empty subject or token id reached the cache layer
    #[error("invalid token data to set in cache")]
    InvalidPayload,

    /// The cache backend failed; the caller must reject, not assume
    #[error("cache unavailable: {0}")]
    Cache(String),

    /// Anything else that should never leave the service as a 4xx
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Short machine-readable code used in JSON error bodies
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::RevokedToken => "revoked_token",
            Self::SessionNotFound => "session_not_found",
            Self::RateLimited => "rate_limited",
            Self::InvalidKey(_) | Self::InvalidPayload | Self::Cache(_) | Self::Internal(_) => {
                "server_error"
            }
        }
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredentials
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::RevokedToken => StatusCode::UNAUTHORIZED,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidKey(_) | Self::InvalidPayload | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail stays in the logs; clients get a generic description
        let description = if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request rejected: {self}");
            "An internal server error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": self.code(),
            "error_description": description,
        });

        HttpResponse::build(self.status_code())
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(
            AuthError::MissingCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ExpiredToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::RevokedToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::SessionNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AuthError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::Cache("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::InvalidKey(16).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cache_error_never_maps_to_unauthorized() {
        // A cache failure must read as "cannot confirm", not as a client fault
        let err = AuthError::Cache("connection refused".into());
        assert_eq!(err.code(), "server_error");
        assert_ne!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_key_size_message_names_required_size() {
        let err = AuthError::InvalidKey(16);
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));
    }
}
