//! Session endpoint handlers: login, refresh, logout, session introspection

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AuthError;
use crate::session::SessionManager;
use crate::subjects::{verify_password, SubjectDirectory};
use crate::token::TokenPayload;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() {
            return Err(AuthError::InvalidRequest("username is required".to_string()));
        }
        if self.password.len() < 8 {
            return Err(AuthError::InvalidRequest(
                "password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SubjectResponse {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub subject: SubjectResponse,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInfoResponse {
    pub subject_id: Uuid,
    pub is_admin: bool,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

/// Authenticate a subject's credentials and open a session
///
/// An unknown username and a wrong password are indistinguishable to the
/// client. The rate-limit pre-gate has already counted this attempt before
/// the handler runs.
///
/// # Errors
///
/// Returns [`AuthError::InvalidRequest`] on malformed input,
/// [`AuthError::InvalidCredentials`] when authentication fails, or any
/// session manager error.
pub async fn login(
    manager: web::Data<SessionManager>,
    directory: web::Data<dyn SubjectDirectory>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    body.validate()?;

    let Some(subject) = directory.find_subject(&body.username).await? else {
        return Err(AuthError::InvalidCredentials);
    };

    // any verification failure reads as bad credentials
    if !verify_password(&body.password, &subject.password_hash).unwrap_or(false) {
        return Err(AuthError::InvalidCredentials);
    }

    let pair = manager.login(subject.id, subject.is_admin).await?;
    log::info!("subject {} logged in", subject.id);

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        subject: SubjectResponse {
            id: subject.id,
            username: subject.username,
            is_admin: subject.is_admin,
        },
    }))
}

/// Exchange a refresh token for a new access/refresh pair
///
/// # Errors
///
/// Returns [`AuthError::InvalidRequest`] on malformed input or any session
/// manager error; a replayed refresh token surfaces as
/// [`AuthError::SessionNotFound`].
pub async fn refresh(
    manager: web::Data<SessionManager>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AuthError> {
    if body.refresh_token.is_empty() {
        return Err(AuthError::InvalidRequest(
            "refresh_token is required".to_string(),
        ));
    }

    let pair = manager.refresh(&body.refresh_token).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// Revoke both tokens of the presented session
///
/// # Errors
///
/// Returns [`AuthError::InvalidRequest`] on malformed input, a verification
/// error for either token, or a cache error from the revocation write.
pub async fn logout(
    manager: web::Data<SessionManager>,
    body: web::Json<LogoutRequest>,
) -> Result<HttpResponse, AuthError> {
    if body.access_token.is_empty() || body.refresh_token.is_empty() {
        return Err(AuthError::InvalidRequest(
            "access_token and refresh_token are required".to_string(),
        ));
    }

    manager
        .logout(&body.access_token, &body.refresh_token)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "subject has successfully logged out".to_string(),
    }))
}

/// Echo the verified payload attached by the request gate
pub async fn session_info(payload: web::ReqData<TokenPayload>) -> HttpResponse {
    let payload = payload.into_inner();
    HttpResponse::Ok().json(SessionInfoResponse {
        subject_id: payload.subject_id,
        is_admin: payload.is_admin,
        issued_at: payload.issued_at,
        expired_at: payload.expired_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let ok = LoginRequest {
            username: "alice".to_string(),
            password: "longenough".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank_user = LoginRequest {
            username: "   ".to_string(),
            password: "longenough".to_string(),
        };
        assert!(matches!(
            blank_user.validate(),
            Err(AuthError::InvalidRequest(_))
        ));

        let short_password = LoginRequest {
            username: "alice".to_string(),
            password: "short".to_string(),
        };
        assert!(matches!(
            short_password.validate(),
            Err(AuthError::InvalidRequest(_))
        ));
    }
}
