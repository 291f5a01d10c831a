//! Per-request authorization pipeline
//!
//! Two middleware functions front the HTTP routes:
//!
//! - [`authenticate`] guards protected routes: bearer extraction, token
//!   verification, revocation check, then the verified [`TokenPayload`] is
//!   attached to the request for typed extraction downstream
//!   (`web::ReqData<TokenPayload>`).
//! - [`login_throttle`] guards the login and refresh endpoints only. It runs
//!   before any credential handling because it protects against
//!   credential-guessing traffic, not token misuse.
//!
//! A token's authorization status only ever moves forward: valid tokens
//! expire naturally or are revoked by logout, and neither state transitions
//! back.

use std::net::SocketAddr;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage};

use crate::errors::AuthError;
use crate::session::SessionManager;

const BEARER_PREFIX: &str = "Bearer ";

/// Pull the bearer token out of the authorization header
fn bearer_token(req: &ServiceRequest) -> Result<String, AuthError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?;

    let value = header.to_str().map_err(|_| AuthError::MissingCredentials)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(AuthError::MissingCredentials)
}

/// Best client address available for rate-limit keying
///
/// `realip_remote_addr` prefers the forwarding headers and falls back to the
/// peer address; a peer address still carries its port, which is stripped so
/// one client maps to one counter.
fn client_address(req: &ServiceRequest) -> Result<String, AuthError> {
    let info = req.connection_info();
    let addr = info
        .realip_remote_addr()
        .ok_or_else(|| AuthError::InvalidRequest("no valid client address".to_string()))?;

    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return Ok(socket.ip().to_string());
    }
    Ok(addr.to_string())
}

/// Middleware for protected routes
///
/// Pipeline with early exit on first failure: extract bearer token, verify
/// it cryptographically, check the revocation list through the session
/// manager (fail-closed), then attach the verified payload to the request
/// for handlers to extract as `web::ReqData<TokenPayload>`.
///
/// # Errors
///
/// Returns [`AuthError::MissingCredentials`], a verification error, a
/// [`AuthError::RevokedToken`], or [`AuthError::Cache`] when revocation
/// cannot be confirmed.
pub async fn authenticate(
    manager: web::Data<SessionManager>,
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let token = bearer_token(&req)?;
    let payload = manager.codec().verify(&token)?;
    manager.authorize(&payload).await?;

    req.extensions_mut().insert(payload);
    next.call(req).await
}

/// Middleware for the login and refresh endpoints
///
/// Counts the attempt against the client address and rejects with a 429 once
/// the window limit is exceeded. Runs before credential verification.
///
/// # Errors
///
/// Returns [`AuthError::RateLimited`] over the limit, or [`AuthError::Cache`]
/// when the counter cannot be read (the attempt is rejected, not waved
/// through).
pub async fn login_throttle(
    manager: web::Data<SessionManager>,
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let address = client_address(&req)?;
    manager.check_login_rate(&address).await?;

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::token::TokenPayload;
    use actix_web::middleware::from_fn;
    use actix_web::{test, App, HttpResponse};
    use chrono::Duration;
    use uuid::Uuid;

    async fn whoami(payload: web::ReqData<TokenPayload>) -> HttpResponse {
        HttpResponse::Ok().body(payload.subject_id.to_string())
    }

    #[actix_web::test]
    async fn test_missing_header_is_unauthorized() {
        let manager = testing::test_manager();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(manager))
                .wrap(from_fn(authenticate))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_malformed_scheme_is_unauthorized() {
        let manager = testing::test_manager();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(manager))
                .wrap(from_fn(authenticate))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_garbage_token_is_unauthorized() {
        let manager = testing::test_manager();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(manager))
                .wrap(from_fn(authenticate))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_verified_payload_reaches_the_handler() {
        let manager = testing::test_manager();
        let subject = Uuid::new_v4();
        let (_, token) = manager
            .codec()
            .issue(subject, false, Duration::minutes(5))
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(manager))
                .wrap(from_fn(authenticate))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body = test::read_body(resp).await;
        assert_eq!(body, subject.to_string().as_bytes());
    }
}
