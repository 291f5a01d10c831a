// HTTP request handlers for the session service
pub mod auth;
pub mod health;

use actix_web::middleware::from_fn;
use actix_web::web;

use crate::gate;

// Re-export the main handler functions
pub use auth::{login, logout, refresh, session_info};
pub use health::health;

/// Wire the session routes with their gates
///
/// Login and refresh sit behind the rate-limit pre-gate; logout and session
/// introspection behind the authentication gate. Deployments embedding the
/// subsystem install the same gates in front of their own protected routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(from_fn(gate::login_throttle))
                    .route(web::post().to(login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(from_fn(gate::login_throttle))
                    .route(web::post().to(refresh)),
            )
            .service(
                web::resource("/logout")
                    .wrap(from_fn(gate::authenticate))
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/session")
                    .wrap(from_fn(gate::authenticate))
                    .route(web::get().to(session_info)),
            ),
    )
    .route("/ping", web::get().to(health));
}
