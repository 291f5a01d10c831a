use actix_web::{HttpResponse, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Health check endpoint
///
/// # Errors
///
/// Never fails; the signature matches the route table.
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Vaultgate session service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}
