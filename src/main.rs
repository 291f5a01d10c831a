#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{anyhow, Context};
use vaultgate::{
    cache::RedisSessionCache,
    handlers,
    session::SessionManager,
    settings::VaultgateSettings,
    subjects::{StaticSubjectDirectory, SubjectDirectory},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads the .env file
    let settings =
        VaultgateSettings::load().map_err(|e| anyhow!("failed to load settings: {e}"))?;
    settings.init_logging();

    // The cache connection is owned here and injected; nothing downstream
    // manages its lifecycle
    let cache = RedisSessionCache::connect(&settings.redis.url)
        .await
        .context("failed to connect to session cache")?;

    let session_manager = SessionManager::from_settings(&settings, Arc::new(cache))
        .context("failed to create session manager")?;

    let directory = StaticSubjectDirectory::from_settings(&settings.subjects)
        .context("failed to load subject directory")?;
    if settings.subjects.is_empty() {
        log::warn!("no subjects configured; every login will be rejected");
    }
    let directory: Arc<dyn SubjectDirectory> = Arc::new(directory);

    println!("✓ Using encrypted opaque tokens with Redis-backed revocation");
    start_server(session_manager, directory, settings)
        .await
        .context("server error")
}

/// Start the server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    session_manager: SessionManager,
    directory: Arc<dyn SubjectDirectory>,
    settings: VaultgateSettings,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    // Configure CORS for SPAs
    let cors_origins = settings.get_cors_origins();

    let manager_data = web::Data::new(session_manager);
    let directory_data = web::Data::from(directory);

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(manager_data.clone())
            .app_data(directory_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &VaultgateSettings) {
    println!("🚀 Starting Vaultgate v{}", vaultgate::VERSION);
    println!("📡 Listening on: http://{bind_address}");
    println!(
        "🔑 Access tokens valid {}s, refresh tokens {}s",
        settings.token.access_duration_seconds, settings.token.refresh_duration_seconds
    );
    println!("🗄️  Session cache: {}", settings.redis.url);
}
