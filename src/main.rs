use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inspection_reports::config::Settings;
use inspection_reports::document::json::JsonDocument;
use inspection_reports::document::DocumentKind;
use inspection_reports::errors::AppError;
use inspection_reports::handlers;
use inspection_reports::repository::ReportRepository;

// ==============================================================================
// MAIN APPLICATION
// ==============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting inspection report service");

    // Load configuration
    let settings = Settings::new()
        .or_else(|e| {
            warn!(error = %e, "Layered configuration unavailable, falling back to environment");
            Settings::from_env()
        })
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    info!(
        templates = %settings.repository.templates_dir.display(),
        reports = %settings.repository.reports_dir.display(),
        doc_type = %settings.repository.doc_type,
        "Configuration loaded"
    );

    let kind: DocumentKind = settings
        .repository
        .doc_type
        .parse()
        .map_err(|e: AppError| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let repository = match kind {
        DocumentKind::Json => ReportRepository::<JsonDocument>::new(settings.clone()),
    }
    .map_err(|e| std::io::Error::other(e.to_string()))?;
    let repository = web::Data::new(repository);

    let bind_address = (settings.server.host.clone(), settings.server.port);
    let server_settings = settings.server.clone();
    info!("Starting HTTP server on {}:{}", bind_address.0, bind_address.1);

    let mut server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .max_age(3600);
        for origin in &server_settings.cors_allowed_origins {
            cors = if origin == "*" {
                cors.allow_any_origin()
            } else {
                cors.allowed_origin(origin)
            };
        }

        let max_payload = server_settings.max_payload_mb * 1024 * 1024;
        let json_config = web::JsonConfig::default()
            .limit(max_payload)
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into());

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(json_config)
            .app_data(repository.clone())
            .configure(handlers::configure::<JsonDocument>)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server.bind(bind_address)?.run().await
}
