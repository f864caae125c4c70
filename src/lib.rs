//! Church Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod slug;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::{AppConfig, AppState};

// Uploads are capped at 10 MB per file; leave headroom for multipart framing.
const MAX_REQUEST_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", get(routes::auth::verify_token_route))
        .route("/api/sermons", get(routes::sermons::list_sermons))
        .route(
            "/api/sermons/{slug_or_id}",
            get(routes::sermons::get_sermon),
        )
        .route(
            "/api/announcements",
            get(routes::announcements::list_announcements),
        )
        .route(
            "/api/announcements/{slug_or_id}",
            get(routes::announcements::get_announcement),
        )
        .route("/api/subscribe", post(routes::subscribers::subscribe))
        .route(
            "/api/worship-prayer",
            get(routes::worship::list_worship_prayer),
        )
        .route(
            "/api/worship-prayer/{id}",
            get(routes::worship::get_worship_prayer),
        )
        .route("/api/youtube/metadata", get(routes::youtube::get_metadata))
        .route(
            "/api/extract-document",
            post(routes::upload::extract_document),
        )
        .route("/api/upload-image", post(routes::upload::upload_image))
        .route(
            "/api/admin/sermons",
            post(routes::sermons::create_sermon),
        )
        .route(
            "/api/admin/sermons/{id}",
            axum::routing::put(routes::sermons::update_sermon)
                .delete(routes::sermons::delete_sermon),
        )
        .route(
            "/api/admin/announcements",
            post(routes::announcements::create_announcement),
        )
        .route(
            "/api/admin/announcements/{id}",
            axum::routing::put(routes::announcements::update_announcement)
                .delete(routes::announcements::delete_announcement),
        )
        .route(
            "/api/admin/subscribers",
            get(routes::subscribers::list_subscribers)
                .post(routes::subscribers::create_subscriber),
        )
        .route(
            "/api/admin/subscribers/{id}",
            axum::routing::put(routes::subscribers::update_subscriber)
                .delete(routes::subscribers::delete_subscriber),
        )
        .route(
            "/api/admin/worship-prayer",
            post(routes::worship::create_worship_prayer),
        )
        .route(
            "/api/admin/worship-prayer/{id}",
            axum::routing::put(routes::worship::update_worship_prayer)
                .delete(routes::worship::delete_worship_prayer),
        )
        .route("/api/admin/stats", get(routes::admin::get_stats))
        .route("/api/admin/users", get(routes::admin::list_users))
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    if environment == "production" {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() || secret == "default-jwt-secret-change-in-production" {
            panic!(
                "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
                 Refusing to start with the default secret."
            );
        }
    }

    let config = AppConfig::from_env();
    if config.cloudinary.is_none() {
        tracing::info!("Cloudinary not configured. Image uploads will be unavailable.");
    }

    if std::env::var("DATABASE_URL").is_ok() {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
    }

    let app = create_app(AppState::new(config));

    // Bind address is configurable via HOST / PORT env vars, defaulting to
    // 127.0.0.1:3001 so existing dev setups keep working unchanged.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
