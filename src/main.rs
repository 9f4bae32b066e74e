use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use services::{gemini::GeminiClient, render::PdfRenderer};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimitState,
    pub gemini: GeminiClient,
    pub pdf: PdfRenderer,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthjournal_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    let db = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; analysis, report and chat requests will fail");
    }

    let gemini = GeminiClient::new(&config).expect("Failed to build Gemini client");
    let pdf = PdfRenderer::new(&config).expect("Failed to build PDF renderer");

    let rate_limiter = RateLimitState::new();
    rate_limiter.spawn_cleanup_worker();

    let state = AppState {
        db,
        config: config.clone(),
        rate_limiter,
        gemini,
        pdf,
    };

    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    // Connect info feeds the per-IP limiter on the auth routes.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("Server error");
}

fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .merge(auth_routes);

    // Generative endpoints; the per-user limiter needs the AuthUser that
    // require_auth inserts, so these are merged under it below.
    let ai_routes = Router::new()
        .route("/api/analysis/weekly", get(handlers::analysis::weekly_analysis))
        .route("/api/reports", post(handlers::reports::create_report))
        .route("/api/chat", post(handlers::chat::send_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_ai,
        ));

    let protected_routes = Router::new()
        .route(
            "/api/me",
            get(handlers::auth::me).put(handlers::auth::update_profile),
        )
        .route(
            "/api/health-logs",
            get(handlers::health_logs::list_health_logs)
                .post(handlers::health_logs::create_health_log),
        )
        .route(
            "/api/health-logs/:id",
            put(handlers::health_logs::update_health_log)
                .delete(handlers::health_logs::delete_health_log),
        )
        .merge(ai_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.frontend_url))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origins(frontend_url: &str) -> Vec<HeaderValue> {
    let mut origins = Vec::new();
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origins.push(origin),
        Err(_) => tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin"),
    }
    // In dev, also allow LAN access (e.g. testing from another device)
    if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
        for o in extra.split(',') {
            if let Ok(hv) = o.trim().parse::<HeaderValue>() {
                origins.push(hv);
            }
        }
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState {
            db,
            gemini: GeminiClient::new(&config).unwrap(),
            pdf: PdfRenderer::new(&config).unwrap(),
            config: Arc::new(config),
            rate_limiter: RateLimitState::new(),
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["service"], "healthjournal-api");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for (method, uri) in [
            ("GET", "/api/me"),
            ("GET", "/api/health-logs"),
            ("GET", "/api/analysis/weekly"),
            ("POST", "/api/reports"),
            ("POST", "/api/chat"),
        ] {
            let app = build_router(test_state());
            let response = app
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/health-logs")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 401);
    }

    #[test]
    fn test_allowed_origins_includes_frontend() {
        let origins = allowed_origins("http://localhost:3000");
        assert_eq!(origins[0], "http://localhost:3000");
    }
}
