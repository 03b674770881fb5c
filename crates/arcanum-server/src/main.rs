use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use arcanum_api::middleware::require_auth;
use arcanum_api::session::{SessionConfig, SessionManager};
use arcanum_api::{AppState, AppStateInner, auth, listings, trades};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arcanum=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ARCANUM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let issuer = std::env::var("ARCANUM_JWT_ISSUER").unwrap_or_else(|_| "arcanum".into());
    let audience =
        std::env::var("ARCANUM_JWT_AUDIENCE").unwrap_or_else(|_| "arcanum-clients".into());
    let access_ttl_minutes: i64 = std::env::var("ARCANUM_ACCESS_TTL_MINUTES")
        .unwrap_or_else(|_| "15".into())
        .parse()?;
    let refresh_ttl_days: i64 = std::env::var("ARCANUM_REFRESH_TTL_DAYS")
        .unwrap_or_else(|_| "7".into())
        .parse()?;
    let db_path = std::env::var("ARCANUM_DB_PATH").unwrap_or_else(|_| "arcanum.db".into());
    let host = std::env::var("ARCANUM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ARCANUM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = arcanum_db::Database::open(&PathBuf::from(&db_path))?;

    // Session manager gets its signing material and lifetimes explicitly —
    // nothing downstream reads the environment.
    let sessions = SessionManager::new(SessionConfig {
        secret: jwt_secret,
        issuer,
        audience,
        access_ttl: chrono::Duration::minutes(access_ttl_minutes),
        refresh_ttl: chrono::Duration::days(refresh_ttl_days),
    });

    // Shared state
    let state: AppState = Arc::new(AppStateInner { db, sessions });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/users/count", get(auth::user_count))
        .route("/marketplace/all", get(listings::all_listings))
        .route("/marketplace/top", get(listings::top_listings))
        .route("/trades/recent", get(trades::recent_trades))
        .route("/trades/stats", get(trades::trade_stats))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/marketplace",
            get(listings::my_listings).post(listings::create_listing),
        )
        .route(
            "/marketplace/{id}",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/trades", get(trades::my_trades).post(trades::create_trade))
        .route("/trades/{id}", get(trades::get_trade))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Arcanum server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
