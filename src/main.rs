use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overdrive::oracle::{CategoryOracle, OracleConfig};
use overdrive::state::AppState;
use overdrive::ws;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overdrive=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Overdrive server...");

    // Category oracle: LLM-backed when configured, otherwise the local
    // fallback table keeps games playable.
    let oracle_config = OracleConfig::from_env();
    let oracle = match oracle_config.build_oracle() {
        Ok(oracle) => {
            tracing::info!("Category oracle initialized");
            oracle
        }
        Err(e) => {
            tracing::warn!(
                "No oracle provider configured: {}. Falling back to built-in categories; \
                 unlisted words will be rejected.",
                e
            );
            CategoryOracle::fallback_only()
        }
    };

    let state = AppState::new(oracle);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
