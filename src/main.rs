mod config;
mod handlers;
mod history;
mod models;
mod session;
mod token;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Duration;
use handlers::AppState;
use history::SessionHistory;
use session::{create_session_store, SessionManager};
use std::sync::Arc;
use token::TokenSigner;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_session_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match config::load_config_with_fallback() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match create_session_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to initialize session store: {}", e);
            std::process::exit(1);
        }
    };

    let history = Arc::new(SessionHistory::new(
        &config.history.file,
        config.history.capacity,
    ));
    history.open().await;

    let signer = TokenSigner::new(&config.signer.secret_key, &config.signer.salt);
    let manager = Arc::new(SessionManager::new(
        signer,
        store,
        history.clone(),
        Duration::seconds(config.signer.max_age_secs),
    ));

    let state = AppState { manager };

    let app = Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/uploadfile", post(handlers::upload::upload_sum))
        .route(
            "/uploadfile-async",
            post(handlers::upload::upload_with_session),
        )
        .route("/sum", get(handlers::session::get_sum))
        .route("/sessions", get(handlers::session::get_all_sessions))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting upload session API on {}", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Persist the bounded session history exactly once on the way out.
    if let Err(e) = history.save().await {
        tracing::error!("Failed to save session history: {}", e);
    } else {
        tracing::info!("Session history saved");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
