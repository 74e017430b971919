// File: notifier/src/web/server.rs
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::web::{handlers, AppState};

/// Serve the API until `shutdown` is cancelled
pub async fn start_web_server(
    state: AppState,
    config: &WebConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === PUSH SUBSCRIPTION ROUTES ===
        .route("/api/push/public-key", get(handlers::get_public_key))
        .route(
            "/api/push/subscriptions",
            post(handlers::register_subscription).delete(handlers::unregister_subscription),
        )
        // === REMINDER ROUTES ===
        .route("/api/reminders/stats", get(handlers::get_reminder_stats))
        // === HEALTH ===
        .route("/api/health", get(handlers::get_health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
