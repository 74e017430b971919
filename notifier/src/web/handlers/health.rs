// Health endpoint

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tracing::error;

use super::common::{error_response, ApiResponse, ApiResult};
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub subscriptions: u64,
}

/// Liveness plus a round trip to the store
pub async fn get_health(State(state): State<AppState>) -> ApiResult<HealthReport> {
    match state.database.count_subscriptions().await {
        Ok(subscriptions) => Ok(Json(ApiResponse::success(HealthReport {
            status: "ok",
            subscriptions,
        }))),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}
