// Reminder statistics endpoint

use axum::{extract::State, http::StatusCode, response::Json};
use tracing::error;

use super::common::{error_response, ApiResponse, ApiResult};
use crate::services::ReminderStats;
use crate::web::AppState;

pub async fn get_reminder_stats(State(state): State<AppState>) -> ApiResult<ReminderStats> {
    match state.stats_service.stats().await {
        Ok(stats) => Ok(Json(ApiResponse::success(stats))),
        Err(e) => {
            error!("Failed to read reminder stats: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
