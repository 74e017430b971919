// Push subscription endpoints

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use super::common::{error_response, ApiResponse, ApiResult};
use crate::database::PushSubscription;
use crate::push::encryption::validate_client_keys;
use crate::web::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

/// Subscription as produced by `PushSubscription.toJSON()` in the browser
#[derive(Debug, Deserialize)]
pub struct BrowserSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSubscriptionRequest {
    pub student_id: String,
    pub subscription: BrowserSubscription,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterSubscriptionRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct UnregisterResponse {
    pub removed: bool,
}

/// `applicationServerKey` for `pushManager.subscribe()`
pub async fn get_public_key(State(state): State<AppState>) -> ApiResult<PublicKeyResponse> {
    Ok(Json(ApiResponse::success(PublicKeyResponse {
        public_key: state.keys.public_key().to_string(),
    })))
}

pub async fn register_subscription(
    State(state): State<AppState>,
    Json(request): Json<RegisterSubscriptionRequest>,
) -> ApiResult<()> {
    let student_id = request.student_id.trim();
    if student_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "studentId is required".to_string(),
        ));
    }

    let subscription = request.subscription;
    match Url::parse(&subscription.endpoint) {
        Ok(url) if matches!(url.scheme(), "https" | "http") && url.has_host() => {}
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid endpoint URL: {}", subscription.endpoint),
            ))
        }
    }
    if let Err(e) = validate_client_keys(&subscription.keys.p256dh, &subscription.keys.auth) {
        return Err(error_response(StatusCode::BAD_REQUEST, e.to_string()));
    }

    let record = PushSubscription::new(
        subscription.endpoint,
        student_id,
        subscription.keys.p256dh,
        subscription.keys.auth,
        state.clock.now(),
    );
    match state.database.save_subscription(&record).await {
        Ok(()) => Ok(Json(ApiResponse::success(()))),
        Err(e) => {
            error!("Failed to save subscription: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn unregister_subscription(
    State(state): State<AppState>,
    Json(request): Json<UnregisterSubscriptionRequest>,
) -> ApiResult<UnregisterResponse> {
    match state.database.remove_subscription(&request.endpoint).await {
        Ok(removed) => {
            info!("Unregister request, removed: {}", removed);
            Ok(Json(ApiResponse::success(UnregisterResponse { removed })))
        }
        Err(e) => {
            error!("Failed to remove subscription: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
