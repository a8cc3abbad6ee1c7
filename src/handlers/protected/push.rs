use axum::{extract::Path, Extension, Json};
use serde::Serialize;

use crate::config;
use crate::database::models::push::{PushSubscription, RegisterPlayer};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::push::{PushReceipt, SendPushRequest};
use crate::services::PushService;

#[derive(Debug, Serialize)]
pub struct PushClientConfig {
    pub app_id: Option<String>,
    pub public_key: Option<String>,
}

/// GET /api/config/push - identifiers the client needs to register a device
pub async fn client_config(Extension(_user): Extension<AuthUser>) -> ApiResult<PushClientConfig> {
    let push = &config::config().push;
    Ok(ApiResponse::success(PushClientConfig {
        app_id: push.app_id.clone(),
        public_key: push.public_key.clone(),
    }))
}

/// POST /api/push/devices - register a relay player id for the caller
pub async fn register(
    Extension(user): Extension<AuthUser>,
    Json(input): Json<RegisterPlayer>,
) -> ApiResult<PushSubscription> {
    let subscription = PushService::new()
        .await?
        .register(user.user_id, &input.player_id)
        .await?;
    Ok(ApiResponse::created(subscription))
}

/// DELETE /api/push/devices/:player_id
pub async fn unregister(Extension(user): Extension<AuthUser>, Path(player_id): Path<String>) -> ApiResult<()> {
    PushService::new().await?.unregister(user.user_id, &player_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /functions/send-push - notify a partner or group member
///
/// ```json
/// { "type": "event" | "todo" | "note" | "shopping", "user_id": "...", "title": "...", "body": "...", "data": {} }
/// ```
pub async fn send(Extension(user): Extension<AuthUser>, Json(request): Json<SendPushRequest>) -> ApiResult<PushReceipt> {
    let receipt = PushService::new().await?.send(user.user_id, request).await?;
    Ok(ApiResponse::success(receipt))
}
