use axum::{extract::Path, Extension, Json};
use serde::Deserialize;

use crate::database::models::profile::{Profile, UpdateProfile};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::profile_service::TilePreferences;
use crate::services::ProfileService;

#[derive(Debug, Deserialize)]
pub struct SetTile {
    pub enabled: bool,
}

/// GET /api/profile - the caller's profile
pub async fn get(Extension(user): Extension<AuthUser>) -> ApiResult<Profile> {
    let profile = ProfileService::new().await?.get(user.user_id).await?;
    Ok(ApiResponse::success(profile))
}

/// PUT /api/profile - change username and/or avatar path
pub async fn update(Extension(user): Extension<AuthUser>, Json(input): Json<UpdateProfile>) -> ApiResult<Profile> {
    let profile = ProfileService::new().await?.update(user.user_id, input).await?;
    Ok(ApiResponse::success(profile))
}

/// GET /api/profile/tiles - dashboard tile switches (unset keys are enabled)
pub async fn tiles(Extension(user): Extension<AuthUser>) -> ApiResult<TilePreferences> {
    let prefs = ProfileService::new().await?.tile_preferences(user.user_id).await?;
    Ok(ApiResponse::success(prefs))
}

/// POST /api/profile/tiles/:tile/toggle - flip one tile
pub async fn toggle_tile(Extension(user): Extension<AuthUser>, Path(tile): Path<String>) -> ApiResult<TilePreferences> {
    let prefs = ProfileService::new().await?.toggle_tile(user.user_id, &tile).await?;
    Ok(ApiResponse::success(prefs))
}

/// PUT /api/profile/tiles/:tile - set one tile explicitly
pub async fn set_tile(
    Extension(user): Extension<AuthUser>,
    Path(tile): Path<String>,
    Json(input): Json<SetTile>,
) -> ApiResult<TilePreferences> {
    let prefs = ProfileService::new()
        .await?
        .set_tile(user.user_id, &tile, input.enabled)
        .await?;
    Ok(ApiResponse::success(prefs))
}
