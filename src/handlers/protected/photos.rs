use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header::CONTENT_TYPE, HeaderMap},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::photo::{AssignPhoto, PhotoAssignment, PhotoView, UploadQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::photo_service::SlotPhoto;
use crate::services::PhotoService;

/// POST /api/photos?filename=&caption= - raw image bytes in the body
pub async fn upload(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<PhotoView> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let photo = PhotoService::new()
        .await?
        .upload(user.user_id, body.to_vec(), content_type, query)
        .await?;
    Ok(ApiResponse::created(photo))
}

/// GET /api/photos - the caller's photos with signed URLs
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<PhotoView>> {
    let photos = PhotoService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(photos))
}

/// DELETE /api/photos/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(photo_id): Path<Uuid>) -> ApiResult<()> {
    PhotoService::new().await?.delete(user.user_id, photo_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/photo-slots - widget slots with their photos
pub async fn slots(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<SlotPhoto>> {
    let slots = PhotoService::new().await?.assignments(user.user_id).await?;
    Ok(ApiResponse::success(slots))
}

/// PUT /api/photo-slots/:slot - show one of the caller's photos in a widget
pub async fn assign(
    Extension(user): Extension<AuthUser>,
    Path(slot): Path<String>,
    Json(input): Json<AssignPhoto>,
) -> ApiResult<PhotoAssignment> {
    let assignment = PhotoService::new()
        .await?
        .assign(user.user_id, &slot, input.photo_id)
        .await?;
    Ok(ApiResponse::success(assignment))
}

/// DELETE /api/photo-slots/:slot
pub async fn clear_slot(Extension(user): Extension<AuthUser>, Path(slot): Path<String>) -> ApiResult<()> {
    PhotoService::new().await?.clear_slot(user.user_id, &slot).await?;
    Ok(ApiResponse::no_content())
}
