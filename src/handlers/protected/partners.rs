use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::partner::{PartnerEmail, PartnerSummary};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::PartnerService;

/// GET /api/partners - linked partners
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<PartnerSummary>> {
    let partners = PartnerService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(partners))
}

/// GET /api/partners/lookup?email= - find a user to link with
pub async fn lookup(Extension(user): Extension<AuthUser>, Query(query): Query<PartnerEmail>) -> ApiResult<PartnerSummary> {
    let partner = PartnerService::new()
        .await?
        .lookup_by_email(user.user_id, &query.email)
        .await?;
    Ok(ApiResponse::success(partner))
}

/// POST /api/partners - link with the user owning `email`
pub async fn link(Extension(user): Extension<AuthUser>, Json(input): Json<PartnerEmail>) -> ApiResult<PartnerSummary> {
    let partner = PartnerService::new().await?.link(user.user_id, &input.email).await?;
    Ok(ApiResponse::created(partner))
}

/// DELETE /api/partners/:id - remove the link
pub async fn unlink(Extension(user): Extension<AuthUser>, Path(partner_id): Path<Uuid>) -> ApiResult<()> {
    PartnerService::new().await?.unlink(user.user_id, partner_id).await?;
    Ok(ApiResponse::no_content())
}
