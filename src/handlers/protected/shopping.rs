use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::shopping::{CreateShoppingItem, ShoppingItem, UpdateShoppingItem};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ShoppingService;
use crate::visibility::ViewQuery;

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub deleted: u64,
}

/// GET /api/shopping?[partner_id=|group_id=|personal=true]
pub async fn list(Extension(user): Extension<AuthUser>, Query(query): Query<ViewQuery>) -> ApiResult<Vec<ShoppingItem>> {
    let filter = query.into_filter()?;
    let items = ShoppingService::new().await?.list(user.user_id, filter).await?;
    Ok(ApiResponse::success(items))
}

/// POST /api/shopping
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateShoppingItem>,
) -> ApiResult<ShoppingItem> {
    let item = ShoppingService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(item))
}

/// PUT /api/shopping/:id - name, quantity, checked
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateShoppingItem>,
) -> ApiResult<ShoppingItem> {
    let item = ShoppingService::new().await?.update(user.user_id, item_id, input).await?;
    Ok(ApiResponse::success(item))
}

/// DELETE /api/shopping/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(item_id): Path<Uuid>) -> ApiResult<()> {
    ShoppingService::new().await?.delete(user.user_id, item_id).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /api/shopping/checked - clear checked items in the current view
pub async fn clear_checked(Extension(user): Extension<AuthUser>, Query(query): Query<ViewQuery>) -> ApiResult<Cleared> {
    let filter = query.into_filter()?;
    let deleted = ShoppingService::new().await?.clear_checked(user.user_id, filter).await?;
    Ok(ApiResponse::success(Cleared { deleted }))
}
