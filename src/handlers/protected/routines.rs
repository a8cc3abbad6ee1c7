use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::DayQuery;
use crate::database::models::routine::{CreateRoutine, RoutineWithItems, ToggleRoutineItem, UpdateRoutine};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::routine_service::{RoutineProgress, ScheduledRoutine};
use crate::services::RoutineService;

/// GET /api/routines
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<RoutineWithItems>> {
    let routines = RoutineService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(routines))
}

/// GET /api/routines/today?date= - routines due on the date, with progress
pub async fn scheduled(Extension(user): Extension<AuthUser>, Query(query): Query<DayQuery>) -> ApiResult<Vec<ScheduledRoutine>> {
    let routines = RoutineService::new()
        .await?
        .scheduled_for(user.user_id, query.day())
        .await?;
    Ok(ApiResponse::success(routines))
}

/// POST /api/routines - routine with its checklist items
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateRoutine>,
) -> ApiResult<RoutineWithItems> {
    let routine = RoutineService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(routine))
}

/// PUT /api/routines/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(routine_id): Path<Uuid>,
    Json(input): Json<UpdateRoutine>,
) -> ApiResult<RoutineWithItems> {
    let routine = RoutineService::new()
        .await?
        .update(user.user_id, routine_id, input)
        .await?;
    Ok(ApiResponse::success(routine))
}

/// DELETE /api/routines/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(routine_id): Path<Uuid>) -> ApiResult<()> {
    RoutineService::new().await?.delete(user.user_id, routine_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/routines/:id/progress?date=
pub async fn progress(
    Extension(user): Extension<AuthUser>,
    Path(routine_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> ApiResult<RoutineProgress> {
    let progress = RoutineService::new()
        .await?
        .progress(user.user_id, routine_id, query.day())
        .await?;
    Ok(ApiResponse::success(progress))
}

/// POST /api/routines/:id/toggle - tick or untick one item for a date
pub async fn toggle_item(
    Extension(user): Extension<AuthUser>,
    Path(routine_id): Path<Uuid>,
    Json(input): Json<ToggleRoutineItem>,
) -> ApiResult<RoutineProgress> {
    let progress = RoutineService::new()
        .await?
        .toggle_item(user.user_id, routine_id, input)
        .await?;
    Ok(ApiResponse::success(progress))
}
