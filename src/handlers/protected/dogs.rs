use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::DayQuery;
use crate::database::models::dog::{CreateDog, Dog, ToggleMeal, UpdateDog};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::dog_service::MealDay;
use crate::services::DogService;

/// GET /api/dogs - the caller's dogs and their partners' dogs
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Dog>> {
    let dogs = DogService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(dogs))
}

/// POST /api/dogs
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateDog>) -> ApiResult<Dog> {
    let dog = DogService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(dog))
}

/// PUT /api/dogs/:id - owner only
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(dog_id): Path<Uuid>,
    Json(input): Json<UpdateDog>,
) -> ApiResult<Dog> {
    let dog = DogService::new().await?.update(user.user_id, dog_id, input).await?;
    Ok(ApiResponse::success(dog))
}

/// DELETE /api/dogs/:id - owner only
pub async fn delete(Extension(user): Extension<AuthUser>, Path(dog_id): Path<Uuid>) -> ApiResult<()> {
    DogService::new().await?.delete(user.user_id, dog_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/dogs/:id/meals?date= - every meal of the day and who fed it
pub async fn meals(
    Extension(user): Extension<AuthUser>,
    Path(dog_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> ApiResult<MealDay> {
    let day = DogService::new()
        .await?
        .meals_for(user.user_id, dog_id, query.day())
        .await?;
    Ok(ApiResponse::success(day))
}

/// POST /api/dogs/:id/meals/toggle - mark a meal fed, or unmark it
pub async fn toggle_meal(
    Extension(user): Extension<AuthUser>,
    Path(dog_id): Path<Uuid>,
    Json(input): Json<ToggleMeal>,
) -> ApiResult<MealDay> {
    let day = DogService::new().await?.toggle_meal(user.user_id, dog_id, input).await?;
    Ok(ApiResponse::success(day))
}
