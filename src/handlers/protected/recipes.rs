use axum::{extract::Path, Extension, Json};
use uuid::Uuid;

use crate::database::models::recipe::{PantryIngredient, Recipe, RecipeDetail};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::recipe_service::RecipeMatch;
use crate::services::RecipeService;

/// GET /api/recipes - the shared catalog
pub async fn catalog(Extension(_user): Extension<AuthUser>) -> ApiResult<Vec<Recipe>> {
    let recipes = RecipeService::new().await?.catalog().await?;
    Ok(ApiResponse::success(recipes))
}

/// GET /api/recipes/:id - recipe with its ingredient list
pub async fn detail(Extension(_user): Extension<AuthUser>, Path(recipe_id): Path<Uuid>) -> ApiResult<RecipeDetail> {
    let recipe = RecipeService::new().await?.detail(recipe_id).await?;
    Ok(ApiResponse::success(recipe))
}

/// GET /api/recipes/matches - recipes ranked by how much of them the pantry covers
pub async fn matches(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<RecipeMatch>> {
    let ranked = RecipeService::new().await?.matches(user.user_id).await?;
    Ok(ApiResponse::success(ranked))
}

/// GET /api/pantry
pub async fn pantry(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<String>> {
    let items = RecipeService::new().await?.pantry(user.user_id).await?;
    Ok(ApiResponse::success(items))
}

/// POST /api/pantry - returns the normalized ingredient name
pub async fn add_to_pantry(
    Extension(user): Extension<AuthUser>,
    Json(input): Json<PantryIngredient>,
) -> ApiResult<String> {
    let ingredient = RecipeService::new()
        .await?
        .add_to_pantry(user.user_id, &input.ingredient)
        .await?;
    Ok(ApiResponse::created(ingredient))
}

/// DELETE /api/pantry/:ingredient
pub async fn remove_from_pantry(Extension(user): Extension<AuthUser>, Path(ingredient): Path<String>) -> ApiResult<()> {
    RecipeService::new()
        .await?
        .remove_from_pantry(user.user_id, &ingredient)
        .await?;
    Ok(ApiResponse::no_content())
}
