use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::todo::{CreateTodo, Todo, UpdateTodo};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TodoService;
use crate::visibility::ViewQuery;

/// GET /api/todos?[partner_id=|group_id=|personal=true]
pub async fn list(Extension(user): Extension<AuthUser>, Query(query): Query<ViewQuery>) -> ApiResult<Vec<Todo>> {
    let filter = query.into_filter()?;
    let todos = TodoService::new().await?.list(user.user_id, filter).await?;
    Ok(ApiResponse::success(todos))
}

/// POST /api/todos
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateTodo>) -> ApiResult<Todo> {
    let todo = TodoService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(todo))
}

/// PUT /api/todos/:id - title, completion, due date
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(todo_id): Path<Uuid>,
    Json(input): Json<UpdateTodo>,
) -> ApiResult<Todo> {
    let todo = TodoService::new().await?.update(user.user_id, todo_id, input).await?;
    Ok(ApiResponse::success(todo))
}

/// DELETE /api/todos/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(todo_id): Path<Uuid>) -> ApiResult<()> {
    TodoService::new().await?.delete(user.user_id, todo_id).await?;
    Ok(ApiResponse::no_content())
}
