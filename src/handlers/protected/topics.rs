use axum::{extract::Path, Extension, Json};
use uuid::Uuid;

use crate::database::models::topic::{CreateTopic, RenameTopic, Topic};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TopicService;

/// GET /api/topics - topics the caller can file notes under
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Topic>> {
    let topics = TopicService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(topics))
}

/// POST /api/topics - private, partner or group topic
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateTopic>) -> ApiResult<Topic> {
    let topic = TopicService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(topic))
}

/// PUT /api/topics/:id - rename (creator)
pub async fn rename(
    Extension(user): Extension<AuthUser>,
    Path(topic_id): Path<Uuid>,
    Json(input): Json<RenameTopic>,
) -> ApiResult<Topic> {
    let topic = TopicService::new()
        .await?
        .rename(user.user_id, topic_id, &input.name)
        .await?;
    Ok(ApiResponse::success(topic))
}

/// DELETE /api/topics/:id - delete with its notes (creator)
pub async fn delete(Extension(user): Extension<AuthUser>, Path(topic_id): Path<Uuid>) -> ApiResult<()> {
    TopicService::new().await?.delete(user.user_id, topic_id).await?;
    Ok(ApiResponse::no_content())
}
