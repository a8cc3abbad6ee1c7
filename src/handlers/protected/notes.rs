use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::note::{CreateNote, Note, UpdateNote};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::NoteService;
use crate::visibility::ViewQuery;

#[derive(Debug, Default, Deserialize)]
pub struct NoteQuery {
    pub topic_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub personal: bool,
}

impl NoteQuery {
    fn view(&self) -> ViewQuery {
        ViewQuery {
            partner_id: self.partner_id,
            group_id: self.group_id,
            personal: self.personal,
        }
    }
}

/// GET /api/notes?[partner_id=|group_id=|personal=true][&topic_id=]
pub async fn list(Extension(user): Extension<AuthUser>, Query(query): Query<NoteQuery>) -> ApiResult<Vec<Note>> {
    let filter = query.view().into_filter()?;
    let notes = NoteService::new()
        .await?
        .list(user.user_id, filter, query.topic_id)
        .await?;
    Ok(ApiResponse::success(notes))
}

/// GET /api/notes/:id
pub async fn get(Extension(user): Extension<AuthUser>, Path(note_id): Path<Uuid>) -> ApiResult<Note> {
    let note = NoteService::new().await?.get(user.user_id, note_id).await?;
    Ok(ApiResponse::success(note))
}

/// POST /api/notes - scope comes from the topic or from partner_id / group_id
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateNote>) -> ApiResult<Note> {
    let note = NoteService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(note))
}

/// PUT /api/notes/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
    Json(input): Json<UpdateNote>,
) -> ApiResult<Note> {
    let note = NoteService::new().await?.update(user.user_id, note_id, input).await?;
    Ok(ApiResponse::success(note))
}

/// DELETE /api/notes/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(note_id): Path<Uuid>) -> ApiResult<()> {
    NoteService::new().await?.delete(user.user_id, note_id).await?;
    Ok(ApiResponse::no_content())
}
