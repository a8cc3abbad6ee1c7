use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::event::{CreateEvent, Event, EventRange, UpdateEvent};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::EventService;
use crate::visibility::ViewQuery;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub personal: bool,
}

impl EventQuery {
    fn view(&self) -> ViewQuery {
        ViewQuery {
            partner_id: self.partner_id,
            group_id: self.group_id,
            personal: self.personal,
        }
    }
}

/// GET /api/events?from=&to=[&partner_id=|group_id=|personal=true]
pub async fn list(Extension(user): Extension<AuthUser>, Query(query): Query<EventQuery>) -> ApiResult<Vec<Event>> {
    let filter = query.view().into_filter()?;
    let range = EventRange {
        from: query.from,
        to: query.to,
    };
    let events = EventService::new().await?.list(user.user_id, filter, range).await?;
    Ok(ApiResponse::success(events))
}

/// POST /api/events
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateEvent>) -> ApiResult<Event> {
    let event = EventService::new().await?.create(user.user_id, input).await?;
    Ok(ApiResponse::created(event))
}

/// PUT /api/events/:id
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
    Json(input): Json<UpdateEvent>,
) -> ApiResult<Event> {
    let event = EventService::new().await?.update(user.user_id, event_id, input).await?;
    Ok(ApiResponse::success(event))
}

/// DELETE /api/events/:id
pub async fn delete(Extension(user): Extension<AuthUser>, Path(event_id): Path<Uuid>) -> ApiResult<()> {
    EventService::new().await?.delete(user.user_id, event_id).await?;
    Ok(ApiResponse::no_content())
}
