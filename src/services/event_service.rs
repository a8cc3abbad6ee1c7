use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::event::{CreateEvent, Event, EventRange, UpdateEvent};
use crate::database::DatabaseError;
use crate::visibility::{ViewFilter, Viewer};

use super::{find_visible, load_viewer, optional_text, requested_scope, required_text, ServiceError, ServiceResult};

const EVENT_COLUMNS: &str =
    "id, title, description, starts_at, ends_at, all_day, created_by, partner_id, group_id, created_at, updated_at";

pub struct EventService {
    pool: PgPool,
}

fn check_window(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> ServiceResult<()> {
    match ends_at {
        Some(end) if end < starts_at => Err(ServiceError::invalid("ends_at", "must not be before starts_at")),
        _ => Ok(()),
    }
}

fn check_range(range: &EventRange) -> ServiceResult<()> {
    match (range.from, range.to) {
        (Some(from), Some(to)) if to < from => Err(ServiceError::invalid("to", "must not be before from")),
        _ => Ok(()),
    }
}

impl EventService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Visible events overlapping `[from, to)`, in start order. Open bounds are unbounded.
    pub async fn list(&self, user_id: Uuid, filter: ViewFilter, range: EventRange) -> ServiceResult<Vec<Event>> {
        check_range(&range)?;
        let viewer = load_viewer(&self.pool, user_id).await?;
        let sql = format!(
            "SELECT {} FROM events
             WHERE (created_by = ANY($1) OR group_id = ANY($2))
               AND ($3::timestamptz IS NULL OR COALESCE(ends_at, starts_at) >= $3)
               AND ($4::timestamptz IS NULL OR starts_at < $4)
             ORDER BY starts_at, title",
            EVENT_COLUMNS
        );
        let candidates = sqlx::query_as::<_, Event>(&sql)
            .bind(viewer.circle())
            .bind(viewer.group_ids())
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await?;
        Ok(viewer.retain(candidates, filter))
    }

    pub async fn create(&self, user_id: Uuid, input: CreateEvent) -> ServiceResult<Event> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let title = required_text("title", &input.title, 200)?;
        let description = optional_text("description", input.description.as_deref(), 2000)?;
        check_window(input.starts_at, input.ends_at)?;
        let scope = requested_scope(&viewer, input.partner_id, input.group_id)?;

        let sql = format!(
            "INSERT INTO events (id, title, description, starts_at, ends_at, all_day, created_by, partner_id, group_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            EVENT_COLUMNS
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(title)
            .bind(description)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.all_day)
            .bind(user_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn update(&self, user_id: Uuid, event_id: Uuid, input: UpdateEvent) -> ServiceResult<Event> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let current = self.find(&viewer, event_id).await?;
        let title = input.title.as_deref().map(|t| required_text("title", t, 200)).transpose()?;
        let description = optional_text("description", input.description.as_deref(), 2000)?;
        check_window(
            input.starts_at.unwrap_or(current.starts_at),
            input.ends_at.or(current.ends_at),
        )?;

        let sql = format!(
            "UPDATE events
             SET title = COALESCE($2, title),
                 description = CASE WHEN $3 THEN $4 ELSE description END,
                 starts_at = COALESCE($5, starts_at),
                 ends_at = COALESCE($6, ends_at),
                 all_day = COALESCE($7, all_day),
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            EVENT_COLUMNS
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .bind(title)
            .bind(input.description.is_some())
            .bind(description)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.all_day)
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn delete(&self, user_id: Uuid, event_id: Uuid) -> ServiceResult<()> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, event_id).await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, viewer: &Viewer, event_id: Uuid) -> ServiceResult<Event> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        find_visible(&self.pool, viewer, &sql, event_id, "Event not found").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn end_may_not_precede_start() {
        let start = Utc::now();
        assert!(check_window(start, None).is_ok());
        assert!(check_window(start, Some(start)).is_ok());
        assert!(check_window(start, Some(start + Duration::hours(1))).is_ok());
        assert!(matches!(
            check_window(start, Some(start - Duration::minutes(1))),
            Err(ServiceError::Invalid { field: "ends_at", .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        let inverted = EventRange {
            from: Some(now),
            to: Some(now - Duration::days(1)),
        };
        assert!(check_range(&inverted).is_err());
        assert!(check_range(&EventRange { from: None, to: Some(now) }).is_ok());
    }
}
