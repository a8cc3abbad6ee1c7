pub mod dog_service;
pub mod event_service;
pub mod group_service;
pub mod note_service;
pub mod partner_service;
pub mod photo_service;
pub mod profile_service;
pub mod push_service;
pub mod recipe_service;
pub mod routine_service;
pub mod shopping_service;
pub mod todo_service;
pub mod topic_service;
pub mod viewer_service;

pub use dog_service::DogService;
pub use event_service::EventService;
pub use group_service::GroupService;
pub use note_service::NoteService;
pub use partner_service::PartnerService;
pub use photo_service::PhotoService;
pub use profile_service::ProfileService;
pub use push_service::PushService;
pub use recipe_service::RecipeService;
pub use routine_service::RoutineService;
pub use shopping_service::ShoppingService;
pub use todo_service::TodoService;
pub use topic_service::TopicService;
pub use viewer_service::load_viewer;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::DatabaseError;
use crate::push::PushError;
use crate::storage::StorageError;
use crate::visibility::{ShareScope, Shared, Viewer, VisibilityError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Visibility(#[from] VisibilityError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TooLarge(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

impl ServiceError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Invalid {
            field,
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trimmed, non-empty text no longer than `max_chars`
pub fn required_text(field: &'static str, value: &str, max_chars: usize) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid(field, "must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ServiceError::invalid(field, format!("must be at most {} characters", max_chars)));
    }
    Ok(trimmed.to_string())
}

/// Like [`required_text`] for optional fields; blank input clears the value
pub fn optional_text(field: &'static str, value: Option<&str>, max_chars: usize) -> ServiceResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max_chars).map(Some),
    }
}

/// Scope a caller asks for on a new row, checked against their links and memberships
pub fn requested_scope(viewer: &Viewer, partner_id: Option<Uuid>, group_id: Option<Uuid>) -> ServiceResult<ShareScope> {
    let scope = ShareScope::from_columns(partner_id, group_id)?;
    viewer.authorize_scope(scope)?;
    Ok(scope)
}

/// Fetch one row by id (`$1`) and hide it unless the viewer can see it
pub async fn find_visible<T>(pool: &PgPool, viewer: &Viewer, sql: &str, id: Uuid, missing: &str) -> ServiceResult<T>
where
    T: for<'r> FromRow<'r, PgRow> + Shared + Send + Unpin,
{
    let row = sqlx::query_as::<_, T>(sql).bind(id).fetch_optional(pool).await?;
    match row {
        Some(row) if viewer.can_see(&row) => Ok(row),
        _ => Err(ServiceError::NotFound(missing.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("title", "  Milk ", 10).unwrap(), "Milk");
        assert!(matches!(
            required_text("title", "   ", 10),
            Err(ServiceError::Invalid { field: "title", .. })
        ));
        assert!(required_text("title", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn requested_scope_rejects_strangers() {
        let me = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let viewer = Viewer::new(me).with_partners([partner]);
        assert_eq!(requested_scope(&viewer, Some(partner), None).unwrap(), ShareScope::Partner(partner));
        assert!(matches!(
            requested_scope(&viewer, Some(Uuid::new_v4()), None),
            Err(ServiceError::Visibility(VisibilityError::NotPartner(_)))
        ));
        assert!(matches!(
            requested_scope(&viewer, Some(partner), Some(Uuid::new_v4())),
            Err(ServiceError::Visibility(VisibilityError::ConflictingScope))
        ));
    }

    #[test]
    fn optional_text_clears_blank_values() {
        assert_eq!(optional_text("quantity", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("quantity", None, 10).unwrap(), None);
        assert_eq!(optional_text("quantity", Some(" 2 kg "), 10).unwrap().as_deref(), Some("2 kg"));
    }
}
