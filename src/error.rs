// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::DatabaseError;
use crate::push::PushError;
use crate::services::ServiceError;
use crate::storage::StorageError;
use crate::visibility::VisibilityError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation error naming a single offending field
    pub fn invalid_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::validation_error("Invalid field value", Some(field_errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::ConfigMissing(var) => {
                tracing::error!("Database configuration missing: {}", var);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("DATABASE_URL could not be parsed");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                match sqlx_err {
                    sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                        ApiError::service_unavailable("Database temporarily unavailable")
                    }
                    _ => ApiError::internal_server_error("Database error occurred"),
                }
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured => ApiError::service_unavailable("Photo storage is not configured"),
            StorageError::NotFound(path) => ApiError::not_found(format!("Stored object '{}' not found", path)),
            StorageError::Rejected { status, message } => {
                tracing::error!("Storage rejected request ({}): {}", status, message);
                ApiError::bad_gateway("Photo storage rejected the request")
            }
            StorageError::Transport(e) => {
                tracing::error!("Storage transport error: {}", e);
                ApiError::bad_gateway("Photo storage unavailable")
            }
            StorageError::InvalidUrl(msg) => {
                tracing::error!("Storage URL error: {}", msg);
                ApiError::internal_server_error("Photo storage misconfigured")
            }
        }
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::NotConfigured => ApiError::service_unavailable("Push notifications are not configured"),
            PushError::Relay { status, body } => {
                tracing::error!("Push relay returned {}: {}", status, body);
                ApiError::bad_gateway("Push relay rejected the notification")
            }
            PushError::Transport(e) => {
                tracing::error!("Push relay transport error: {}", e);
                ApiError::bad_gateway("Push relay unavailable")
            }
        }
    }
}

impl From<VisibilityError> for ApiError {
    fn from(err: VisibilityError) -> Self {
        match err {
            VisibilityError::ConflictingScope => {
                ApiError::invalid_field("group_id", "partner_id and group_id are mutually exclusive")
            }
            VisibilityError::NotPartner(_) | VisibilityError::NotGroupMember(_) => ApiError::forbidden(err.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => e.into(),
            ServiceError::Visibility(e) => e.into(),
            ServiceError::Storage(e) => e.into(),
            ServiceError::Push(e) => e.into(),
            ServiceError::Invalid { field, message } => ApiError::invalid_field(field, message),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::TooLarge(msg) => ApiError::payload_too_large(msg),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409_with_code() {
        let err: ApiError = DatabaseError::Conflict("Username already taken".to_string()).into();
        assert_eq!(err.status_code(), 409);
        let body = err.to_json();
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["message"], "Username already taken");
    }

    #[test]
    fn field_validation_lists_field() {
        let err = ApiError::invalid_field("meal_index", "must be below meals_per_day");
        let body = err.to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["meal_index"], "must be below meals_per_day");
    }

    #[test]
    fn service_errors_keep_their_meaning() {
        let invalid: ApiError = ServiceError::invalid("title", "must not be empty").into();
        assert_eq!(invalid.status_code(), 400);
        assert_eq!(invalid.to_json()["field_errors"]["title"], "must not be empty");

        let missing: ApiError = ServiceError::NotFound("Note not found".to_string()).into();
        assert_eq!(missing.status_code(), 404);

        let large: ApiError = ServiceError::TooLarge("too big".to_string()).into();
        assert_eq!(large.status_code(), 413);

        let stranger: ApiError = ServiceError::Visibility(VisibilityError::NotPartner(uuid::Uuid::nil())).into();
        assert_eq!(stranger.status_code(), 403);

        let relay: ApiError = ServiceError::Push(PushError::Relay {
            status: 400,
            body: "bad".to_string(),
        })
        .into();
        assert_eq!(relay.status_code(), 502);
    }

    #[test]
    fn unconfigured_relays_are_unavailable() {
        let storage: ApiError = StorageError::NotConfigured.into();
        let push: ApiError = PushError::NotConfigured.into();
        assert_eq!(storage.status_code(), 503);
        assert_eq!(push.status_code(), 503);
    }
}
