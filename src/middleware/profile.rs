use axum::{extract::Request, middleware::Next, response::Response, Extension};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::AuthUser;
use crate::error::ApiError;
use crate::services::ProfileService;

/// Users whose profile row is known to exist in this process
static KNOWN_PROFILES: Lazy<Mutex<HashSet<Uuid>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn is_known(user_id: Uuid) -> bool {
    KNOWN_PROFILES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&user_id)
}

fn remember(user_id: Uuid) {
    KNOWN_PROFILES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(user_id);
}

/// Create the caller's profile row on first sight. Runs after [`super::jwt_auth_middleware`].
pub async fn ensure_profile_middleware(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_known(user.user_id) {
        ProfileService::new()
            .await?
            .ensure(user.user_id, user.email.as_deref())
            .await?;
        tracing::debug!("Ensured profile for {}", user.user_id);
        remember(user.user_id);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_ensured_users() {
        let user = Uuid::new_v4();
        assert!(!is_known(user));
        remember(user);
        assert!(is_known(user));
    }
}
