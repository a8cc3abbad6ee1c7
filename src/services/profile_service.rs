use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::profile::{Profile, UpdateProfile};
use crate::database::DatabaseError;

use super::{optional_text, ServiceError, ServiceResult};

/// Per-user dashboard tile switches. Keys that were never set count as enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TilePreferences(BTreeMap<String, bool>);

impl TilePreferences {
    pub fn is_enabled(&self, tile: &str) -> bool {
        self.0.get(tile).copied().unwrap_or(true)
    }

    pub fn set(&mut self, tile: &str, enabled: bool) {
        self.0.insert(tile.to_string(), enabled);
    }

    /// Flip the effective value of `tile`, returning the new value
    pub fn toggle(&mut self, tile: &str) -> bool {
        let enabled = !self.is_enabled(tile);
        self.set(tile, enabled);
        enabled
    }
}

const PROFILE_COLUMNS: &str = "id, email, username, avatar_path, tile_preferences, created_at, updated_at";

/// Tile keys are short identifiers chosen by the client
fn validate_tile_key(tile: &str) -> ServiceResult<&str> {
    let tile = tile.trim();
    let valid = !tile.is_empty()
        && tile.len() <= 64
        && tile.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(tile)
    } else {
        Err(ServiceError::invalid("tile", "must be 1-64 characters of letters, digits, '_' or '-'"))
    }
}

/// Usernames: 3-30 characters, lowercase letters, digits, '.', '_' or '-'
pub fn normalize_username(raw: &str) -> ServiceResult<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err(ServiceError::invalid("username", "must be 3-30 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ServiceError::invalid(
            "username",
            "may only contain letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(username)
}

pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the profile row for an authenticated identity if it does not exist yet
    pub async fn ensure(&self, user_id: Uuid, email: Option<&str>) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, email) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET email = COALESCE(profiles.email, EXCLUDED.email)",
        )
        .bind(user_id)
        .bind(email.map(|e| e.trim().to_lowercase()))
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_unique(e, "Email is already registered to another profile"))?;
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid) -> ServiceResult<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::on_missing(e, "Profile not found").into())
    }

    pub async fn update(&self, user_id: Uuid, input: UpdateProfile) -> ServiceResult<Profile> {
        let username = input.username.as_deref().map(normalize_username).transpose()?;
        let avatar_path = optional_text("avatar_path", input.avatar_path.as_deref(), 512)?;

        let sql = format!(
            "UPDATE profiles
             SET username = COALESCE($2, username),
                 avatar_path = CASE WHEN $3 THEN $4 ELSE avatar_path END,
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .bind(username)
            .bind(input.avatar_path.is_some())
            .bind(avatar_path)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DatabaseError::NotFound("Profile not found".to_string()).into(),
                other => DatabaseError::on_unique(other, "Username already taken").into(),
            })
    }

    pub async fn tile_preferences(&self, user_id: Uuid) -> ServiceResult<TilePreferences> {
        Ok(self.get(user_id).await?.tile_preferences.0)
    }

    /// Flip one tile and persist the whole map
    pub async fn toggle_tile(&self, user_id: Uuid, tile: &str) -> ServiceResult<TilePreferences> {
        let tile = validate_tile_key(tile)?;
        self.modify_tiles(user_id, |prefs| {
            prefs.toggle(tile);
        })
        .await
    }

    pub async fn set_tile(&self, user_id: Uuid, tile: &str, enabled: bool) -> ServiceResult<TilePreferences> {
        let tile = validate_tile_key(tile)?;
        self.modify_tiles(user_id, |prefs| prefs.set(tile, enabled)).await
    }

    async fn modify_tiles<F>(&self, user_id: Uuid, change: F) -> ServiceResult<TilePreferences>
    where
        F: FnOnce(&mut TilePreferences),
    {
        let mut tx = self.pool.begin().await?;
        let current: Option<Json<TilePreferences>> =
            sqlx::query_scalar("SELECT tile_preferences FROM profiles WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut prefs = current
            .ok_or_else(|| ServiceError::NotFound("Profile not found".to_string()))?
            .0;

        change(&mut prefs);

        sqlx::query("UPDATE profiles SET tile_preferences = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(Json(&prefs))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(prefs)
    }
}
