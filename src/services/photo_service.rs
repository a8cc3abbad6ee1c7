use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::photo::{Photo, PhotoAssignment, PhotoView, UploadQuery};
use crate::storage::{signed_url_cache, ObjectStore, SignedUrlCache, SupabaseStorage};

use super::{optional_text, ServiceError, ServiceResult};

const PHOTO_COLUMNS: &str = "id, owner_id, storage_path, content_type, size_bytes, caption, created_at";

/// Image formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
    Heic,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            "image/gif" => Some(ImageKind::Gif),
            "image/heic" | "image/heif" => Some(ImageKind::Heic),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            "gif" => Some(ImageKind::Gif),
            "heic" | "heif" => Some(ImageKind::Heic),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
            ImageKind::Gif => "image/gif",
            ImageKind::Heic => "image/heic",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
            ImageKind::Gif => "gif",
            ImageKind::Heic => "heic",
        }
    }
}

/// Resolve the format from the request's content type, falling back to the file name
/// when the client sent a generic type.
pub fn detect_kind(content_type: Option<&str>, filename: Option<&str>) -> ServiceResult<ImageKind> {
    content_type
        .and_then(ImageKind::from_content_type)
        .or_else(|| filename.and_then(ImageKind::from_filename))
        .ok_or_else(|| ServiceError::invalid("content_type", "photos must be JPEG, PNG, WebP, GIF or HEIC"))
}

pub fn check_size(len: usize, max_bytes: usize) -> ServiceResult<()> {
    if len == 0 {
        return Err(ServiceError::invalid("file", "upload is empty"));
    }
    if len > max_bytes {
        return Err(ServiceError::TooLarge(format!("Photos may be at most {} bytes", max_bytes)));
    }
    Ok(())
}

/// Objects live under the owner's folder with a random name
pub fn storage_path(owner: Uuid, kind: ImageKind) -> String {
    format!("{}/{}.{}", owner, Uuid::new_v4(), kind.extension())
}

fn validate_slot(slot: &str) -> ServiceResult<&str> {
    let slot = slot.trim();
    let valid = !slot.is_empty()
        && slot.len() <= 64
        && slot.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(slot)
    } else {
        Err(ServiceError::invalid("widget_slot", "must be 1-64 characters of letters, digits, '_' or '-'"))
    }
}

/// Upload the object, then run `record`. When recording fails the object is removed again
/// so storage does not keep orphans; a failed removal is only logged.
pub async fn store_then_record<S, F, Fut, T>(
    store: &S,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
    record: F,
) -> ServiceResult<T>
where
    S: ObjectStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    store.upload(path, bytes, content_type).await?;
    match record().await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(cleanup) = store.remove(path).await {
                warn!("Failed to remove orphaned object {}: {}", path, cleanup);
            }
            Err(err)
        }
    }
}

/// Photo shown in a dashboard widget slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotPhoto {
    pub widget_slot: String,
    pub photo: PhotoView,
}

pub struct PhotoService<S: ObjectStore = SupabaseStorage> {
    pool: PgPool,
    store: S,
    urls: &'static SignedUrlCache,
    max_upload_bytes: usize,
}

impl PhotoService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self::with_parts(pool, SupabaseStorage::from_config()?))
    }
}

impl<S: ObjectStore> PhotoService<S> {
    pub fn with_parts(pool: PgPool, store: S) -> Self {
        Self {
            pool,
            store,
            urls: signed_url_cache(),
            max_upload_bytes: config::config().api.max_upload_bytes,
        }
    }

    pub async fn upload(
        &self,
        user_id: Uuid,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        query: UploadQuery,
    ) -> ServiceResult<PhotoView> {
        check_size(bytes.len(), self.max_upload_bytes)?;
        let kind = detect_kind(content_type, query.filename.as_deref())?;
        let caption = optional_text("caption", query.caption.as_deref(), 300)?;
        let path = storage_path(user_id, kind);
        let size = bytes.len() as i64;

        let sql = format!(
            "INSERT INTO photos (id, owner_id, storage_path, content_type, size_bytes, caption)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            PHOTO_COLUMNS
        );
        let (pool, sql, stored_at) = (&self.pool, sql.as_str(), path.as_str());
        let photo = store_then_record(&self.store, &path, bytes, kind.mime(), move || async move {
            let photo = sqlx::query_as::<_, Photo>(sql)
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(stored_at)
                .bind(kind.mime())
                .bind(size)
                .bind(caption)
                .fetch_one(pool)
                .await?;
            Ok(photo)
        })
        .await?;

        info!("Stored photo {} at {}", photo.id, photo.storage_path);
        self.view(photo).await
    }

    /// The user's photos, newest first, each with a signed URL
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<PhotoView>> {
        let sql = format!("SELECT {} FROM photos WHERE owner_id = $1 ORDER BY created_at DESC", PHOTO_COLUMNS);
        let photos = sqlx::query_as::<_, Photo>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut views = Vec::with_capacity(photos.len());
        for photo in photos {
            views.push(self.view(photo).await?);
        }
        Ok(views)
    }

    pub async fn delete(&self, user_id: Uuid, photo_id: Uuid) -> ServiceResult<()> {
        let photo = self.owned(user_id, photo_id).await?;
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(photo_id)
            .execute(&self.pool)
            .await?;

        self.urls.invalidate(&photo.storage_path);
        if let Err(err) = self.store.remove(&photo.storage_path).await {
            warn!("Photo {} deleted but object {} remains: {}", photo_id, photo.storage_path, err);
        }
        Ok(())
    }

    /// Point a widget slot at one of the user's photos, replacing any previous choice
    pub async fn assign(&self, user_id: Uuid, slot: &str, photo_id: Uuid) -> ServiceResult<PhotoAssignment> {
        let slot = validate_slot(slot)?;
        self.owned(user_id, photo_id).await?;
        let assignment = sqlx::query_as::<_, PhotoAssignment>(
            "INSERT INTO photo_assignments (user_id, widget_slot, photo_id) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, widget_slot)
             DO UPDATE SET photo_id = EXCLUDED.photo_id, assigned_at = now()
             RETURNING user_id, widget_slot, photo_id, assigned_at",
        )
        .bind(user_id)
        .bind(slot)
        .bind(photo_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(assignment)
    }

    pub async fn assignments(&self, user_id: Uuid) -> ServiceResult<Vec<SlotPhoto>> {
        let rows: Vec<(String, Uuid)> = sqlx::query_as(
            "SELECT widget_slot, photo_id FROM photo_assignments WHERE user_id = $1 ORDER BY widget_slot",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut slots = Vec::with_capacity(rows.len());
        for (widget_slot, photo_id) in rows {
            let photo = self.owned(user_id, photo_id).await?;
            slots.push(SlotPhoto {
                widget_slot,
                photo: self.view(photo).await?,
            });
        }
        Ok(slots)
    }

    pub async fn clear_slot(&self, user_id: Uuid, slot: &str) -> ServiceResult<()> {
        let slot = validate_slot(slot)?;
        let result = sqlx::query("DELETE FROM photo_assignments WHERE user_id = $1 AND widget_slot = $2")
            .bind(user_id)
            .bind(slot)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Nothing assigned to that slot".to_string()));
        }
        Ok(())
    }

    async fn view(&self, photo: Photo) -> ServiceResult<PhotoView> {
        let url = self.urls.get_or_sign(&self.store, &photo.storage_path).await?;
        Ok(PhotoView { photo, url })
    }

    async fn owned(&self, user_id: Uuid, photo_id: Uuid) -> ServiceResult<Photo> {
        let sql = format!("SELECT {} FROM photos WHERE id = $1 AND owner_id = $2", PHOTO_COLUMNS);
        sqlx::query_as::<_, Photo>(&sql)
            .bind(photo_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Photo not found".to_string()))
    }
}
