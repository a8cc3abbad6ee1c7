//! Private object storage for photos.

pub mod signed_url_cache;
pub mod supabase;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;

pub use signed_url_cache::SignedUrlCache;
pub use supabase::SupabaseStorage;

use crate::config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// One storage bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn remove(&self, path: &str) -> Result<(), StorageError>;

    async fn create_signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError>;
}

static SIGNED_URLS: Lazy<SignedUrlCache> = Lazy::new(|| {
    let storage = &config::config().storage;
    SignedUrlCache::new(storage.signed_url_ttl_secs, storage.signed_url_margin_secs)
});

/// Process-wide signed URL cache
pub fn signed_url_cache() -> &'static SignedUrlCache {
    &SIGNED_URLS
}
