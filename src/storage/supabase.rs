use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{ObjectStore, StorageError};
use crate::config;

/// Bucket in the hosted backend's storage REST API (`/storage/v1`)
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: Url,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_key: impl Into<String>, bucket: impl Into<String>) -> Result<Self, StorageError> {
        let mut base_url = Url::parse(base_url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    /// Photo bucket from configuration
    pub fn from_config() -> Result<Self, StorageError> {
        let storage = &config::config().storage;
        match (&storage.backend_url, &storage.service_key) {
            (Some(url), Some(key)) => Self::new(url, key.clone(), storage.photo_bucket.clone()),
            _ => Err(StorageError::NotConfigured),
        }
    }

    fn endpoint(&self, route: &str, path: Option<&str>) -> Result<Url, StorageError> {
        let mut relative = format!("storage/v1/{}/{}", route, self.bucket);
        if let Some(path) = path {
            relative.push('/');
            relative.push_str(path.trim_start_matches('/'));
        }
        self.base_url
            .join(&relative)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))
    }

    /// The API answers with a path relative to `/storage/v1`
    fn absolute_signed_url(&self, signed_path: &str) -> Result<String, StorageError> {
        let relative = format!("storage/v1/{}", signed_path.trim_start_matches('/'));
        self.base_url
            .join(&relative)
            .map(String::from)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let url = self.endpoint("object", Some(path))?;
        let response = self
            .authorized(self.client.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let url = self.endpoint("object", None)?;
        let response = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
        let url = self.endpoint("object/sign", Some(path))?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let body: SignedUrlResponse = Self::check(response, path).await?.json().await?;
        self.absolute_signed_url(&body.signed_url)
    }
}
