use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

/// Longest signed URL lifetime the storage backend hands out (one week)
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Expected `aud` claim; tokens from the hosted auth provider carry "authenticated".
    pub jwt_audience: Option<String>,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend_url: Option<String>,
    #[serde(skip_serializing)]
    pub service_key: Option<String>,
    pub photo_bucket: String,
    pub signed_url_ttl_secs: u64,
    pub signed_url_margin_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub app_id: Option<String>,
    #[serde(skip_serializing)]
    pub rest_api_key: Option<String>,
    pub api_base: String,
    pub public_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_AUDIENCE") {
            self.security.jwt_audience = non_empty(v);
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Storage overrides
        if let Ok(v) = env::var("BACKEND_URL") {
            self.storage.backend_url = non_empty(v);
        }
        if let Ok(v) = env::var("BACKEND_SERVICE_KEY") {
            self.storage.service_key = non_empty(v);
        }
        if let Ok(v) = env::var("STORAGE_PHOTO_BUCKET") {
            self.storage.photo_bucket = v;
        }
        if let Ok(v) = env::var("STORAGE_SIGNED_URL_TTL_SECS") {
            self.storage.signed_url_ttl_secs = v.parse().unwrap_or(self.storage.signed_url_ttl_secs);
        }
        if let Ok(v) = env::var("STORAGE_SIGNED_URL_MARGIN_SECS") {
            self.storage.signed_url_margin_secs = v.parse().unwrap_or(self.storage.signed_url_margin_secs);
        }
        self.storage.clamp_signed_url_window();

        // Push overrides
        if let Ok(v) = env::var("ONESIGNAL_APP_ID") {
            self.push.app_id = non_empty(v);
        }
        if let Ok(v) = env::var("ONESIGNAL_REST_API_KEY") {
            self.push.rest_api_key = non_empty(v);
        }
        if let Ok(v) = env::var("ONESIGNAL_API_BASE") {
            self.push.api_base = v;
        }
        if let Ok(v) = env::var("PUSH_PUBLIC_KEY") {
            self.push.public_key = non_empty(v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                auto_migrate: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_upload_bytes: 20 * 1024 * 1024, // 20MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: String::new(),
                jwt_audience: None,
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            storage: StorageConfig::defaults(),
            push: PushConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                auto_migrate: false,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_audience: Some("authenticated".to_string()),
                jwt_expiry_hours: 24,
            },
            storage: StorageConfig::defaults(),
            push: PushConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                auto_migrate: false,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_audience: Some("authenticated".to_string()),
                jwt_expiry_hours: 4,
            },
            storage: StorageConfig::defaults(),
            push: PushConfig::defaults(),
        }
    }
}

impl StorageConfig {
    fn defaults() -> Self {
        Self {
            backend_url: None,
            service_key: None,
            photo_bucket: "photos".to_string(),
            signed_url_ttl_secs: 3600,
            signed_url_margin_secs: 60,
        }
    }
}

impl StorageConfig {
    /// Keep the TTL within what storage accepts and the margin within the TTL
    fn clamp_signed_url_window(&mut self) {
        self.signed_url_ttl_secs = self.signed_url_ttl_secs.clamp(1, MAX_SIGNED_URL_TTL_SECS);
        self.signed_url_margin_secs = self.signed_url_margin_secs.min(self.signed_url_ttl_secs);
    }
}

impl PushConfig {
    fn defaults() -> Self {
        Self {
            app_id: None,
            rest_api_key: None,
            api_base: "https://onesignal.com/api/v1".to_string(),
            public_key: None,
        }
    }
}

fn non_empty(v: String) -> Option<String> {
    let trimmed = v.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.auto_migrate);
        assert!(config.security.jwt_audience.is_none());
        assert_eq!(config.storage.signed_url_ttl_secs, 3600);
        assert_eq!(config.storage.signed_url_margin_secs, 60);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.database.auto_migrate);
        assert_eq!(config.security.jwt_audience.as_deref(), Some("authenticated"));
        assert_eq!(config.push.api_base, "https://onesignal.com/api/v1");
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "super-secret".to_string();
        config.push.rest_api_key = Some("rest-key".to_string());
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("rest-key"));
    }

    #[test]
    fn signed_url_window_is_clamped() {
        let mut storage = StorageConfig::defaults();
        storage.signed_url_ttl_secs = u64::MAX;
        storage.signed_url_margin_secs = u64::MAX;
        storage.clamp_signed_url_window();
        assert_eq!(storage.signed_url_ttl_secs, MAX_SIGNED_URL_TTL_SECS);
        assert_eq!(storage.signed_url_margin_secs, MAX_SIGNED_URL_TTL_SECS);

        storage.signed_url_ttl_secs = 0;
        storage.clamp_signed_url_window();
        assert_eq!(storage.signed_url_ttl_secs, 1);
        assert_eq!(storage.signed_url_margin_secs, 1);
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        assert_eq!(non_empty("   ".to_string()), None);
        assert_eq!(non_empty(" key ".to_string()).as_deref(), Some("key"));
    }
}
