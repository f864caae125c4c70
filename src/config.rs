//! Application configuration, built once at startup and passed to handlers
//! through axum state instead of being read from the environment at call time.

use std::sync::Arc;

/// JWT settings for the auth module.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_days: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "default-jwt-secret-change-in-production".to_string()),
            expiry_days: std::env::var("JWT_EXPIRY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
        }
    }
}

/// Cloudinary credentials for the image upload proxy.
/// Absent when the env vars are not set; the upload endpoint answers 503 then.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

impl CloudinaryConfig {
    pub fn from_env() -> Option<Self> {
        let cloud_name = std::env::var("CLOUDINARY_CLOUD_NAME").ok()?;
        let api_key = std::env::var("CLOUDINARY_API_KEY").ok()?;
        let api_secret = std::env::var("CLOUDINARY_API_SECRET").ok()?;
        Some(Self {
            cloud_name,
            api_key,
            api_secret,
            folder: std::env::var("CLOUDINARY_FOLDER")
                .unwrap_or_else(|_| "church-announcements".to_string()),
        })
    }

    pub fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        )
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            jwt: JwtConfig::default(),
            cloudinary: CloudinaryConfig::from_env(),
        }
    }
}

/// Shared handler state: configuration plus a reused outbound HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_config_default_has_secret_and_expiry() {
        let config = JwtConfig::default();
        assert!(!config.secret.is_empty());
        assert!(config.expiry_days >= 1);
    }

    #[test]
    fn test_cloudinary_upload_url() {
        let config = CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "church-announcements".to_string(),
        };
        assert_eq!(
            config.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_app_state_is_cloneable() {
        let state = AppState::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_days: 7,
            },
            cloudinary: None,
        });
        let _clone = state.clone();
    }
}
