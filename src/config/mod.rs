use std::env;

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Signing secret for session tokens (Required in production)
    pub jwt_secret: String,

    /// Master switch for click/download event recording (default: true)
    pub analytics: bool,

    /// Public path prefix for link redirects (default: "s")
    pub link_prefix: String,

    /// Public path prefix for file downloads (default: "f")
    pub file_prefix: String,

    /// Rate limit: file uploads per window per client IP (default: 10)
    pub upload_rate_limit: u32,

    /// Rate limit window in seconds (default: 3600)
    pub upload_rate_window_secs: u64,

    /// Maximum upload size in bytes (default: 100 MB)
    pub max_file_size: usize,

    /// MIME allowlist for uploads; empty accepts everything
    pub allowed_mime_types: Vec<String>,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    pub s3: S3Config,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            analytics: true,
            link_prefix: "s".to_string(),
            file_prefix: "f".to_string(),
            upload_rate_limit: 10,
            upload_rate_window_secs: 3600,
            max_file_size: 100 * 1024 * 1024, // 100 MB
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
                "application/pdf".to_string(),
                "text/plain".to_string(),
                "text/csv".to_string(),
                "application/zip".to_string(),
                "application/json".to_string(),
                "video/mp4".to_string(),
                "video/webm".to_string(),
                "audio/mpeg".to_string(),
                "audio/wav".to_string(),
            ],
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            s3: S3Config {
                enabled: false,
                endpoint: None,
                region: "us-east-1".to_string(),
                access_key_id: String::new(),
                secret_access_key: String::new(),
                bucket: "linker-files".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        // A unified prefix collapses links and files onto one public path.
        let unified_prefix = env::var("UNIFIED_PREFIX").ok().filter(|p| !p.is_empty());
        let link_prefix = env::var("LINK_PREFIX")
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| unified_prefix.clone())
            .unwrap_or(default.link_prefix);
        let file_prefix = env::var("FILE_PREFIX")
            .ok()
            .filter(|p| !p.is_empty())
            .or(unified_prefix)
            .unwrap_or(default.file_prefix);

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            analytics: env::var("ANALYTICS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.analytics),

            link_prefix,
            file_prefix,

            upload_rate_limit: env::var("UPLOAD_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_rate_limit),

            upload_rate_window_secs: env::var("UPLOAD_RATE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_rate_window_secs),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_mime_types),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            s3: S3Config {
                enabled: env::var("S3_ENABLED")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(default.s3.enabled),
                endpoint: env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
                region: env::var("S3_REGION").unwrap_or(default.s3.region),
                access_key_id: env::var("S3_ACCESS_KEY_ID").unwrap_or(default.s3.access_key_id),
                secret_access_key: env::var("S3_SECRET_ACCESS_KEY")
                    .unwrap_or(default.s3.secret_access_key),
                bucket: env::var("S3_BUCKET_NAME").unwrap_or(default.s3.bucket),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.link_prefix, "s");
        assert_eq!(config.file_prefix, "f");
        assert_eq!(config.upload_rate_limit, 10);
        assert_eq!(config.upload_rate_window_secs, 3600);
        assert!(config.analytics);
        assert!(!config.s3.enabled);
    }

    #[test]
    fn test_unified_prefix() {
        unsafe {
            env::set_var("UNIFIED_PREFIX", "go");
            env::remove_var("LINK_PREFIX");
            env::remove_var("FILE_PREFIX");
        }
        let config = AppConfig::from_env();
        unsafe { env::remove_var("UNIFIED_PREFIX") };
        assert_eq!(config.link_prefix, "go");
        assert_eq!(config.file_prefix, "go");
    }
}
