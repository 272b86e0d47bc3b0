use std::env;
use std::path::PathBuf;

/// Server configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000);

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB default

        let cors_origins = var("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                ]
            });

        Self {
            port,
            data_dir,
            max_upload_bytes,
            cors_origins,
        }
    }
}
