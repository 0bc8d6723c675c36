//! Server configuration loaded from environment variables

use crate::error::{Result, ServerError};
use imagery_cache::{
    BoundingBox, ReferenceStrategy, RepositoryConfig, DEFAULT_MIN_IMAGE_BYTES,
    DEFAULT_RECONCILE_SLACK,
};
use std::env;
use std::path::PathBuf;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub repository: RepositoryConfig,
    pub provider_url: String,
    pub provider_token: Option<String>,
    pub fetch_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            repository: RepositoryConfig::default(),
            provider_url: "http://localhost:8080/imagery".to_string(),
            provider_token: None,
            fetch_concurrency: 4,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers fall back to defaults
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = get("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let cache_dir = get("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.repository.cache_dir);

        let default_bounding_box = match get("BBOX") {
            Some(raw) => raw
                .parse::<BoundingBox>()
                .map_err(|e| ServerError::Config(e.to_string()))?,
            None => defaults.repository.default_bounding_box,
        };

        let min_image_bytes = get("MIN_IMAGE_BYTES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MIN_IMAGE_BYTES);

        let reconcile_slack = get("RECONCILE_SLACK")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_RECONCILE_SLACK);

        let prefix = get("IMAGE_PATH_PREFIX").unwrap_or_else(|| "/images".to_string());
        let references = match get("REFERENCE_MODE").as_deref() {
            Some("data-url") => ReferenceStrategy::DataUrl,
            _ => ReferenceStrategy::StaticPath { prefix },
        };

        let provider_url = get("PROVIDER_URL").unwrap_or(defaults.provider_url);
        url::Url::parse(&provider_url)
            .map_err(|e| ServerError::Config(format!("PROVIDER_URL {}: {}", provider_url, e)))?;

        let provider_token = get("PROVIDER_TOKEN").filter(|t| !t.is_empty());

        let fetch_concurrency = get("FETCH_CONCURRENCY")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.fetch_concurrency);

        Ok(Self {
            port,
            repository: RepositoryConfig {
                cache_dir,
                default_bounding_box,
                min_image_bytes,
                reconcile_slack,
                references,
            },
            provider_url,
            provider_token,
            fetch_concurrency,
        })
    }
}
