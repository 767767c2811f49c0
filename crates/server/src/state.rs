use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldsift_core::{BoundedFetcher, Extractor, FieldsiftError, ProfileLoader, Result};
use moka::future::Cache;

use crate::config::ServerConfig;

/// Shared per-process state. Extraction itself holds no state; only the
/// response cache and the site profile cache live here.
pub struct AppState {
    pub fetcher: BoundedFetcher,
    pub cache: Cache<String, serde_json::Value>,
    pub cache_ttl: Duration,
    profiles: Arc<Mutex<ProfileLoader>>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let fetcher = BoundedFetcher::new(config.fetch.clone())?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: &ServerConfig, fetcher: BoundedFetcher) -> Self {
        let mut builder = ProfileLoader::builder();
        if let Some(dir) = &config.config_dir {
            builder = builder.custom_dir(dir);
        }
        if let Some(dir) = ProfileLoader::default_standard_dir() {
            builder = builder.standard_dir(dir);
        }

        Self {
            fetcher,
            cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(config.cache_ttl)
                .build(),
            cache_ttl: config.cache_ttl,
            profiles: Arc::new(Mutex::new(builder.build())),
        }
    }

    /// Extractor configured by the site profile for `url`.
    ///
    /// Profile files are read on the blocking pool; later calls for the same
    /// domain are served from the loader's cache.
    pub async fn extractor_for(&self, url: &str) -> Result<Extractor> {
        let profiles = Arc::clone(&self.profiles);
        let url = url.to_string();
        let config = tokio::task::spawn_blocking(move || {
            let mut loader = profiles
                .lock()
                .map_err(|_| FieldsiftError::ConfigError("site profile cache poisoned".to_string()))?;
            loader.load_for_url(&url)
        })
        .await
        .map_err(|e| FieldsiftError::ConfigError(format!("site profile lookup failed: {}", e)))??;
        Ok(Extractor::new(config))
    }
}
