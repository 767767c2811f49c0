//! Per-domain site profiles.
//!
//! A site profile is a JSON document with the shape of [`ExtractorConfig`].
//! Any section may be omitted; omitted sections keep their defaults. For
//! `www.example.jp` the loader tries, in order:
//!
//! 1. `www.example.jp.json`
//! 2. `example.jp.json`
//! 3. parent domains down to two labels (`jp.json` is never tried)
//!
//! in the custom directory first, then the standard directory
//! (`~/.config/fieldsift/sites`). The first file that parses wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractor::ExtractorConfig;
use crate::{FieldsiftError, Result};

/// Loads and caches site profiles.
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    custom_dir: Option<PathBuf>,
    standard_dir: Option<PathBuf>,
    cache: HashMap<String, ExtractorConfig>,
}

impl ProfileLoader {
    /// Loader with no directories; every lookup yields the defaults.
    pub fn new() -> Self {
        Self { custom_dir: None, standard_dir: None, cache: HashMap::new() }
    }

    pub fn builder() -> ProfileLoaderBuilder {
        ProfileLoaderBuilder::new()
    }

    /// Profile for the host of `url`.
    pub fn load_for_url(&mut self, url: &str) -> Result<ExtractorConfig> {
        let domain = extract_domain(url)?;
        Ok(self.load_for_domain(&domain))
    }

    /// Profile for `domain`, or the defaults when no file applies.
    pub fn load_for_domain(&mut self, domain: &str) -> ExtractorConfig {
        let domain = domain.to_ascii_lowercase();
        if let Some(config) = self.cache.get(&domain) {
            return config.clone();
        }

        let config = self
            .find_profile_files(&domain)
            .iter()
            .find_map(|path| match load_file(path) {
                Ok(config) => {
                    tracing::debug!(domain = %domain, path = %path.display(), "site profile loaded");
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable site profile");
                    None
                }
            })
            .unwrap_or_default();

        self.cache.insert(domain, config.clone());
        config
    }

    /// Existing profile files for `domain` in priority order.
    fn find_profile_files(&self, domain: &str) -> Vec<PathBuf> {
        let names = generate_profile_names(domain);
        let mut files = Vec::new();

        for dir in [&self.custom_dir, &self.standard_dir].into_iter().flatten() {
            for name in &names {
                let path = dir.join(name);
                if path.is_file() && !files.contains(&path) {
                    files.push(path);
                }
            }
        }

        files
    }

    pub fn custom_dir(&self) -> Option<&Path> {
        self.custom_dir.as_deref()
    }

    pub fn standard_dir(&self) -> Option<&Path> {
        self.standard_dir.as_deref()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Standard profile directory (`~/.config/fieldsift/sites`).
    #[cfg(feature = "profiles")]
    pub fn default_standard_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("fieldsift").join("sites"))
    }

    #[cfg(not(feature = "profiles"))]
    pub fn default_standard_dir() -> Option<PathBuf> {
        None
    }
}

impl Default for ProfileLoader {
    fn default() -> Self {
        let mut builder = ProfileLoaderBuilder::new();
        if let Some(dir) = Self::default_standard_dir() {
            builder = builder.standard_dir(dir);
        }
        builder.build()
    }
}

/// Builder for ProfileLoader
#[derive(Debug, Default)]
pub struct ProfileLoaderBuilder {
    custom_dir: Option<PathBuf>,
    standard_dir: Option<PathBuf>,
}

impl ProfileLoaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched before the standard one.
    pub fn custom_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.custom_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn standard_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.standard_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> ProfileLoader {
        ProfileLoader { custom_dir: self.custom_dir, standard_dir: self.standard_dir, cache: HashMap::new() }
    }
}

/// Reads one profile file.
pub fn load_file(path: &Path) -> Result<ExtractorConfig> {
    if !path.exists() {
        return Err(FieldsiftError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| FieldsiftError::ConfigError(format!("{}: {}", path.display(), e)))
}

/// Candidate file names for `domain`, most specific first.
fn generate_profile_names(domain: &str) -> Vec<String> {
    let mut names = vec![format!("{}.json", domain)];

    if let Some(without_www) = domain.strip_prefix("www.") {
        names.push(format!("{}.json", without_www));
    }

    let parts: Vec<&str> = domain.split('.').collect();
    for i in 1..parts.len().saturating_sub(1) {
        let name = format!("{}.json", parts[i..].join("."));
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url).map_err(|e| FieldsiftError::InvalidUrl(e.to_string()))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| FieldsiftError::InvalidUrl("No domain found in URL".to_string()))
}
