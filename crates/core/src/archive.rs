//! Wayback Machine availability lookup.
//!
//! Lookups are best effort: every failure is logged and reported as "no
//! snapshot", so a missing archive never fails the page extraction around it.

use serde::Deserialize;
use url::Url;

use crate::fetch::{BoundedFetcher, FetchConfig};

/// Public availability API.
pub const WAYBACK_AVAILABILITY_ENDPOINT: &str = "https://archive.org/wayback/available";

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Option<ArchivedSnapshots>,
}

#[derive(Debug, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    url: String,
    #[serde(default = "default_available")]
    available: bool,
}

fn default_available() -> bool {
    true
}

/// Extracts `archived_snapshots.closest.url` from an availability response.
pub fn parse_availability(body: &str) -> Option<String> {
    let availability: Availability = match serde_json::from_str(body) {
        Ok(availability) => availability,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable archive availability response");
            return None;
        }
    };

    availability
        .archived_snapshots?
        .closest
        .filter(|snapshot| snapshot.available && !snapshot.url.is_empty())
        .map(|snapshot| snapshot.url)
}

/// Archive lookup against a configurable availability endpoint.
#[derive(Debug, Clone)]
pub struct ArchiveLookup {
    endpoint: String,
}

impl ArchiveLookup {
    pub fn new() -> Self {
        Self { endpoint: WAYBACK_AVAILABILITY_ENDPOINT.to_string() }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the availability query URL for `page_url`.
    pub fn query_url(&self, page_url: &str) -> Option<Url> {
        match Url::parse_with_params(&self.endpoint, &[("url", page_url)]) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "invalid archive endpoint");
                None
            }
        }
    }

    /// Returns the closest archived copy of `page_url`, if any.
    pub async fn closest_snapshot(&self, fetcher: &BoundedFetcher, page_url: &str) -> Option<String> {
        let query = self.query_url(page_url)?;

        match fetcher.fetch(query.as_str()).await {
            Ok(fetched) => {
                let snapshot = parse_availability(&fetched.text);
                tracing::debug!(page_url, found = snapshot.is_some(), "archive lookup finished");
                snapshot
            }
            Err(e) => {
                tracing::warn!(page_url, error = %e, "archive lookup failed");
                None
            }
        }
    }
}

impl Default for ArchiveLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up the closest Wayback snapshot of `page_url` with a one-off fetcher.
pub async fn closest_snapshot(page_url: &str, fetch_config: &FetchConfig) -> Option<String> {
    let fetcher = match BoundedFetcher::new(fetch_config.clone()) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            tracing::warn!(error = %e, "could not build archive fetcher");
            return None;
        }
    };
    ArchiveLookup::new().closest_snapshot(&fetcher, page_url).await
}
