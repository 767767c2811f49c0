//! Extraction result type with JSON and text conversion.
//!
//! [`ExtractionResult`] is built once per request from a classified
//! [`FieldRecord`] and never mutated afterwards.

use serde::Serialize;

use crate::Result;
use crate::classify::FieldRecord;
use crate::formatters::json::{JsonConfig, convert_to_json};
use crate::formatters::text::{TextConfig, convert_to_text};
use crate::rows::Profile;

/// Label written to `source` when the caller supplies none.
pub const DEFAULT_SOURCE: &str = "fieldsift";

/// The complete result of one extraction.
///
/// `history` and `raw_resume` are always serialized, as `[]` and `""` when
/// nothing was classified into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Subject name, as requested or taken from the page title.
    pub name: String,

    /// Where the page came from (a label, not a URL).
    pub source: String,

    /// Archived copy when one exists, otherwise the original page URL.
    pub url: Option<String>,

    /// The page that was fetched.
    pub original_url: Option<String>,

    /// Whether `url` points at an archived copy.
    pub has_archive: bool,

    /// Remaining key/value fields in document order.
    pub profile: Profile,

    /// Ordered history lines.
    pub history: Vec<String>,

    /// Narrative text span.
    #[serde(rename = "raw_resume")]
    pub narrative: String,
}

impl ExtractionResult {
    /// Assembles a result; `url` prefers `archive_url` over `original_url`.
    pub fn new(
        name: impl Into<String>, source: impl Into<String>, record: FieldRecord, original_url: Option<String>,
        archive_url: Option<String>,
    ) -> Self {
        let has_archive = archive_url.is_some();
        let url = archive_url.or_else(|| original_url.clone());
        let FieldRecord { profile, history, narrative } = record;

        Self { name: name.into(), source: source.into(), url, original_url, has_archive, profile, history, narrative }
    }

    /// Points `url` at an archived copy when one was found.
    pub fn with_archive_url(mut self, archive_url: Option<String>) -> Self {
        if let Some(archive_url) = archive_url {
            self.url = Some(archive_url);
            self.has_archive = true;
        }
        self
    }

    /// True when nothing at all was extracted. Callers decide whether that
    /// means "not found".
    pub fn is_empty(&self) -> bool {
        self.profile.is_empty() && self.history.is_empty() && self.narrative.is_empty()
    }

    /// Gets the result as a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serializes the result with the given formatting.
    pub fn to_json_string(&self, config: &JsonConfig) -> Result<String> {
        convert_to_json(self, config)
    }

    /// Renders the human-readable report.
    pub fn to_text(&self) -> String {
        convert_to_text(self, &TextConfig::default())
    }
}
