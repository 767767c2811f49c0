//! Main extraction API.
//!
//! [`Extractor`] ties the three independent paths together:
//!
//! - structured: tokenize, accumulate rows, classify ([`Extractor::extract_fields`])
//! - narrative: preprocess, flatten, locate a span ([`Extractor::extract_narrative`])
//! - tables: preprocess, keep the relevant tables ([`Extractor::filter_tables`])
//!
//! [`Extractor::extract`] runs the structured path and falls back to the
//! narrative window when the classifier found no narrative row.
//!
//! # Example
//!
//! ```rust
//! use fieldsift_core::{Extractor, ExtractorConfig};
//!
//! let config = ExtractorConfig::builder().history_markers(["主な成績"]).build();
//! let extractor = Extractor::new(config);
//! let html = "<table><tr><th>身長</th><td>180cm</td></tr></table>";
//! let record = extractor.extract_fields(html);
//! assert_eq!(record.profile.get("身長"), Some("180cm"));
//! ```

use serde::Deserialize;

use crate::classify::{ClassifierConfig, FieldRecord, RecordClassifier};
use crate::fetch::FetchConfig;
use crate::narrative::{NarrativeConfig, NarrativeSpan, NarrativeWindowExtractor, flatten};
use crate::preprocess::{PreprocessConfig, preprocess_html};
use crate::record::{DEFAULT_SOURCE, ExtractionResult};
use crate::rows::{RowConfig, accumulate};
use crate::tables::{TableFilterConfig, TableSelection, TableSetFilter};
use crate::tokenize::{self, HtmlEvent};

#[cfg(feature = "fetch")]
use crate::Result;
#[cfg(feature = "fetch")]
use crate::archive::ArchiveLookup;
#[cfg(feature = "fetch")]
use crate::fetch::BoundedFetcher;

/// Configuration for an [`Extractor`].
///
/// Deserializes from partial JSON; missing sections keep their defaults.
/// This is the shape of a site profile file.
///
/// # Example
///
/// ```rust
/// use fieldsift_core::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .timeout_ms(5_000)
///     .max_bytes(512 * 1024)
///     .source("npb")
///     .build();
/// assert_eq!(config.fetch.timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Label written to the result's `source` field (default: "fieldsift").
    pub source: String,

    /// Whether fetches also look up an archived copy (default: false).
    pub archive: bool,

    /// Row and column tags for the structured path.
    pub rows: RowConfig,

    /// Marker lists for history and narrative rows.
    pub classifier: ClassifierConfig,

    /// Narrative window settings.
    pub narrative: NarrativeConfig,

    /// Table allow/deny keywords.
    pub tables: TableFilterConfig,

    /// Fetch limits.
    pub fetch: FetchConfig,

    /// Elements stripped before the narrative and table paths.
    pub preprocess: PreprocessConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            archive: false,
            rows: RowConfig::default(),
            classifier: ClassifierConfig::default(),
            narrative: NarrativeConfig::default(),
            tables: TableFilterConfig::default(),
            fetch: FetchConfig::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Creates a new builder for ExtractorConfig.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::new()
    }
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

/// Builder for ExtractorConfig.
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ExtractorConfig::default() }
    }

    /// Sets the source label.
    pub fn source(mut self, value: impl Into<String>) -> Self {
        self.config.source = value.into();
        self
    }

    /// Sets whether to look up archived copies.
    pub fn archive(mut self, value: bool) -> Self {
        self.config.archive = value;
        self
    }

    /// Replaces the row configuration.
    pub fn rows(mut self, value: RowConfig) -> Self {
        self.config.rows = value;
        self
    }

    /// Sets the history markers.
    pub fn history_markers<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.classifier.history_markers = strings(values);
        self
    }

    /// Sets the narrative markers.
    pub fn narrative_markers<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.classifier.narrative_markers = strings(values);
        self
    }

    /// Replaces the narrative window configuration.
    pub fn narrative(mut self, value: NarrativeConfig) -> Self {
        self.config.narrative = value;
        self
    }

    /// Sets the narrative anchor.
    pub fn anchor(mut self, value: impl Into<String>) -> Self {
        self.config.narrative.anchor = Some(value.into());
        self
    }

    /// Sets the narrative window length in characters.
    pub fn window_chars(mut self, value: usize) -> Self {
        self.config.narrative.window_chars = value;
        self
    }

    /// Replaces the table filter configuration.
    pub fn tables(mut self, value: TableFilterConfig) -> Self {
        self.config.tables = value;
        self
    }

    /// Replaces the fetch configuration.
    pub fn fetch(mut self, value: FetchConfig) -> Self {
        self.config.fetch = value;
        self
    }

    /// Sets the fetch deadline.
    pub fn timeout_ms(mut self, value: u64) -> Self {
        self.config.fetch.timeout_ms = value;
        self
    }

    /// Sets the fetch byte ceiling.
    pub fn max_bytes(mut self, value: usize) -> Self {
        self.config.fetch.max_bytes = value;
        self
    }

    /// Sets the User-Agent.
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.fetch.user_agent = value.into();
        self
    }

    /// Replaces the preprocessing configuration.
    pub fn preprocess(mut self, value: PreprocessConfig) -> Self {
        self.config.preprocess = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ExtractorConfig {
        self.config
    }
}

impl Default for ExtractorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point for extraction.
///
/// Holds only immutable configuration, so one instance can serve any number
/// of documents concurrently.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
    classifier: RecordClassifier,
    narrative: NarrativeWindowExtractor,
    tables: TableSetFilter,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            classifier: RecordClassifier::new(config.classifier.clone()),
            narrative: NarrativeWindowExtractor::new(config.narrative.clone()),
            tables: TableSetFilter::new(config.tables.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Structured path: key/value rows routed into profile, history and narrative.
    pub fn extract_fields(&self, html: &str) -> FieldRecord {
        let profile = accumulate(tokenize::parse(html), &self.config.rows);
        self.classifier.classify(profile)
    }

    /// Narrative path over the visible text of `html`.
    pub fn extract_narrative(&self, html: &str) -> String {
        self.narrative_span(html, None).text
    }

    /// Narrative path, using `anchor` when the configuration has none.
    pub fn narrative_span(&self, html: &str, anchor: Option<&str>) -> NarrativeSpan {
        let cleaned = preprocess_html(html, &self.config.preprocess);
        self.narrative.extract_with_anchor(&flatten(&cleaned), anchor)
    }

    /// Table path: outermost tables split into kept and discarded.
    pub fn filter_tables(&self, html: &str) -> TableSelection {
        let cleaned = preprocess_html(html, &self.config.preprocess);
        self.tables.filter(&cleaned)
    }

    /// Kept tables joined with the configured separator.
    pub fn filter_tables_joined(&self, html: &str) -> String {
        self.filter_tables(html).joined(&self.config.tables.separator)
    }

    /// Full extraction of one document.
    ///
    /// `name` falls back to the page title, and `source` to the configured
    /// label. When no narrative row was classified, the narrative window is
    /// anchored on the name.
    pub fn extract(&self, html: &str, name: Option<&str>, source: Option<&str>, url: Option<&str>) -> ExtractionResult {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| document_title(html))
            .unwrap_or_default();

        let mut record = self.extract_fields(html);
        if record.narrative.is_empty() {
            let anchor = Some(name.as_str()).filter(|n| !n.is_empty());
            let span = self.narrative_span(html, anchor);
            tracing::debug!(source = ?span.source, chars = span.text.chars().count(), "narrative fallback");
            record.narrative = span.text;
        }

        let source = source.unwrap_or(&self.config.source);
        ExtractionResult::new(name, source, record, url.map(str::to_string), None)
    }

    /// Fetches `url` under the configured limits and extracts it.
    ///
    /// The archive lookup runs only when enabled in the configuration, and
    /// its failure never fails the extraction.
    #[cfg(feature = "fetch")]
    pub async fn fetch_and_extract(
        &self, fetcher: &BoundedFetcher, url: &str, name: Option<&str>,
    ) -> Result<ExtractionResult> {
        let fetched = fetcher.fetch(url).await?;
        if fetched.truncated {
            tracing::debug!(url, bytes_read = fetched.bytes_read, "extracting from truncated body");
        }

        let result = self.extract(&fetched.text, name, None, Some(url));

        if self.config.archive {
            let archive_url = ArchiveLookup::new().closest_snapshot(fetcher, url).await;
            return Ok(result.with_archive_url(archive_url));
        }

        Ok(result)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Text of the first non-empty `<title>`, or of the first `<h1>` when there is none.
pub fn document_title(html: &str) -> Option<String> {
    let mut heading: Option<String> = None;
    let mut current: Option<(String, String)> = None;

    for event in tokenize::parse(html) {
        match event {
            HtmlEvent::Open { tag, .. } if current.is_none() => {
                if tag == "title" || (tag == "h1" && heading.is_none()) {
                    current = Some((tag, String::new()));
                }
            }
            HtmlEvent::Text { content } => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(&content);
                }
            }
            HtmlEvent::Close { tag } => {
                if current.as_ref().is_some_and(|(open, _)| *open == tag)
                    && let Some((open, buf)) = current.take()
                {
                    let text = buf.split_whitespace().collect::<Vec<_>>().join(" ");
                    if text.is_empty() {
                        continue;
                    }
                    if open == "title" {
                        return Some(text);
                    }
                    heading = Some(text);
                }
            }
            _ => {}
        }
    }

    heading
}

/// Fetches and extracts one page with a one-off extractor.
///
/// # Example
///
/// ```no_run
/// use fieldsift_core::{ExtractorConfig, fetch_and_extract};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let result = fetch_and_extract("https://example.jp/player/1", Some("佐藤"), ExtractorConfig::default()).await?;
///     println!("{}", result.to_text());
///     Ok(())
/// }
/// ```
#[cfg(feature = "fetch")]
pub async fn fetch_and_extract(url: &str, name: Option<&str>, config: ExtractorConfig) -> Result<ExtractionResult> {
    let fetcher = BoundedFetcher::new(config.fetch.clone())?;
    Extractor::new(config).fetch_and_extract(&fetcher, url, name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER_HTML: &str = r#"
        <html><head><title>佐藤龍月 | 選手名鑑</title><script>var t="<table><tr><td>経歴</td><td>x</td></tr></table>";</script></head>
        <body>
            <h1>佐藤龍月</h1>
            <table class="profile">
                <tr><th>身長</th><td>180cm</td></tr>
                <tr><th>投打</th><td>左投左打</td></tr>
                <tr><th>主な成績</th><td>甲子園優勝<br>国体準優勝</td></tr>
            </table>
            <div>主な経歴 中学 ＞ 高校 ＞ プロ 関連ニュース 記事一覧</div>
        </body></html>
    "#;

    #[test]
    fn test_extractor_config_default() {
        let config = ExtractorConfig::default();
        assert_eq!(config.source, "fieldsift");
        assert!(!config.archive);
        assert_eq!(config.fetch.timeout_ms, 10_000);
        assert_eq!(config.narrative.window_chars, 2000);
    }

    #[test]
    fn test_extractor_config_builder() {
        let config = ExtractorConfig::builder()
            .source("npb")
            .archive(true)
            .history_markers(["成績"])
            .narrative_markers(vec!["寸評".to_string()])
            .anchor("佐藤")
            .window_chars(10)
            .timeout_ms(500)
            .max_bytes(1024)
            .user_agent("test-agent")
            .build();

        assert_eq!(config.source, "npb");
        assert!(config.archive);
        assert_eq!(config.classifier.history_markers, vec!["成績"]);
        assert_eq!(config.classifier.narrative_markers, vec!["寸評"]);
        assert_eq!(config.narrative.anchor.as_deref(), Some("佐藤"));
        assert_eq!(config.narrative.window_chars, 10);
        assert_eq!(config.fetch.timeout_ms, 500);
        assert_eq!(config.fetch.max_bytes, 1024);
        assert_eq!(config.fetch.user_agent, "test-agent");
    }

    #[test]
    fn test_partial_config_json() {
        let config: ExtractorConfig =
            serde_json::from_str(r#"{"source":"npb","fetch":{"timeout_ms":3000},"tables":{"allow":["打率"]}}"#)
                .unwrap();
        assert_eq!(config.source, "npb");
        assert_eq!(config.fetch.timeout_ms, 3000);
        assert_eq!(config.fetch.max_bytes, FetchConfig::default().max_bytes);
        assert_eq!(config.tables.allow, vec!["打率"]);
        assert_eq!(config.tables.deny, TableFilterConfig::default().deny);
        assert_eq!(config.rows, RowConfig::default());
    }

    #[test]
    fn test_extract_fields() {
        let record = Extractor::default().extract_fields(PLAYER_HTML);
        assert_eq!(record.profile.get("身長"), Some("180cm"));
        assert_eq!(record.profile.get("投打"), Some("左投左打"));
        assert!(!record.profile.contains_key("主な成績"));
        assert_eq!(record.history, vec!["甲子園優勝", "国体準優勝"]);
        assert!(record.narrative.is_empty());
    }

    #[test]
    fn test_extract_narrative_ignores_script() {
        let narrative = Extractor::default().extract_narrative(PLAYER_HTML);
        assert_eq!(narrative, "主な経歴 中学 ＞ 高校 ＞ プロ");
    }

    #[test]
    fn test_filter_tables() {
        let selection = Extractor::default().filter_tables(PLAYER_HTML);
        assert_eq!(selection.kept.len(), 1);
        assert!(selection.kept[0].contains("身長"));
        assert!(selection.discarded.is_empty());
    }

    #[test]
    fn test_filter_tables_ignores_script_only_document() {
        let html = r#"<script>var t = "<table>成績</table>";</script>"#;
        let selection = Extractor::default().filter_tables(html);
        assert!(selection.kept.is_empty());
        assert!(selection.discarded.is_empty());
        assert!(Extractor::default().extract_narrative(html).is_empty());
    }

    #[test]
    fn test_preprocess_config_from_profile() {
        let html = r#"<script>var t = "<table>成績</table>";</script>"#;
        let config: ExtractorConfig = serde_json::from_str(r#"{"preprocess":{"remove_scripts":false}}"#).unwrap();
        assert!(!config.preprocess.remove_scripts);
        assert!(config.preprocess.remove_styles);

        let selection = Extractor::new(config).filter_tables(html);
        assert_eq!(selection.kept, vec!["<table>成績</table>"]);
    }

    #[test]
    fn test_extract_full() {
        let result = Extractor::default().extract(PLAYER_HTML, None, Some("npb"), Some("https://example.jp/p/1"));
        assert_eq!(result.name, "佐藤龍月 | 選手名鑑");
        assert_eq!(result.source, "npb");
        assert_eq!(result.url.as_deref(), Some("https://example.jp/p/1"));
        assert!(!result.has_archive);
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.narrative, "主な経歴 中学 ＞ 高校 ＞ プロ");
    }

    #[test]
    fn test_extract_classified_narrative_wins() {
        let html = "<table><tr><th>寸評</th><td>速球派</td></tr></table><p>主な経歴 別の文章</p>";
        let result = Extractor::default().extract(html, Some("佐藤"), None, None);
        assert_eq!(result.narrative, "速球派");
        assert_eq!(result.source, "fieldsift");
    }

    #[test]
    fn test_extract_anchor_fallback_uses_name() {
        let config = ExtractorConfig::builder()
            .narrative(NarrativeConfig {
                start_markers: vec![],
                fallback_start_markers: vec![],
                end_markers: vec![],
                noise: vec![],
                window_chars: 6,
                anchor: None,
            })
            .build();
        let html = "<p>ニュース 佐藤龍月は左腕投手 です</p>";
        let result = Extractor::new(config).extract(html, Some("佐藤龍月"), None, None);
        assert_eq!(result.narrative, "佐藤龍月は左");
    }

    #[test]
    fn test_extract_empty_document() {
        let result = Extractor::default().extract("", None, None, None);
        assert_eq!(result.name, "");
        assert!(result.is_empty());
    }

    #[test]
    fn test_document_title() {
        assert_eq!(document_title("<title>  A \n B </title><h1>C</h1>").as_deref(), Some("A B"));
        assert_eq!(document_title("<body><h1>見出し</h1></body>").as_deref(), Some("見出し"));
        assert_eq!(document_title("<title></title><h1>C</h1>").as_deref(), Some("C"));
        assert_eq!(document_title("<p>none</p>"), None);
    }
}
