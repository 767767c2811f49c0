//! Narrative span extraction over flattened text.
//!
//! Works on the tag-free view produced by [`flatten`]. The start of the span
//! is the first marker found from an ordered priority list (a more specific
//! marker beats a broader one regardless of where either appears), falling
//! back to a second list of section markers. The end is the first closing
//! marker found after the start, or the end of the text.
//!
//! Without any start marker the extractor takes a fixed-size window that
//! begins at an anchor string, typically the subject's name.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tokenize::unescape;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
/// Also matches a tag cut off at the end of a byte-capped download.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>|<[A-Za-z/!][^>]*$").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Replaces every tag with a space, decodes entities and collapses whitespace.
pub fn flatten(html: &str) -> String {
    let without_comments = COMMENT_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");
    let decoded = unescape(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Marker lists and window settings for narrative extraction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Preferred start markers, most specific first.
    pub start_markers: Vec<String>,
    /// Broader section markers tried when no preferred marker is present.
    pub fallback_start_markers: Vec<String>,
    /// Closing markers, in priority order.
    pub end_markers: Vec<String>,
    /// Anchor for the fixed window. When unset, callers supply one.
    pub anchor: Option<String>,
    /// Size of the fixed window, in characters.
    pub window_chars: usize,
    /// Literal fragments of page chrome removed from the result.
    pub noise: Vec<String>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            start_markers: ["主な経歴", "経歴・成績", "経歴"].map(String::from).to_vec(),
            fallback_start_markers: ["プロフィール", "選手紹介", "人物"].map(String::from).to_vec(),
            end_markers: ["関連ニュース", "関連リンク", "このページの先頭へ", "Copyright"]
                .map(String::from)
                .to_vec(),
            anchor: None,
            window_chars: 2000,
            noise: ["印刷する", "シェアする", "ツイート", "ページの先頭へ戻る"].map(String::from).to_vec(),
        }
    }
}

/// How a narrative span was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanSource {
    /// Between a start marker and an end marker (or end of text).
    Markers,
    /// Fixed window after the anchor.
    Anchor,
    /// Nothing matched.
    None,
}

/// Extracted narrative together with how it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeSpan {
    pub text: String,
    pub source: SpanSource,
}

/// Locates a narrative span in flattened text.
#[derive(Debug, Clone, Default)]
pub struct NarrativeWindowExtractor {
    config: NarrativeConfig,
}

impl NarrativeWindowExtractor {
    pub fn new(config: NarrativeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    /// Extracts from already-flattened text using the configured anchor.
    pub fn extract(&self, flattened: &str) -> NarrativeSpan {
        self.extract_with_anchor(flattened, None)
    }

    /// Extracts from flattened text. `fallback_anchor` is used only when the
    /// configuration carries no anchor of its own.
    pub fn extract_with_anchor(&self, flattened: &str, fallback_anchor: Option<&str>) -> NarrativeSpan {
        let start = find_first(flattened, &self.config.start_markers, 0)
            .or_else(|| find_first(flattened, &self.config.fallback_start_markers, 0));

        let (raw, source) = match start {
            Some((start, marker_len)) => {
                let end = find_first(flattened, &self.config.end_markers, start + marker_len)
                    .map_or(flattened.len(), |(end, _)| end);
                (&flattened[start..end], SpanSource::Markers)
            }
            None => {
                let anchor = self.config.anchor.as_deref().or(fallback_anchor).filter(|a| !a.is_empty());
                match anchor.and_then(|a| flattened.find(a)) {
                    Some(at) => (char_window(flattened, at, self.config.window_chars), SpanSource::Anchor),
                    None => ("", SpanSource::None),
                }
            }
        };

        NarrativeSpan { text: self.remove_noise(raw), source }
    }

    fn remove_noise(&self, text: &str) -> String {
        let mut out = text.to_string();
        for noise in self.config.noise.iter().filter(|n| !n.is_empty()) {
            out = out.replace(noise.as_str(), "");
        }
        SPACE_RE.replace_all(&out, " ").trim().to_string()
    }
}

/// Finds the first marker (by list order) occurring at or after `from`.
/// Returns its byte offset and byte length.
fn find_first(text: &str, markers: &[String], from: usize) -> Option<(usize, usize)> {
    let haystack = text.get(from..)?;
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .find_map(|m| haystack.find(m.as_str()).map(|i| (from + i, m.len())))
}

/// Slice of at most `chars` characters starting at byte offset `start`.
fn char_window(text: &str, start: usize, chars: usize) -> &str {
    let tail = &text[start..];
    let end = tail.char_indices().nth(chars).map_or(tail.len(), |(i, _)| i);
    &tail[..end]
}
