//! Whole-table capture and allow/deny filtering.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TABLE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").unwrap());

/// Keyword policy for table fragments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableFilterConfig {
    /// A fragment must contain one of these to be kept.
    pub allow: Vec<String>,
    /// A fragment containing any of these is discarded, even if allowed.
    pub deny: Vec<String>,
    /// Inserted between kept fragments when joining.
    pub separator: String,
}

impl Default for TableFilterConfig {
    fn default() -> Self {
        Self {
            allow: ["成績", "経歴", "打率", "防御率", "身長"].map(String::from).to_vec(),
            deny: ["広告", "ランキング", "スポンサー"].map(String::from).to_vec(),
            separator: "\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableVerdict {
    Kept,
    Discarded,
}

/// One outermost `<table>...</table>` substring and its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFragment {
    pub html: String,
    pub verdict: TableVerdict,
}

/// Partition of a document's tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSelection {
    pub kept: Vec<String>,
    pub discarded: Vec<String>,
}

impl TableSelection {
    /// Kept fragments in document order, joined by `separator`.
    pub fn joined(&self, separator: &str) -> String {
        self.kept.join(separator)
    }
}

/// Applies a [`TableFilterConfig`] to documents.
#[derive(Debug, Clone, Default)]
pub struct TableSetFilter {
    config: TableFilterConfig,
}

impl TableSetFilter {
    pub fn new(config: TableFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TableFilterConfig {
        &self.config
    }

    /// Deny first, then allow; anything matching neither is discarded.
    pub fn verdict(&self, fragment: &str) -> TableVerdict {
        if contains_any(fragment, &self.config.deny) {
            TableVerdict::Discarded
        } else if contains_any(fragment, &self.config.allow) {
            TableVerdict::Kept
        } else {
            TableVerdict::Discarded
        }
    }

    pub fn fragments(&self, html: &str) -> Vec<TableFragment> {
        extract_tables(html)
            .into_iter()
            .map(|t| TableFragment { verdict: self.verdict(t), html: t.to_string() })
            .collect()
    }

    pub fn filter(&self, html: &str) -> TableSelection {
        let mut selection = TableSelection::default();
        for fragment in self.fragments(html) {
            match fragment.verdict {
                TableVerdict::Kept => selection.kept.push(fragment.html),
                TableVerdict::Discarded => selection.discarded.push(fragment.html),
            }
        }
        tracing::debug!(
            kept = selection.kept.len(),
            discarded = selection.discarded.len(),
            "table filter applied"
        );
        selection
    }

    /// Kept fragments joined with the configured separator.
    pub fn filter_joined(&self, html: &str) -> String {
        self.filter(html).joined(&self.config.separator)
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str()))
}

/// Returns every outermost table, open tag through close tag. Nested tables
/// stay inside their parent; a table left unclosed is dropped.
pub fn extract_tables(html: &str) -> Vec<&str> {
    let mut tables = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for caps in TABLE_TAG_RE.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());
        if closing {
            if depth == 0 {
                continue;
            }
            depth -= 1;
            if depth == 0 {
                tables.push(&html[start..tag.end()]);
            }
        } else {
            if depth == 0 {
                start = tag.start();
            }
            depth += 1;
        }
    }

    tables
}
