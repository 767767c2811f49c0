//! Row/column key-value accumulation over tag events.
//!
//! [`RowFieldAccumulator`] watches a [`HtmlEvent`] stream for row elements
//! (`<tr>` by default). Inside a row, text of the first column element is
//! the key and text of the second is the value. A line-break element inside
//! the value column becomes a single `\n`. Every row is committed when the
//! next row opens or the stream ends, so an unterminated final row from a
//! truncated download is still kept.

use serde::Deserialize;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::tokenize::{self, HtmlEvent};

/// Tag names that drive row accumulation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RowConfig {
    /// Element whose opening starts a new record.
    pub row_tag: String,
    /// Elements that count as columns. The first one opened in a row holds
    /// the key, the second holds the value, later ones are ignored.
    pub column_tags: Vec<String>,
    /// Element treated as a newline inside values.
    pub line_break_tag: String,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            row_tag: "tr".to_string(),
            column_tags: vec!["th".to_string(), "td".to_string()],
            line_break_tag: "br".to_string(),
        }
    }
}

/// Insertion-ordered key/value table with unique keys.
///
/// Inserting an existing key appends to its value on a new line instead of
/// overwriting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    entries: Vec<(String, String)>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` under `key`, appending when the key already exists.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) if existing.is_empty() => *existing = value,
            Some((_, existing)) => {
                if !value.is_empty() {
                    existing.push('\n');
                    existing.push_str(&value);
                }
            }
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for Profile {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Profile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut profile = Profile::new();
        for (k, v) in iter {
            profile.append(k, v);
        }
        profile
    }
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Where the accumulator currently is relative to rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Idle,
    InRow,
    InKeyColumn,
    InValueColumn,
}

/// State machine turning tag events into a [`Profile`].
#[derive(Debug)]
pub struct RowFieldAccumulator<'c> {
    config: &'c RowConfig,
    state: RowState,
    row_open: bool,
    columns_seen: usize,
    key: String,
    value: String,
    profile: Profile,
    committed: usize,
}

impl<'c> RowFieldAccumulator<'c> {
    pub fn new(config: &'c RowConfig) -> Self {
        Self {
            config,
            state: RowState::Idle,
            row_open: false,
            columns_seen: 0,
            key: String::new(),
            value: String::new(),
            profile: Profile::new(),
            committed: 0,
        }
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    /// Value accumulated so far for the open row.
    pub fn pending_value(&self) -> &str {
        &self.value
    }

    /// Number of rows committed so far.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Feeds one event.
    pub fn feed(&mut self, event: &HtmlEvent) {
        match event {
            HtmlEvent::Open { tag, .. } => self.on_open(tag),
            HtmlEvent::Close { tag } => self.on_close(tag),
            HtmlEvent::Text { content } => self.on_text(content),
        }
    }

    /// Commits the open row, if any, and returns the table.
    pub fn finish(mut self) -> Profile {
        if self.row_open {
            self.commit();
        }
        tracing::debug!(rows = self.committed, keys = self.profile.len(), "row accumulation finished");
        self.profile
    }

    fn is_column(&self, tag: &str) -> bool {
        self.config.column_tags.iter().any(|t| t == tag)
    }

    fn on_open(&mut self, tag: &str) {
        if tag == self.config.row_tag {
            if self.row_open {
                self.commit();
            }
            self.row_open = true;
            self.columns_seen = 0;
            self.state = RowState::InRow;
        } else if self.row_open && self.is_column(tag) {
            self.columns_seen += 1;
            self.state = match self.columns_seen {
                1 => RowState::InKeyColumn,
                2 => RowState::InValueColumn,
                _ => RowState::InRow,
            };
        } else if tag == self.config.line_break_tag
            && self.state == RowState::InValueColumn
            && !self.key.trim().is_empty()
        {
            self.value.push('\n');
        }
    }

    fn on_close(&mut self, tag: &str) {
        if tag == self.config.row_tag {
            self.state = RowState::Idle;
        } else if self.is_column(tag) && matches!(self.state, RowState::InKeyColumn | RowState::InValueColumn) {
            self.state = RowState::InRow;
        }
    }

    fn on_text(&mut self, content: &str) {
        match self.state {
            RowState::InKeyColumn => self.key.push_str(&collapse_inline(content)),
            RowState::InValueColumn => self.value.push_str(content),
            RowState::Idle | RowState::InRow => {}
        }
    }

    fn commit(&mut self) {
        let key = self.key.trim();
        if !key.is_empty() {
            self.profile.append(key, std::mem::take(&mut self.value));
            self.committed += 1;
        }
        self.key.clear();
        self.value.clear();
        self.columns_seen = 0;
        self.row_open = false;
    }
}

/// Collapses whitespace runs to one space, keeping a lone space for
/// whitespace-only input.
fn collapse_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Runs the accumulator over an event sequence.
pub fn accumulate<I>(events: I, config: &RowConfig) -> Profile
where
    I: IntoIterator<Item = HtmlEvent>,
{
    let mut acc = RowFieldAccumulator::new(config);
    for event in events {
        acc.feed(&event);
    }
    acc.finish()
}

/// Tokenizes `html` and accumulates its rows.
pub fn accumulate_html(html: &str, config: &RowConfig) -> Profile {
    accumulate(tokenize::parse(html), config)
}
