//! Splitting a finished profile into profile, history and narrative.
//!
//! Each entry is checked against the history markers first and the
//! narrative markers second; the first rule that matches claims the entry
//! and removes it from the profile. When several keys match the same rule,
//! the last one in document order wins.

use serde::{Deserialize, Serialize};

use crate::rows::Profile;

/// Marker substrings used to route profile entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A key containing any of these becomes the history list.
    pub history_markers: Vec<String>,
    /// A key containing any of these becomes the narrative.
    pub narrative_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            history_markers: ["全国大会", "大会成績", "主な成績", "経歴"].map(String::from).to_vec(),
            narrative_markers: ["寸評", "人物", "特徴"].map(String::from).to_vec(),
        }
    }
}

/// Classified output of the structured path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub profile: Profile,
    pub history: Vec<String>,
    pub narrative: String,
}

/// Routes profile entries into [`FieldRecord`] buckets.
#[derive(Debug, Clone, Default)]
pub struct RecordClassifier {
    config: ClassifierConfig,
}

impl RecordClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, profile: Profile) -> FieldRecord {
        let mut record = FieldRecord::default();

        for (key, value) in profile {
            let cleaned = clean_value(&value);
            if contains_any(&key, &self.config.history_markers) {
                record.history = cleaned
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect();
            } else if contains_any(&key, &self.config.narrative_markers) {
                record.narrative = cleaned;
            } else {
                record.profile.append(key, cleaned);
            }
        }

        record
    }
}

fn contains_any(key: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| !m.is_empty() && key.contains(m.as_str()))
}

/// Collapses runs of spaces and tabs, strips them around newlines and
/// trims, leaving newlines in place.
pub fn clean_value(value: &str) -> String {
    let lines: Vec<String> = value
        .split('\n')
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            for part in line.split([' ', '\t', '\r']).filter(|p| !p.is_empty()) {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(part);
            }
            out
        })
        .collect();
    lines.join("\n").trim().to_string()
}
