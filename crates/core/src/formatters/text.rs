use crate::record::ExtractionResult;

const RULE_WIDTH: usize = 50;

/// Configuration for the plain text report
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Include the name/source/url header
    pub include_header: bool,

    /// Render the narrative as a step-by-step career path when there is no history
    pub career_path: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { include_header: true, career_path: true }
    }
}

/// Plain text formatter for extraction results
pub struct TextFormatter {
    config: TextConfig,
}

impl TextFormatter {
    pub fn new(config: TextConfig) -> Self {
        Self { config }
    }

    /// Render a result as text
    pub fn convert(&self, result: &ExtractionResult) -> String {
        convert_to_text(result, &self.config)
    }
}

/// Render a result as a plain text report
pub fn convert_to_text(result: &ExtractionResult, config: &TextConfig) -> String {
    let mut output = String::new();

    if config.include_header {
        output.push_str(&generate_header(result));
    }

    for (key, value) in result.profile.iter() {
        output.push_str(key);
        output.push_str(": ");
        output.push_str(&value.replace('\n', " / "));
        output.push('\n');
    }

    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');

    if !result.history.is_empty() {
        output.push_str("[History]\n");
        for item in &result.history {
            output.push_str("  • ");
            output.push_str(item);
            output.push('\n');
        }
    } else if !result.narrative.is_empty() {
        if config.career_path {
            output.push_str("[Career path]\n");
            output.push_str(&career_path(&result.narrative));
        } else {
            output.push_str("[Narrative]\n");
            output.push_str(&result.narrative);
            output.push('\n');
        }
    }

    output
}

/// Generate the header block
fn generate_header(result: &ExtractionResult) -> String {
    let rule = "━".repeat(RULE_WIDTH);
    let mut header = String::new();
    header.push_str(&rule);
    header.push('\n');
    header.push_str(&result.name);
    header.push('\n');
    header.push_str(&format!(
        "  (source: {} | url: {})\n",
        result.source,
        result.url.as_deref().unwrap_or("-")
    ));
    header.push_str(&rule);
    header.push('\n');
    header
}

/// Split a `A > B ＞ C` narrative into one step per line
pub fn career_path(narrative: &str) -> String {
    let mut output = String::new();
    let steps = narrative
        .split(['>', '＞'])
        .map(str::trim)
        .filter(|step| !step.is_empty());

    for (i, step) in steps.enumerate() {
        if i > 0 {
            output.push_str("  ▼\n");
        }
        output.push_str("  │  ");
        output.push_str(step);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FieldRecord;

    fn result(history: Vec<&str>, narrative: &str) -> ExtractionResult {
        let record = FieldRecord {
            profile: vec![("身長", "180cm\n(高校時)")].into_iter().collect(),
            history: history.into_iter().map(String::from).collect(),
            narrative: narrative.to_string(),
        };
        ExtractionResult::new("佐藤龍月", "npb", record, Some("https://example.jp/p".to_string()), None)
    }

    #[test]
    fn test_header_and_profile() {
        let text = convert_to_text(&result(vec![], ""), &TextConfig::default());
        assert!(text.contains("佐藤龍月"));
        assert!(text.contains("(source: npb | url: https://example.jp/p)"));
        assert!(text.contains("身長: 180cm / (高校時)"));
    }

    #[test]
    fn test_history_list_preferred() {
        let text = convert_to_text(&result(vec!["優勝", "準優勝"], "A > B"), &TextConfig::default());
        assert!(text.contains("  • 優勝\n  • 準優勝\n"));
        assert!(!text.contains("Career path"));
    }

    #[test]
    fn test_career_path_rendering() {
        let text = convert_to_text(&result(vec![], "中学 ＞ 高校 > プロ"), &TextConfig::default());
        assert!(text.contains("[Career path]"));
        assert!(text.contains("  │  中学\n  ▼\n  │  高校\n  ▼\n  │  プロ\n"));
    }

    #[test]
    fn test_plain_narrative_without_career_path() {
        let config = TextConfig { include_header: false, career_path: false };
        let text = TextFormatter::new(config).convert(&result(vec![], "速球派"));
        assert!(text.starts_with("身長"));
        assert!(text.contains("[Narrative]\n速球派\n"));
    }

    #[test]
    fn test_career_path_skips_empty_steps() {
        assert_eq!(career_path("> A >> B >"), "  │  A\n  ▼\n  │  B\n");
        assert_eq!(career_path(""), "");
    }
}
