use crate::Result;
use crate::record::ExtractionResult;

/// Configuration for JSON output
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Pretty print JSON output
    pub pretty: bool,
}

/// JSON formatter for extraction results
pub struct JsonFormatter {
    config: JsonConfig,
}

impl JsonFormatter {
    pub fn new(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Convert a result to JSON
    pub fn convert(&self, result: &ExtractionResult) -> Result<String> {
        convert_to_json(result, &self.config)
    }
}

/// Convert a result to a JSON string
pub fn convert_to_json(result: &ExtractionResult, config: &JsonConfig) -> Result<String> {
    if config.pretty { Ok(serde_json::to_string_pretty(result)?) } else { Ok(serde_json::to_string(result)?) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FieldRecord;

    fn sample() -> ExtractionResult {
        let record = FieldRecord {
            profile: vec![("身長", "180cm")].into_iter().collect(),
            history: vec!["優勝".to_string(), "準優勝".to_string()],
            narrative: String::new(),
        };
        ExtractionResult::new("佐藤龍月", "npb", record, Some("https://example.jp/p".to_string()), None)
    }

    #[test]
    fn test_compact_json() {
        let json = convert_to_json(&sample(), &JsonConfig::default()).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains(r#""history":["優勝","準優勝"]"#));
        assert!(json.contains(r#""profile":{"身長":"180cm"}"#));
    }

    #[test]
    fn test_pretty_json() {
        let formatter = JsonFormatter::new(JsonConfig { pretty: true });
        let json = formatter.convert(&sample()).unwrap();
        assert!(json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["url"], "https://example.jp/p");
        assert_eq!(value["has_archive"], false);
    }
}
