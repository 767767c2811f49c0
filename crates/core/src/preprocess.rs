use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Configuration for HTML preprocessing ahead of the narrative and table paths
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Whether to remove script tags
    pub remove_scripts: bool,
    /// Whether to remove style tags
    pub remove_styles: bool,
    /// Whether to remove noscript tags
    pub remove_noscript: bool,
    /// Whether to remove template tags
    pub remove_templates: bool,
    /// Whether to remove HTML comments
    pub remove_comments: bool,
    /// Whether to collapse whitespace runs to one space
    pub normalize_whitespace: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_scripts: true,
            remove_styles: true,
            remove_noscript: true,
            remove_templates: true,
            remove_comments: true,
            normalize_whitespace: true,
        }
    }
}

/// Strip non-content elements and comments so that markers and keywords
/// only match visible text
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let mut processed = if config.remove_scripts
        || config.remove_styles
        || config.remove_noscript
        || config.remove_templates
    {
        remove_unwanted_tags(html, config)
    } else {
        html.to_string()
    };

    if config.remove_comments {
        processed = remove_comments(&processed);
    }

    if config.normalize_whitespace {
        processed = normalize_whitespace(&processed);
    }

    processed
}

/// Remove script, style, noscript and template elements with their content
fn remove_unwanted_tags(html: &str, config: &PreprocessConfig) -> String {
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                if config.remove_scripts {
                    Some(lol_html::element!("script", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_styles {
                    Some(lol_html::element!("style", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_noscript {
                    Some(lol_html::element!("noscript", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_templates {
                    Some(lol_html::element!("template", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
            ]
            .into_iter()
            .flatten()
            .collect(),
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    if rewriter.write(html.as_bytes()).is_err() || rewriter.end().is_err() {
        return html.to_string();
    }

    output
}

/// Remove HTML comments from the document
fn remove_comments(html: &str) -> String {
    COMMENT_RE.replace_all(html, "").to_string()
}

/// Normalize whitespace in HTML
fn normalize_whitespace(html: &str) -> String {
    WHITESPACE_RE.replace_all(html, " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_unwanted_tags() {
        let html = r#"
            <html>
                <head><script>var t = "<table>成績</table>";</script><style>td{color:red;}</style></head>
                <body>
                    <noscript>Enable JavaScript</noscript>
                    <template><tr><td>tpl</td></tr></template>
                    <table><tr><td>身長</td></tr></table>
                </body>
            </html>
        "#;

        let result = remove_unwanted_tags(html, &PreprocessConfig::default());
        assert!(!result.contains("<script"));
        assert!(!result.contains("<style"));
        assert!(!result.contains("<noscript"));
        assert!(!result.contains("tpl"));
        assert!(!result.contains("成績"), "Script content should be removed");
        assert!(!result.contains("color:red"), "Style content should be removed");
        assert!(result.contains("<td>身長</td>"));
    }

    #[test]
    fn test_document_of_only_scripts_becomes_empty() {
        let html = r#"<script>var t = "<table>成績</table>";</script><style>table{}</style>"#;
        assert_eq!(remove_unwanted_tags(html, &PreprocessConfig::default()), "");
        assert_eq!(preprocess_html(html, &PreprocessConfig::default()), "");
    }

    #[test]
    fn test_partial_config_json() {
        let config: PreprocessConfig = serde_json::from_str(r#"{"remove_comments": false}"#).unwrap();
        assert!(!config.remove_comments);
        assert!(config.remove_scripts);
    }

    #[test]
    fn test_keep_scripts_when_disabled() {
        let config = PreprocessConfig { remove_scripts: false, ..Default::default() };
        let result = remove_unwanted_tags("<script>x()</script><p>a</p>", &config);
        assert!(result.contains("<script>x()</script>"));
    }

    #[test]
    fn test_remove_comments() {
        let html = "<p>Visible</p><!-- <table>広告</table>\n multi-line --><p>After</p>";
        let result = remove_comments(html);
        assert_eq!(result, "<p>Visible</p><p>After</p>");
    }

    #[test]
    fn test_normalize_whitespace() {
        let result = normalize_whitespace("<td>  a \n\t b</td>");
        assert_eq!(result, "<td> a b</td>");
    }

    #[test]
    fn test_preprocess_full_pipeline() {
        let html = "<html>\n<head><script>s()</script><!-- c --></head>\n<body><p>本文</p></body></html>";
        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("s()"));
        assert!(!result.contains("<!--"));
        assert!(!result.contains('\n'));
        assert!(result.contains("<p>本文</p>"));
    }

    #[test]
    fn test_preprocess_noop_config() {
        let config = PreprocessConfig {
            remove_scripts: false,
            remove_styles: false,
            remove_noscript: false,
            remove_templates: false,
            remove_comments: false,
            normalize_whitespace: false,
        };
        let html = "<script>x</script>\n<!-- c -->";
        assert_eq!(preprocess_html(html, &config), html);
    }
}
