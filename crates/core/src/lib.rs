//! Field extraction from profile-style HTML pages.
//!
//! Three independent paths over the same document:
//!
//! - key/value rows of tables and definition lists, classified into profile
//!   fields, history lines and narrative text
//! - a narrative span located by textual markers in the flattened page
//! - the subset of tables that mention configured keywords
//!
//! ```rust
//! use fieldsift_core::Extractor;
//!
//! let html = r#"<table>
//!     <tr><th>身長</th><td>180cm</td></tr>
//!     <tr><th>主な成績</th><td>甲子園優勝<br>国体準優勝</td></tr>
//! </table>"#;
//!
//! let result = Extractor::default().extract(html, Some("佐藤"), None, None);
//! assert_eq!(result.profile.get("身長"), Some("180cm"));
//! assert_eq!(result.history, vec!["甲子園優勝", "国体準優勝"]);
//! ```

#[cfg(feature = "fetch")]
pub mod archive;
pub mod classify;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod formatters;
pub mod narrative;
pub mod preprocess;
pub mod profiles;
pub mod record;
pub mod rows;
pub mod tables;
pub mod tokenize;

#[cfg(feature = "fetch")]
pub use archive::{ArchiveLookup, closest_snapshot};
pub use classify::{ClassifierConfig, FieldRecord, RecordClassifier, clean_value};
pub use error::{FieldsiftError, Result};
#[cfg(feature = "fetch")]
pub use extractor::fetch_and_extract;
pub use extractor::{Extractor, ExtractorConfig, ExtractorConfigBuilder, document_title};
#[cfg(feature = "fetch")]
pub use fetch::{BoundedFetcher, fetch_url};
pub use fetch::{FetchConfig, FetchedText, Utf8StreamDecoder, fetch_file, fetch_stdin};
pub use formatters::{JsonConfig, JsonFormatter, TextConfig, TextFormatter, convert_to_json, convert_to_text};
pub use narrative::{NarrativeConfig, NarrativeSpan, NarrativeWindowExtractor, SpanSource, flatten};
pub use preprocess::{PreprocessConfig, preprocess_html};
pub use profiles::{ProfileLoader, ProfileLoaderBuilder};
pub use record::ExtractionResult;
pub use rows::{Profile, RowConfig, RowFieldAccumulator, RowState};
pub use tables::{TableFilterConfig, TableFragment, TableSelection, TableSetFilter, TableVerdict, extract_tables};
pub use tokenize::HtmlEvent;
