//! Bounded content fetching from URLs, files, and stdin.
//!
//! [`BoundedFetcher`] downloads a page under a hard deadline and a hard
//! byte ceiling. The body is decoded incrementally; when the ceiling is hit
//! the transfer is dropped and the text read so far is returned with
//! [`FetchedText::truncated`] set. That is a successful result: callers get
//! valid but possibly unterminated HTML, which every extractor in this crate
//! tolerates.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{FieldsiftError, Result};

#[cfg(feature = "fetch")]
use futures_util::StreamExt;
#[cfg(feature = "fetch")]
use reqwest::Client;
#[cfg(feature = "fetch")]
use std::time::Duration;
#[cfg(feature = "fetch")]
use url::Url;

/// Limits and headers for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Deadline for the whole request, headers and body, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of body bytes read before the transfer is cut.
    pub max_bytes: usize,
    /// User-Agent header.
    pub user_agent: String,
    /// Extra request headers, in order.
    pub headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_bytes: 2 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            headers: Vec::new(),
        }
    }
}

/// Text of a fetched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedText {
    pub text: String,
    /// Body bytes consumed (never more than the configured ceiling).
    pub bytes_read: usize,
    /// Whether the byte ceiling cut the transfer short.
    pub truncated: bool,
    /// URL after redirects.
    pub final_url: String,
}

/// Incremental UTF-8 decoder that carries split sequences across chunks.
///
/// Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` into `out`, holding back an incomplete trailing sequence.
    pub fn push(&mut self, chunk: &[u8], out: &mut String) {
        let mut owned;
        let mut input: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            owned = std::mem::take(&mut self.pending);
            owned.extend_from_slice(chunk);
            &owned
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Bytes waiting for the rest of their sequence.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes at end of stream; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
}

/// HTTP fetcher with a deadline and a byte ceiling.
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    client: Client,
    config: FetchConfig,
}

#[cfg(feature = "fetch")]
impl BoundedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self { client, config })
    }

    /// Uses an existing client; the configured User-Agent is still sent per request.
    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches `url` once. No retries.
    pub async fn fetch(&self, url: &str) -> Result<FetchedText> {
        let parsed = Url::parse(url).map_err(|e| FieldsiftError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FieldsiftError::InvalidUrl(format!(
                "unsupported scheme '{}', expected http or https",
                parsed.scheme()
            )));
        }

        let timeout_ms = self.config.timeout_ms;
        tracing::debug!(url = %parsed, timeout_ms, max_bytes = self.config.max_bytes, "fetching");

        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.fetch_bounded(parsed)).await {
            Ok(result) => result,
            Err(_) => Err(FieldsiftError::Timeout { timeout_ms }),
        }
    }

    async fn fetch_bounded(&self, url: Url) -> Result<FetchedText> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            );
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FieldsiftError::UpstreamError { status: status.as_u16() });
        }

        let final_url = response.url().to_string();
        let max_bytes = self.config.max_bytes;
        let mut stream = response.bytes_stream();
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        let mut bytes_read = 0usize;
        let mut truncated = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_error(e))?;
            let remaining = max_bytes.saturating_sub(bytes_read);
            if chunk.len() > remaining {
                decoder.push(&chunk[..remaining], &mut text);
                bytes_read += remaining;
                truncated = true;
                tracing::debug!(bytes_read, max_bytes, "byte cap reached, dropping transfer");
                break;
            }
            decoder.push(&chunk, &mut text);
            bytes_read += chunk.len();
        }

        // A cut transfer keeps only whole characters.
        if !truncated {
            decoder.finish(&mut text);
        }

        Ok(FetchedText { text, bytes_read, truncated, final_url })
    }

    fn map_error(&self, err: reqwest::Error) -> FieldsiftError {
        if err.is_timeout() {
            FieldsiftError::Timeout { timeout_ms: self.config.timeout_ms }
        } else {
            FieldsiftError::Http(err)
        }
    }
}

/// Fetches `url` with a one-off [`BoundedFetcher`].
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<FetchedText> {
    BoundedFetcher::new(config.clone())?.fetch(url).await
}

/// Reads HTML content from a local file.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(FieldsiftError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(FieldsiftError::from)
    }
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_bytes, 2 * 1024 * 1024);
        assert!(config.user_agent.contains("Mozilla"));
    }

    #[test]
    fn test_fetch_config_partial_json() {
        let config: FetchConfig = serde_json::from_str(r#"{"max_bytes": 10, "headers": [["Referer", "x"]]}"#).unwrap();
        assert_eq!(config.max_bytes, 10);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.headers, vec![("Referer".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_decoder_split_at_every_offset() {
        let source = "日本 野球 ⚾ abc";
        let bytes = source.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut out = String::new();
            decoder.push(&bytes[..split], &mut out);
            decoder.push(&bytes[split..], &mut out);
            decoder.finish(&mut out);
            assert_eq!(out, source, "split at {}", split);
        }
    }

    #[test]
    fn test_decoder_byte_by_byte() {
        let source = "佐藤龍月";
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in source.as_bytes() {
            decoder.push(std::slice::from_ref(b), &mut out);
        }
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(out, source);
    }

    #[test]
    fn test_decoder_invalid_and_dangling() {
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        decoder.push(b"a\xffb\xe6\x97", &mut out);
        assert_eq!(out, "a\u{FFFD}b");
        assert_eq!(decoder.pending_len(), 2);
        decoder.finish(&mut out);
        assert_eq!(out, "a\u{FFFD}b\u{FFFD}");
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/file.html");
        assert!(matches!(result, Err(FieldsiftError::FileNotFound(_))));
    }

    #[test]
    fn test_fetch_file_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<tr><td>a</td></tr>").unwrap();
        assert_eq!(fetch_file(path.to_str().unwrap()).unwrap(), "<tr><td>a</td></tr>");
    }

    #[cfg(feature = "fetch")]
    mod network {
        use std::time::Duration;

        use crate::FieldsiftError;
        use crate::fetch::{BoundedFetcher, FetchConfig};
        use reqwest::Client;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serves one canned HTTP response on a loopback port.
        async fn serve_once(response: Vec<u8>, delay: Option<Duration>) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
            format!("http://{}/player/1", addr)
        }

        fn ok_response(body: &[u8]) -> Vec<u8> {
            let mut response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .into_bytes();
            response.extend_from_slice(body);
            response
        }

        fn fetcher(config: FetchConfig) -> BoundedFetcher {
            let client = Client::builder().no_proxy().build().unwrap();
            BoundedFetcher::with_client(client, config)
        }

        #[tokio::test]
        async fn test_fetch_complete_body() {
            let body = "<tr><td>身長</td><td>180cm</td></tr>";
            let url = serve_once(ok_response(body.as_bytes()), None).await;
            let fetched = fetcher(FetchConfig::default()).fetch(&url).await.unwrap();
            assert_eq!(fetched.text, body);
            assert!(!fetched.truncated);
            assert_eq!(fetched.bytes_read, body.len());
        }

        #[tokio::test]
        async fn test_byte_cap_returns_partial_text() {
            let body = "あ".repeat(20_000);
            let url = serve_once(ok_response(body.as_bytes()), None).await;
            let config = FetchConfig { max_bytes: 1000, ..Default::default() };
            let fetched = fetcher(config).fetch(&url).await.unwrap();
            assert!(fetched.truncated);
            assert_eq!(fetched.bytes_read, 1000);
            assert_eq!(fetched.text.chars().count(), 333);
            assert!(fetched.text.chars().all(|c| c == 'あ'));
        }

        #[tokio::test]
        async fn test_upstream_error_status() {
            let response = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
            let url = serve_once(response, None).await;
            let result = fetcher(FetchConfig::default()).fetch(&url).await;
            assert!(matches!(result, Err(FieldsiftError::UpstreamError { status: 404 })));
        }

        #[tokio::test]
        async fn test_timeout() {
            let url = serve_once(ok_response(b"late"), Some(Duration::from_secs(3))).await;
            let config = FetchConfig { timeout_ms: 150, ..Default::default() };
            let result = fetcher(config).fetch(&url).await;
            assert!(matches!(result, Err(FieldsiftError::Timeout { timeout_ms: 150 })));
        }

        #[tokio::test]
        async fn test_invalid_url() {
            let result = fetcher(FetchConfig::default()).fetch("not-a-url").await;
            assert!(matches!(result, Err(FieldsiftError::InvalidUrl(_))));

            let result = fetcher(FetchConfig::default()).fetch("ftp://example.com/x").await;
            assert!(matches!(result, Err(FieldsiftError::InvalidUrl(_))));
        }
    }
}
