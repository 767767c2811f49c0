//! Push-style HTML tag event source.
//!
//! [`parse`] turns markup into a lazy, forward-only sequence of
//! [`HtmlEvent`]s without building a tree. The scanner never fails: stray
//! `<` characters become text, unmatched end tags are dropped, a tag cut off
//! mid-way (as a byte-capped download produces) is discarded, and every
//! element still open at end of input receives a synthetic close.
//!
//! # Example
//!
//! ```rust
//! use fieldsift_core::tokenize::{HtmlEvent, parse};
//!
//! let events: Vec<HtmlEvent> = parse("<p>a<br>b</p>").collect();
//! assert_eq!(events.len(), 6);
//! assert!(matches!(&events[2], HtmlEvent::Open { tag, .. } if tag == "br"));
//! assert!(matches!(&events[3], HtmlEvent::Close { tag } if tag == "br"));
//! ```

use std::borrow::Cow;
use std::collections::VecDeque;

/// Elements that never have content and close themselves.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A structural event in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlEvent {
    /// An element opened. Tag and attribute names are lower-cased and
    /// attributes keep source order.
    Open { tag: String, attributes: Vec<(String, String)> },
    /// Text belonging to the innermost open element.
    Text { content: String },
    /// An element closed, explicitly or implicitly.
    Close { tag: String },
}

impl HtmlEvent {
    /// Looks up an attribute value on an `Open` event.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            HtmlEvent::Open { attributes, .. } => {
                attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
            }
            _ => None,
        }
    }
}

/// Starts tokenizing `html`. Re-invoke to restart.
pub fn parse(html: &str) -> TagEvents<'_> {
    TagEvents { src: html, pos: 0, open: Vec::new(), pending: VecDeque::new(), finished: false }
}

/// Iterator over the events of one document.
#[derive(Debug)]
pub struct TagEvents<'a> {
    src: &'a str,
    pos: usize,
    open: Vec<String>,
    pending: VecDeque<HtmlEvent>,
    finished: bool,
}

impl Iterator for TagEvents<'_> {
    type Item = HtmlEvent;

    fn next(&mut self) -> Option<HtmlEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            if self.pos >= self.src.len() {
                while let Some(tag) = self.open.pop() {
                    self.pending.push_back(HtmlEvent::Close { tag });
                }
                self.finished = true;
                continue;
            }

            let src = self.src;
            let rest = &src[self.pos..];
            if rest.starts_with('<') {
                self.scan_markup(rest);
            } else {
                self.scan_text(rest, 0);
            }
        }
    }
}

impl<'a> TagEvents<'a> {
    /// Handles input starting with `<`, queuing zero or more events.
    fn scan_markup(&mut self, rest: &'a str) {
        let bytes = rest.as_bytes();

        if rest.starts_with("<!--") {
            self.pos += rest[4..].find("-->").map_or(rest.len(), |i| i + 7);
            return;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
            return;
        }
        if rest.starts_with("</") {
            let name_len = tag_name_len(&rest[2..]);
            if name_len == 0 {
                self.scan_text(rest, 1);
                return;
            }
            let Some(end) = rest.find('>') else {
                self.pos = self.src.len();
                return;
            };
            let tag = rest[2..2 + name_len].to_ascii_lowercase();
            self.pos += end + 1;
            self.close_element(&tag);
            return;
        }
        if bytes.len() > 1 && bytes[1].is_ascii_alphabetic() {
            match scan_start_tag(rest) {
                Some(start) => {
                    self.pos += start.consumed;
                    self.open_element(start);
                }
                // An unbalanced quote swallowed the tag's `>`; keep the `<` as text.
                None if rest[1..].contains('>') => self.scan_text(rest, 1),
                None => self.pos = self.src.len(),
            }
            return;
        }

        self.scan_text(rest, 1);
    }

    /// Emits text up to the next `<` at or after `skip`.
    fn scan_text(&mut self, rest: &'a str, skip: usize) {
        let len = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
        self.pos += len;
        let content = unescape(&rest[..len]);
        if !content.is_empty() {
            self.pending.push_back(HtmlEvent::Text { content: content.into_owned() });
        }
    }

    fn open_element(&mut self, start: StartTag) {
        let StartTag { tag, attributes, self_closing, .. } = start;
        self.pending.push_back(HtmlEvent::Open { tag: tag.clone(), attributes });

        if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            self.pending.push_back(HtmlEvent::Close { tag });
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let src = self.src;
            let rest = &src[self.pos..];
            let end = find_ascii_case_insensitive(rest, &format!("</{tag}")).unwrap_or(rest.len());
            if end > 0 {
                self.pending.push_back(HtmlEvent::Text { content: rest[..end].to_string() });
            }
            self.pos += end;
        }
        self.open.push(tag);
    }

    /// Closes `tag` and anything opened inside it; unmatched closes are ignored.
    fn close_element(&mut self, tag: &str) {
        let Some(index) = self.open.iter().rposition(|t| t == tag) else {
            return;
        };
        while self.open.len() > index {
            if let Some(tag) = self.open.pop() {
                self.pending.push_back(HtmlEvent::Close { tag });
            }
        }
    }
}

struct StartTag {
    tag: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
    consumed: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b':' || b == b'_'
}

fn tag_name_len(s: &str) -> usize {
    s.bytes().take_while(|&b| is_name_byte(b)).count()
}

/// Parses `<name attr=value ...>`; `None` when the tag is cut off.
fn scan_start_tag(rest: &str) -> Option<StartTag> {
    let bytes = rest.as_bytes();
    let name_len = tag_name_len(&rest[1..]);
    let tag = rest[1..1 + name_len].to_ascii_lowercase();
    let mut i = 1 + name_len;
    let mut attributes = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(StartTag { tag, attributes, self_closing: false, consumed: i + 1 });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(StartTag { tag, attributes, self_closing: true, consumed: i + 2 });
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let name = rest[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            attributes.push((name, String::new()));
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let close = rest[i + 1..].find(*quote as char)?;
                let raw = &rest[i + 1..i + 1 + close];
                i += close + 2;
                raw
            }
            _ => {
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                &rest[start..i]
            }
        };
        attributes.push((name, unescape(value).into_owned()));
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Decodes `&amp; &lt; &gt; &quot; &#NN; &#xHH;`. Anything else is kept as written.
pub fn unescape(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_entity(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes one entity at the start of `s`, returning the char and bytes consumed.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let semi = s.find(';')?;
    if semi > 10 {
        return None;
    }
    let body = &s[1..semi];
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        _ => {
            let num = body.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, semi + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(tag: &str) -> HtmlEvent {
        HtmlEvent::Open { tag: tag.to_string(), attributes: Vec::new() }
    }

    fn close(tag: &str) -> HtmlEvent {
        HtmlEvent::Close { tag: tag.to_string() }
    }

    fn text(content: &str) -> HtmlEvent {
        HtmlEvent::Text { content: content.to_string() }
    }

    #[test]
    fn test_basic_sequence() {
        let events: Vec<_> = parse("<tr><td>身長</td></tr>").collect();
        assert_eq!(events, vec![open("tr"), open("td"), text("身長"), close("td"), close("tr")]);
    }

    #[test]
    fn test_void_element_gets_synthetic_close() {
        let events: Vec<_> = parse("A<br>B<BR/>C").collect();
        assert_eq!(
            events,
            vec![text("A"), open("br"), close("br"), text("B"), open("br"), close("br"), text("C")]
        );
    }

    #[test]
    fn test_self_closing_non_void() {
        let events: Vec<_> = parse("<div/>x").collect();
        assert_eq!(events, vec![open("div"), close("div"), text("x")]);
    }

    #[test]
    fn test_attributes_are_ordered_and_unescaped() {
        let events: Vec<_> = parse(r#"<a href="/p?a=1&amp;b=2" title='x &lt; y' data-x=plain checked>"#).collect();
        match &events[0] {
            HtmlEvent::Open { tag, attributes } => {
                assert_eq!(tag, "a");
                assert_eq!(
                    attributes,
                    &vec![
                        ("href".to_string(), "/p?a=1&b=2".to_string()),
                        ("title".to_string(), "x < y".to_string()),
                        ("data-x".to_string(), "plain".to_string()),
                        ("checked".to_string(), String::new()),
                    ]
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[0].attribute("data-x"), Some("plain"));
        assert_eq!(events[0].attribute("missing"), None);
    }

    #[test]
    fn test_unescape_subset() {
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&quot;q&quot;"), "\"q\"");
        assert_eq!(unescape("&#26408;&#x6728;"), "木木");
        assert_eq!(unescape("&nbsp;&copy;"), "&nbsp;&copy;");
        assert_eq!(unescape("AT&T"), "AT&T");
        assert!(matches!(unescape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unmatched_close_is_noop() {
        let events: Vec<_> = parse("</td>x</span>").collect();
        assert_eq!(events, vec![text("x")]);
    }

    #[test]
    fn test_open_elements_closed_at_end() {
        let events: Vec<_> = parse("<table><tr><td>A").collect();
        assert_eq!(
            events,
            vec![open("table"), open("tr"), open("td"), text("A"), close("td"), close("tr"), close("table")]
        );
    }

    #[test]
    fn test_close_pops_unclosed_children() {
        let events: Vec<_> = parse("<tr><td>A<td>B</tr>").collect();
        assert_eq!(
            events,
            vec![open("tr"), open("td"), text("A"), open("td"), text("B"), close("td"), close("td"), close("tr")]
        );
    }

    #[test]
    fn test_truncated_mid_tag() {
        let events: Vec<_> = parse("<tr><td>A</td><td class=\"va").collect();
        assert_eq!(events, vec![open("tr"), open("td"), text("A"), close("td"), close("tr")]);

        let events: Vec<_> = parse("<p>x</p").collect();
        assert_eq!(events, vec![open("p"), text("x"), close("p")]);
    }

    #[test]
    fn test_unclosed_quote_mid_document_keeps_scanning() {
        let events: Vec<_> = parse(r#"<tr><td class="a>身長</td><td>180cm</td></tr><tr><td>体重</td></tr>"#).collect();
        assert_eq!(
            events,
            vec![
                open("tr"),
                text(r#"<td class="a>身長"#),
                open("td"),
                text("180cm"),
                close("td"),
                close("tr"),
                open("tr"),
                open("td"),
                text("体重"),
                close("td"),
                close("tr"),
            ]
        );
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let events: Vec<_> = parse("<p>1 < 2</p>").collect();
        assert_eq!(events, vec![open("p"), text("1 "), text("< 2"), close("p")]);
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let events: Vec<_> = parse("<!DOCTYPE html><!-- <td>no</td> --><b>y</b><!-- open").collect();
        assert_eq!(events, vec![open("b"), text("y"), close("b")]);
    }

    #[test]
    fn test_script_content_is_raw() {
        let events: Vec<_> = parse("<script>if (a < b) { x = '</p>'; }</SCRIPT><p>z</p>").collect();
        assert_eq!(events[0], open("script"));
        assert_eq!(events[1], text("if (a < b) { x = '</p>'; }"));
        assert_eq!(events[2], close("script"));
        assert!(events.contains(&text("z")));
    }

    #[test]
    fn test_restart_yields_same_events() {
        let html = "<tr><td>a</td><td>b<br>c</td></tr>";
        let first: Vec<_> = parse(html).collect();
        let second: Vec<_> = parse(html).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("").count(), 0);
    }
}
