//! MT940 tag extraction and rewriting.
//!
//! Only the two fields taking part in the transformation are understood here:
//! the `:61:` statement line, whose first six characters hold the transaction
//! date, and the `:20:` transaction reference, which gets replaced. No other
//! MT940 structure is validated.
//!
//! The two tags are matched by different rules (see [`FieldRule`]). Both rules
//! look at the first matching line only; repeated tags further down the file
//! are ignored.

use crate::error::Result;
use crate::types::TransactionDate;
use std::borrow::Cow;
use std::ops::Range;

/// How the value of a tag is located relative to its `:<label>:` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Value is the rest of the marker line and must be followed by a line break.
    /// A bare marker line takes its value from the next line instead.
    StatementLine,
    /// Value is the non-empty rest of the marker line, up to `\r` or `\n`.
    Inline,
}

/// A tag label together with the rule used to find its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub label: &'static str,
    pub rule: FieldRule,
}

impl Tag {
    /// `:61:` statement line, source of the transaction date.
    pub const STATEMENT_LINE: Tag = Tag::new("61", FieldRule::StatementLine);

    /// `:20:` transaction reference number, the rewritten header field.
    pub const REFERENCE: Tag = Tag::new("20", FieldRule::Inline);

    pub const fn new(label: &'static str, rule: FieldRule) -> Self {
        Self { label, rule }
    }

    fn marker(&self) -> String {
        format!(":{}:", self.label)
    }
}

/// A line with its byte offset, without the line break.
struct Line<'a> {
    start: usize,
    body: &'a [u8],
    terminated: bool,
}

fn scan_lines(bytes: &[u8]) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    bytes.split_inclusive(|&b| b == b'\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let terminated = raw.ends_with(b"\n");
        let body = raw.strip_suffix(b"\n").unwrap_or(raw);
        let body = body.strip_suffix(b"\r").unwrap_or(body);
        Line { start, body, terminated }
    })
}

/// Byte range of the value of `tag` within `bytes`, if present.
///
/// Markers and line breaks are ASCII, so the statement does not need to be
/// valid UTF-8. When it is, the range falls on character boundaries.
pub fn locate(bytes: &[u8], tag: &Tag) -> Option<Range<usize>> {
    let marker = tag.marker();
    let marker = marker.as_bytes();
    let mut lines = scan_lines(bytes);

    match tag.rule {
        FieldRule::Inline => lines.find_map(|line| {
            let rest = line.body.strip_prefix(marker)?;
            if rest.is_empty() {
                return None;
            }
            let start = line.start + marker.len();
            Some(start..start + rest.len())
        }),
        FieldRule::StatementLine => {
            let line = lines.find(|line| line.body.starts_with(marker))?;
            let rest = &line.body[marker.len()..];
            if rest.is_empty() {
                // Bare marker: the value sits on the following line.
                let next = lines.next()?;
                Some(next.start..next.start + next.body.len())
            } else if line.terminated {
                let start = line.start + marker.len();
                Some(start..start + rest.len())
            } else {
                None
            }
        }
    }
}

/// Extract the value of `tag` from `text`.
///
/// Returns `None` when the tag is absent or has no value under its rule.
///
/// # Examples
///
/// ```
/// use ypbank_watcher::mt940_format::{extract, Tag};
///
/// let text = ":20:MT940/\n:61:250101C1000,\n";
/// assert_eq!(extract(text, &Tag::STATEMENT_LINE), Some("250101C1000,"));
/// assert_eq!(extract(text, &Tag::REFERENCE), Some("MT940/"));
/// ```
pub fn extract<'a>(text: &'a str, tag: &Tag) -> Option<&'a str> {
    locate(text.as_bytes(), tag).map(|range| &text[range])
}

/// Byte-level [`extract`] for statements in any ASCII-compatible encoding.
pub fn extract_bytes<'a>(bytes: &'a [u8], tag: &Tag) -> Option<&'a [u8]> {
    locate(bytes, tag).map(|range| &bytes[range])
}

/// Replace the value of `tag` with `new_value`, leaving every other byte untouched.
///
/// When the tag is absent the input is returned as is.
pub fn rewrite<'a>(text: &'a str, tag: &Tag, new_value: &str) -> Cow<'a, str> {
    match locate(text.as_bytes(), tag) {
        Some(range) => {
            let mut out = String::with_capacity(text.len() - range.len() + new_value.len());
            out.push_str(&text[..range.start]);
            out.push_str(new_value);
            out.push_str(&text[range.end..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// Byte-level [`rewrite`]; bytes outside the replaced value are copied verbatim.
pub fn rewrite_bytes<'a>(bytes: &'a [u8], tag: &Tag, new_value: &[u8]) -> Cow<'a, [u8]> {
    match locate(bytes, tag) {
        Some(range) => {
            let mut out = Vec::with_capacity(bytes.len() - range.len() + new_value.len());
            out.extend_from_slice(&bytes[..range.start]);
            out.extend_from_slice(new_value);
            out.extend_from_slice(&bytes[range.end..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(bytes),
    }
}

/// Reformat the leading `YYMMDD` of a statement line value as `YYYYMMDD`.
///
/// Characters after the first six are ignored.
pub fn reformat_date(value: &str) -> Result<String> {
    let prefix = match value.char_indices().nth(6) {
        Some((end, _)) => &value[..end],
        None => value,
    };
    let date = prefix.parse::<TransactionDate>()?;
    Ok(date.to_string())
}

/// Replacement value for the reference field: `<label>:<YYYYMMDD>`.
pub fn reference_value(date: &str) -> String {
    format!("{}:{}", Tag::REFERENCE.label, date)
}
