//! Input resolution: turn a raw fragment into text, and decide whether it is
//! markup at all.
//!
//! Fragments arrive from storage as bytes or text, frequently with the wrong
//! or a mixed encoding. Byte input is tried as UTF-8 first and falls back to
//! Latin-1, which maps every byte to a code point and therefore cannot fail.
//!
//! The image locator needs a different view of the same input: one where
//! every character stands for exactly one byte, so binary payloads survive
//! the trip through text. [`byte_view`] provides that.

use std::borrow::Cow;
use tracing::debug;

/// Literal token every markup document starts with.
pub const MARKUP_START: &str = "{\\rtf";

/// A document fragment as supplied by the caller. Borrowed, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fragment<'a> {
    /// No value (a NULL column, a missing field).
    #[default]
    Absent,
    /// Raw bytes of unknown encoding.
    Bytes(&'a [u8]),
    /// Already-decoded text.
    Text(&'a str),
}

impl Fragment<'_> {
    /// Size of the fragment in bytes.
    pub fn len(&self) -> usize {
        match self {
            Fragment::Absent => 0,
            Fragment::Bytes(b) => b.len(),
            Fragment::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a str> for Fragment<'a> {
    fn from(s: &'a str) -> Self {
        Fragment::Text(s)
    }
}

impl<'a> From<&'a String> for Fragment<'a> {
    fn from(s: &'a String) -> Self {
        Fragment::Text(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for Fragment<'a> {
    fn from(b: &'a [u8]) -> Self {
        Fragment::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for Fragment<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        Fragment::Bytes(b.as_slice())
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Fragment<'a> {
    fn from(b: &'a [u8; N]) -> Self {
        Fragment::Bytes(b.as_slice())
    }
}

impl<'a, T: Into<Fragment<'a>>> From<Option<T>> for Fragment<'a> {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Fragment::Absent)
    }
}

/// A fragment resolved to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Absent, empty, or whitespace only.
    Empty,
    /// Not markup; trimmed and otherwise untouched.
    Plain(String),
    /// Starts with [`MARKUP_START`]; trimmed.
    Markup(String),
}

impl Normalized {
    pub fn text(&self) -> &str {
        match self {
            Normalized::Empty => "",
            Normalized::Plain(s) | Normalized::Markup(s) => s,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Normalized::Markup(_))
    }
}

/// Resolve a fragment to text and classify it.
pub fn normalize(fragment: Fragment<'_>) -> Normalized {
    match fragment {
        Fragment::Absent => Normalized::Empty,
        Fragment::Bytes(b) => classify(&decode_bytes(b)),
        Fragment::Text(t) => classify(t),
    }
}

/// Classify already-decoded text.
pub fn classify(text: &str) -> Normalized {
    let trimmed = text.trim_start_matches('\u{FEFF}').trim();
    if trimmed.is_empty() {
        Normalized::Empty
    } else if is_markup(trimmed) {
        Normalized::Markup(trimmed.to_string())
    } else {
        Normalized::Plain(trimmed.to_string())
    }
}

/// Whether trimmed text opens with the markup start token.
pub fn is_markup(text: &str) -> bool {
    text.starts_with(MARKUP_START)
}

/// Decode bytes as UTF-8, falling back to Latin-1.
pub fn decode_bytes(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            debug!(
                "Fragment is not UTF-8 (invalid at byte {}), decoding as Latin-1",
                e.valid_up_to()
            );
            Cow::Owned(latin1(bytes))
        }
    }
}

/// Latin-1 decode: each byte becomes the code point of the same value.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Byte-faithful view of a fragment for payload scanning.
///
/// Bytes are used as-is. Text whose code points all fit in one byte maps
/// each code point back to that byte, which undoes a Latin-1 decode done
/// upstream. Any other text is viewed as its UTF-8 encoding.
pub fn byte_view<'a>(fragment: Fragment<'a>) -> Cow<'a, [u8]> {
    match fragment {
        Fragment::Absent => Cow::Borrowed(&[]),
        Fragment::Bytes(b) => Cow::Borrowed(b),
        Fragment::Text(t) if t.is_ascii() => Cow::Borrowed(t.as_bytes()),
        Fragment::Text(t) => {
            if t.chars().all(|c| u32::from(c) <= 0xFF) {
                Cow::Owned(t.chars().map(|c| u32::from(c) as u8).collect())
            } else {
                Cow::Borrowed(t.as_bytes())
            }
        }
    }
}

/// Longest prefix of `text` that fits in `limit` bytes without splitting a
/// character.
/// Whether the byte at `i` is preceded by an odd number of backslashes.
pub(crate) fn is_escaped(bytes: &[u8], i: usize) -> bool {
    bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

pub fn truncate_to_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
