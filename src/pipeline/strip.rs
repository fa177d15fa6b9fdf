//! Markup stripping: control words and escapes → plain text.
//!
//! ## Stage order
//!
//! The precise stripper runs six passes, and the order is load-bearing:
//! byte escapes and Unicode escapes must be resolved before control words
//! are removed, otherwise `\u233` would be eaten as the control word `\u`
//! and `\'e1` as a stray escape.
//!
//! 1. `\'hh` hex byte escapes → Latin-1 character
//! 2. `\uN` decimal Unicode escapes → character (negative N wraps by 65536)
//! 3. Control words (`\par`, `\fs20`, `\b0 `) → space
//! 4. Remaining control symbols (`\~`, `\{`, `\*`) → space
//! 5. Group braces → space, enclosed text kept
//! 6. Whitespace runs → one space, trimmed
//!
//! When the precise path refuses a document, a simplified two-step strip
//! runs instead, and if even that yields nothing the input comes back
//! untouched. Each path is tagged on the returned [`Extraction`].

use crate::config::ScrubConfig;
use crate::error::Degradation;
use crate::output::Extraction;
use crate::pipeline::decode;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons the precise stripper refuses a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StripError {
    #[error("group nesting depth {depth} exceeds limit {limit}")]
    NestingTooDeep { depth: usize, limit: usize },
}

/// Strip markup from `text`.
///
/// Non-markup input is returned trimmed and otherwise unchanged. Never
/// fails; fallbacks are reported through [`Extraction::Degraded`].
pub fn strip(text: &str, config: &ScrubConfig) -> Extraction<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Extraction::Empty;
    }
    if !decode::is_markup(trimmed) {
        return Extraction::Success {
            value: trimmed.to_string(),
        };
    }

    match strip_precise(trimmed, config.max_group_depth) {
        Ok(plain) if plain.is_empty() => Extraction::Empty,
        Ok(plain) => Extraction::Success { value: plain },
        Err(e) => {
            warn!("Precise markup strip failed ({e}); using simplified rules");
            let cause = Degradation::SimplifiedStrip {
                cause: e.to_string(),
            };
            let simple = strip_simplified(trimmed);
            if simple.is_empty() {
                debug!("Simplified strip produced no text; passing input through");
                Extraction::Degraded {
                    value: trimmed.to_string(),
                    reasons: vec![cause, Degradation::PassThrough],
                }
            } else {
                Extraction::Degraded {
                    value: simple,
                    reasons: vec![cause],
                }
            }
        }
    }
}

fn strip_precise(text: &str, depth_limit: usize) -> Result<String, StripError> {
    let depth = max_group_depth(text);
    if depth > depth_limit {
        return Err(StripError::NestingTooDeep {
            depth,
            limit: depth_limit,
        });
    }

    let s = decode_hex_escapes(text);
    let s = decode_unicode_escapes(&s);
    let s = remove_control_words(&s);
    let s = remove_control_symbols(&s);
    let s = remove_braces(&s);
    Ok(collapse_whitespace(&s))
}

/// Deepest unescaped brace nesting in `text`.
fn max_group_depth(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut max = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        let escaped = decode::is_escaped(bytes, i);
        match b {
            b'{' if !escaped => {
                depth += 1;
                max = max.max(depth);
            }
            b'}' if !escaped => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

// ── Stage 1: hex byte escapes ───────────────────────────────────────────────

static RE_HEX_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\'([0-9a-fA-F]{2})").unwrap());

fn decode_hex_escapes(input: &str) -> String {
    RE_HEX_ESCAPE
        .replace_all(input, |caps: &Captures<'_>| {
            u8::from_str_radix(&caps[1], 16)
                .map(|b| char::from(b).to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

// ── Stage 2: decimal Unicode escapes ────────────────────────────────────────

static RE_UNICODE_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\u(-?[0-9]+)").unwrap());

fn decode_unicode_escapes(input: &str) -> String {
    RE_UNICODE_ESCAPE
        .replace_all(input, |caps: &Captures<'_>| {
            caps[1]
                .parse::<i64>()
                .ok()
                .map(|n| if n < 0 { n + 65536 } else { n })
                .and_then(|n| u32::try_from(n).ok())
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned()
}

// ── Stage 3: control words ──────────────────────────────────────────────────

static RE_CONTROL_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+-?[0-9]*\s?").unwrap());

fn remove_control_words(input: &str) -> String {
    RE_CONTROL_WORD.replace_all(input, " ").into_owned()
}

// ── Stage 4: control symbols ────────────────────────────────────────────────

static RE_CONTROL_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[^a-zA-Z0-9]").unwrap());

fn remove_control_symbols(input: &str) -> String {
    RE_CONTROL_SYMBOL.replace_all(input, " ").into_owned()
}

// ── Stage 5: group delimiters ───────────────────────────────────────────────

fn remove_braces(input: &str) -> String {
    input.replace(['{', '}'], " ")
}

// ── Stage 6: whitespace ─────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub(crate) fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

// ── Simplified fallback ─────────────────────────────────────────────────────

static RE_SIMPLE_CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z0-9]+\s*").unwrap());
static RE_BRACE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").unwrap());

/// Remove control words, then whole brace groups with their contents.
fn strip_simplified(input: &str) -> String {
    let s = RE_SIMPLE_CONTROL.replace_all(input, " ");
    let s = RE_BRACE_GROUP.replace_all(&s, " ");
    collapse_whitespace(&s)
}

// ── Tests ────────────────────────────────────────────────────────────────────
