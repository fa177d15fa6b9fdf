//! Text sanitizing: turn stripped markup into display text.
//!
//! Stripped fragments still carry debris from how they were stored: control
//! characters, leaked font tables, clipboard bookmarks, field instructions,
//! and sometimes an entire binary attachment rendered as hex. The passes
//! below remove that debris in a fixed order.
//!
//! ## Pass order
//!
//! 1. Drop control, format and private-use characters
//! 2. Legibility check; mostly-illegible text is mined for readable runs and
//!    returned early
//! 3. Remove leaked font-table artifacts, bookmarks and field labels
//! 4. Reduce `HYPERLINK` field instructions to their label
//! 5. Cut at the first leaked binary payload
//! 6. Punctuation folding and Unicode repair
//! 7. Whitespace collapse, then (3b) separator debris and repeated words
//!
//! The function is total: every input maps to an [`Extraction`].

use crate::config::ScrubConfig;
use crate::error::Degradation;
use crate::output::Extraction;
use crate::pipeline::repair;
use crate::pipeline::strip::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Separator placed between readable runs mined from noise.
const RUN_SEPARATOR: &str = " ... ";

/// Patterns whose repetition counts come from [`ScrubConfig`].
#[derive(Debug, Clone)]
pub struct TextPatterns {
    binary_tail: Regex,
    readable_run: Regex,
    printable_run: Regex,
}

impl TextPatterns {
    pub fn new(config: &ScrubConfig) -> Result<Self, regex::Error> {
        let hex = config.binary_hex_run;
        let run = config.min_readable_run;
        Ok(Self {
            binary_tail: Regex::new(&format!(r"504[bB]03|[0-9a-fA-F]{{{hex},}}"))?,
            readable_run: Regex::new(&format!(
                r"[A-Za-zÀ-ÖØ-öø-ÿ0-9\-',.;:()/&%\s]{{{run},}}"
            ))?,
            printable_run: Regex::new(&format!(r"[\x20-\x7E]{{{run},}}"))?,
        })
    }
}

/// Sanitize stripped text for display.
pub fn sanitize(text: &str, patterns: &TextPatterns, config: &ScrubConfig) -> Extraction<String> {
    let total = text.chars().count();
    let filtered = drop_other_category(text);
    if filtered.trim().is_empty() {
        return Extraction::Empty;
    }

    let legible = filtered.chars().filter(|&c| is_legible(c)).count();
    if (legible as f64) < config.legibility_ratio * total as f64 {
        if let Some(recovered) = recover_readable_runs(&filtered, patterns) {
            debug!("Text is {legible}/{total} legible; keeping readable runs only");
            let value = collapse_whitespace(&repair::repair(&recovered));
            if !value.is_empty() {
                return Extraction::Degraded {
                    value,
                    reasons: vec![Degradation::NoiseRecovered { legible, total }],
                };
            }
        }
    }

    let s = remove_artifacts(&filtered);
    let s = unwrap_hyperlinks(&s);
    let s = cut_binary_tail(&s, patterns);
    let s = repair::repair(s);
    let value = collapse_debris(&collapse_whitespace(&s));

    if value.is_empty() {
        Extraction::Empty
    } else {
        Extraction::Success { value }
    }
}

// ── Pass 1: character categories ────────────────────────────────────────────

/// Whitespace controls become spaces; every other Other-category character
/// is removed.
fn drop_other_category(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if repair::is_other_category(c) => None,
            c => Some(c),
        })
        .collect()
}

// ── Pass 2: legibility ──────────────────────────────────────────────────────

/// Printable in the display sense: no line/paragraph separators and no
/// exotic spaces.
fn is_legible(c: char) -> bool {
    c == ' ' || !(c.is_whitespace() || repair::is_other_category(c))
}

fn recover_readable_runs(input: &str, patterns: &TextPatterns) -> Option<String> {
    join_runs(&patterns.readable_run, input).or_else(|| join_runs(&patterns.printable_run, input))
}

fn join_runs(re: &Regex, input: &str) -> Option<String> {
    let parts: Vec<&str> = re
        .find_iter(input)
        .map(|m| m.as_str().trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(RUN_SEPARATOR))
    }
}

// ── Pass 3: leaked artifacts ────────────────────────────────────────────────

static RE_FONT_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Calibri;[^\n]{0,200}?Table Simple 1;?").unwrap());
static RE_FRAGMENT_BOOKMARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_dx_frag_(?:Start|End)Fragment").unwrap());
/// Form-field labels that leak into the text of task descriptions.
static RE_FIELD_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:DESCRICAO_TAREFA|DESCRICAOTAREFA|DESCRICAO)\b").unwrap());

fn remove_artifacts(input: &str) -> String {
    let s = RE_FONT_TABLE.replace_all(input, " ");
    let s = RE_FRAGMENT_BOOKMARK.replace_all(&s, " ");
    RE_FIELD_LABEL.replace_all(&s, " ").into_owned()
}

// ── Pass 3b: separator debris and repeated words ────────────────────────────

/// Two or more separator marks with nothing but spaces between them.
static RE_SEPARATOR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.;,:_\-](?: *[.;,:_\-])+").unwrap());

/// Runs on whitespace-collapsed text. Pure dot runs are ellipses and stay.
fn collapse_debris(input: &str) -> String {
    let s = RE_SEPARATOR_RUN.replace_all(input, |caps: &regex::Captures<'_>| {
        let run = &caps[0];
        if run.chars().all(|c| c == '.') {
            run.to_string()
        } else {
            " ".to_string()
        }
    });
    collapse_whitespace(&dedupe_adjacent_words(&collapse_whitespace(&s)))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `senha senha.` becomes `senha.`; comparison ignores case.
fn dedupe_adjacent_words(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for token in input.split(' ') {
        if let Some(prev) = out.last_mut() {
            let lead_len: usize = token
                .chars()
                .take_while(|&c| is_word_char(c))
                .map(char::len_utf8)
                .sum();
            let (lead, rest) = token.split_at(lead_len);
            if !lead.is_empty()
                && prev.chars().all(is_word_char)
                && prev.to_lowercase() == lead.to_lowercase()
            {
                prev.push_str(rest);
                continue;
            }
        }
        out.push(token.to_string());
    }
    out.join(" ")
}

// ── Pass 4: hyperlink fields ────────────────────────────────────────────────

static RE_HYPERLINK_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)HYPERLINK\s+"[^"]+"\s+"([^"]+)""#).unwrap());
static RE_HYPERLINK_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)HYPERLINK\s+"[^"]+"\s+([^\n\r]+)"#).unwrap());
static RE_HYPERLINK_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bHYPERLINK\b").unwrap());

fn unwrap_hyperlinks(input: &str) -> String {
    let s = RE_HYPERLINK_QUOTED.replace_all(input, "$1");
    let s = RE_HYPERLINK_BARE.replace_all(&s, "$1");
    RE_HYPERLINK_KEYWORD.replace_all(&s, " ").into_owned()
}

// ── Pass 5: binary tail ─────────────────────────────────────────────────────

fn cut_binary_tail<'a>(input: &'a str, patterns: &TextPatterns) -> &'a str {
    match patterns.binary_tail.find(input) {
        Some(m) => {
            debug!("Dropping {} bytes of leaked binary", input.len() - m.start());
            input[..m.start()].trim()
        }
        None => input,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
