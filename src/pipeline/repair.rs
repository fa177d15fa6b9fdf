//! Character-level repair: punctuation folding, double-encoding defects, and
//! the strict ASCII rendition.
//!
//! Fragments that went through more than one lossy conversion tend to carry
//! the same accent twice (`a` + U+0301 + U+0301) or a doubled accented letter
//! (`nãão`). The repair pass folds those back. It never turns a valid
//! character into `?`; only [`to_ascii`] does that, for output targets that
//! cannot render anything else.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fixed typographic substitutions applied before display.
const PUNCTUATION: &[(char, &str)] = &[
    ('\u{2013}', "-"),   // en dash
    ('\u{2014}', "-"),   // em dash
    ('\u{2018}', "'"),   // left single quote
    ('\u{2019}', "'"),   // right single quote
    ('\u{201C}', "\""),  // left double quote
    ('\u{201D}', "\""),  // right double quote
    ('\u{2022}', "-"),   // bullet
    ('\u{2026}', "..."), // ellipsis
    ('\u{00A0}', " "),   // no-break space
];

/// Accented vowels whose doubling is a double-encoding artifact.
const ACCENTED_VOWELS: &str = "áàâãäéèêíìîóòôõúùûüÁÀÂÃÄÉÈÊÍÌÎÓÒÔÕÚÙÛÜ";

/// Zero-width and byte-order characters that never belong in output.
const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{2060}'];

/// Letters whose canonical decomposition does not end in an ASCII base.
const ASCII_FALLBACK: &[(char, &str)] = &[
    ('ç', "c"),
    ('Ç', "C"),
    ('ñ', "n"),
    ('Ñ', "N"),
    ('ß', "ss"),
    ('æ', "ae"),
    ('Æ', "AE"),
    ('œ', "oe"),
    ('Œ', "OE"),
    ('ø', "o"),
    ('Ø', "O"),
    ('đ', "d"),
    ('Đ', "D"),
    ('ł', "l"),
    ('Ł', "L"),
];

/// Apply the fixed punctuation substitutions.
pub fn fold_punctuation(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match PUNCTUATION.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Punctuation folding followed by the Unicode repair pass.
pub fn repair(input: &str) -> String {
    let folded = fold_punctuation(input);
    let recomposed = dedupe_combining_marks(&folded);
    collapse_doubled_letters(&recomposed)
}

/// Decompose, drop a combining mark identical to the one right before it,
/// recompose.
fn dedupe_combining_marks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_mark: Option<char> = None;
    for c in input.nfd() {
        if is_combining_mark(c) {
            if prev_mark == Some(c) {
                continue;
            }
            prev_mark = Some(c);
        } else {
            prev_mark = None;
        }
        out.push(c);
    }
    out.nfc().collect()
}

/// Collapse runs of the same accented vowel or `ç` (case-insensitive).
fn collapse_doubled_letters(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev: Option<char> = None;
    for c in input.chars() {
        if let Some(p) = prev {
            if is_doubling_candidate(c) && same_letter(p, c) {
                continue;
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn is_doubling_candidate(c: char) -> bool {
    c == 'ç' || c == 'Ç' || ACCENTED_VOWELS.contains(c)
}

fn same_letter(a: char, b: char) -> bool {
    a.to_lowercase().eq(b.to_lowercase())
}

/// Whether `c` belongs to the Unicode "Other" categories this engine
/// removes: controls (Cc), format characters (Cf) and private use (Co).
/// Surrogates (Cs) cannot occur in a Rust string.
pub fn is_other_category(c: char) -> bool {
    c.is_control() || is_format(c) || is_private_use(c)
}

fn is_format(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// Render `input` using printable ASCII plus newline and tab only.
///
/// Accented letters lose their marks, letters without a clean decomposition
/// go through a fixed table, and anything left becomes `?`. Other control
/// characters turn into spaces. Space runs are collapsed per line; tabs stay.
pub fn to_ascii(input: &str) -> String {
    let cleaned: String = input
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !INVISIBLE.contains(c))
        .collect();
    let folded = fold_punctuation(&cleaned).replace('\u{00B0}', "o");

    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        match c {
            '\n' | '\t' => out.push(c),
            c if c.is_control() => out.push(' '),
            c if c.is_ascii() => out.push(c),
            c => transliterate(c, &mut out),
        }
    }

    out.split('\n')
        .map(|line| {
            line.split(' ')
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn transliterate(c: char, out: &mut String) {
    if let Some((_, to)) = ASCII_FALLBACK.iter().find(|(from, _)| *from == c) {
        out.push_str(to);
        return;
    }
    let base: String = c.to_string().nfd().filter(|d| !is_combining_mark(*d)).collect();
    if !base.is_empty() && base.chars().all(|b| b.is_ascii() && !b.is_control()) {
        out.push_str(&base);
    } else {
        out.push('?');
    }
}
