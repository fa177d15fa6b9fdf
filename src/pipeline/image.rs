//! Embedded picture recovery.
//!
//! Pictures live in `{\pict ...}` groups, but the payload encoding varies
//! with whatever wrote the document: raw bytes after `\binN`, a hex dump
//! wrapped at arbitrary line lengths, hex pairs separated by spaces, or a
//! list of decimal byte values. Some fragments lost their group structure
//! entirely and only the payload survived.
//!
//! [`locate`] tries each encoding inside every picture group first, then
//! falls back to document-wide scans with stricter thresholds. Every
//! candidate is decoded and accepted only if it starts with a PNG or JPEG
//! signature; malformed candidates are skipped, never reported.
//!
//! All scanning happens on the byte-faithful view from
//! [`decode::byte_view`], so offsets are byte offsets into that view.

use crate::config::ScrubConfig;
use crate::output::{ExtractedImage, ImageMatch, ImageStrategy};
use crate::pipeline::decode::{self, is_escaped, Fragment};
use once_cell::sync::Lazy;
use regex::bytes::{Match, Regex};
use tracing::{debug, warn};

static RE_PICT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i-u)\\pict\b").unwrap());
static RE_BIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\\bin([0-9]+)").unwrap());
static RE_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i-u)89504E47|FFD8FF").unwrap());
static RE_DECIMAL_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)[0-9]{1,3}").unwrap());

/// Fewest raw bytes accepted after `\binN`.
const MIN_BINARY_BYTES: usize = 4;

/// Candidate patterns whose repetition counts come from [`ScrubConfig`].
#[derive(Debug, Clone)]
pub struct ImagePatterns {
    hex_run: Regex,
    spaced_hex: Regex,
    decimal: Regex,
    document_hex_run: Regex,
    document_decimal: Regex,
}

impl ImagePatterns {
    pub fn new(config: &ScrubConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            hex_run: hex_run(config.min_hex_run)?,
            spaced_hex: Regex::new(&format!(
                r"(?-u)(?:[0-9A-Fa-f]{{2}}\s+){{{},}}[0-9A-Fa-f]{{2}}",
                config.min_spaced_hex_pairs
            ))?,
            decimal: decimal_run(config.min_decimal_values)?,
            document_hex_run: hex_run(config.document_hex_run)?,
            document_decimal: decimal_run(config.document_decimal_values)?,
        })
    }
}

fn hex_run(min: usize) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?-u)[0-9A-Fa-f]{{{min},}}"))
}

fn decimal_run(min: usize) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?-u)(?:[0-9]{{1,3}}[\s,]+){{{min},}}[0-9]{{1,3}}"))
}

/// Find the first embedded picture in `fragment`.
///
/// Fragments larger than [`ScrubConfig::max_input_bytes`] are not scanned.
pub fn locate(
    fragment: Fragment<'_>,
    patterns: &ImagePatterns,
    config: &ScrubConfig,
) -> Option<ImageMatch> {
    if fragment.len() > config.max_input_bytes {
        warn!(
            "Fragment of {} bytes exceeds limit of {}; skipping image scan",
            fragment.len(),
            config.max_input_bytes
        );
        return None;
    }
    let view = decode::byte_view(fragment);
    let found = locate_in(&view, patterns, config);
    if let Some(m) = &found {
        debug!(
            "Found {} ({} bytes) via {:?} at offset {}",
            m.image.mime(),
            m.image.len(),
            m.strategy,
            m.offset
        );
    }
    found
}

/// Convenience wrapper returning only the image.
pub fn extract(
    fragment: Fragment<'_>,
    patterns: &ImagePatterns,
    config: &ScrubConfig,
) -> Option<ExtractedImage> {
    locate(fragment, patterns, config).map(|m| m.image)
}

fn locate_in(view: &[u8], patterns: &ImagePatterns, config: &ScrubConfig) -> Option<ImageMatch> {
    if view.is_empty() {
        return None;
    }

    for pict in RE_PICT.find_iter(view) {
        let (start, end) = enclosing_group(view, pict.start());
        if let Some(found) = scan_group(view, start, end, patterns) {
            return Some(found);
        }
    }

    document_scan(view, patterns).or_else(|| signature_scan(view, config.min_signature_hex))
}

// ── Group boundaries ────────────────────────────────────────────────────────

/// `(start, end)` of the group containing `pos`; `end` is exclusive.
///
/// Without an opening brace the group starts at `pos`. Without a closing
/// brace it runs to the end of input.
fn enclosing_group(view: &[u8], pos: usize) -> (usize, usize) {
    let start = find_open_brace(view, pos).unwrap_or(pos);
    (start, find_group_end(view, start))
}

fn find_open_brace(view: &[u8], pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..pos).rev() {
        match view[i] {
            b'}' if !is_escaped(view, i) => depth += 1,
            b'{' if !is_escaped(view, i) => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

fn find_group_end(view: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < view.len() {
        match view[i] {
            b'\\' => {
                if let Some((payload, len)) = binary_payload(view, i) {
                    i = payload.saturating_add(len).min(view.len());
                    continue;
                }
                // control symbol or escaped brace: skip the next byte too
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    view.len()
}

/// If a `\binN` control word starts at `i`, the offset of its payload and N.
fn binary_payload(view: &[u8], i: usize) -> Option<(usize, usize)> {
    let rest = view.get(i + 1..)?;
    let digits = rest.strip_prefix(b"bin")?;
    let n_digits = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if n_digits == 0 {
        return None;
    }
    let n: usize = std::str::from_utf8(&digits[..n_digits]).ok()?.parse().ok()?;
    Some((skip_separators(view, i + 4 + n_digits), n))
}

fn skip_separators(view: &[u8], mut i: usize) -> usize {
    while i < view.len() && matches!(view[i], b' ' | b'\r' | b'\n' | b'\t') {
        i += 1;
    }
    i
}

// ── Strategies inside a picture group ───────────────────────────────────────

fn scan_group(
    view: &[u8],
    start: usize,
    end: usize,
    patterns: &ImagePatterns,
) -> Option<ImageMatch> {
    let group = &view[start..end];
    let found = |image, strategy, offset| ImageMatch {
        image,
        strategy,
        offset,
    };

    for caps in RE_BIN.captures_iter(group) {
        let Some(n) = caps
            .get(1)
            .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        let Some(whole) = caps.get(0) else { continue };
        let payload = skip_separators(view, start + whole.end());
        let stop = payload.saturating_add(n).min(view.len());
        let bytes = &view[payload..stop];
        if bytes.len() < MIN_BINARY_BYTES {
            continue;
        }
        if let Some(image) = ExtractedImage::from_bytes(bytes.to_vec()) {
            return Some(found(image, ImageStrategy::BinaryBlock, payload));
        }
    }

    for m in patterns.hex_run.find_iter(group) {
        if let Some(image) = decode_hex_run(group, m) {
            return Some(found(image, ImageStrategy::HexRun, start + m.start()));
        }
    }

    for m in patterns.spaced_hex.find_iter(group) {
        if let Some(image) = decode_spaced_hex(m.as_bytes()) {
            return Some(found(image, ImageStrategy::SpacedHex, start + m.start()));
        }
    }

    for m in patterns.decimal.find_iter(group) {
        if let Some(image) = decode_decimal(m.as_bytes()) {
            return Some(found(image, ImageStrategy::DecimalBytes, start + m.start()));
        }
    }

    None
}

// ── Whole-document fallbacks ────────────────────────────────────────────────

fn document_scan(view: &[u8], patterns: &ImagePatterns) -> Option<ImageMatch> {
    for m in patterns.document_hex_run.find_iter(view) {
        if let Some(image) = decode_hex_run(view, m) {
            return Some(ImageMatch {
                image,
                strategy: ImageStrategy::DocumentHexRun,
                offset: m.start(),
            });
        }
    }
    for m in patterns.document_decimal.find_iter(view) {
        if let Some(image) = decode_decimal(m.as_bytes()) {
            return Some(ImageMatch {
                image,
                strategy: ImageStrategy::DocumentDecimal,
                offset: m.start(),
            });
        }
    }
    None
}

fn signature_scan(view: &[u8], min_hex: usize) -> Option<ImageMatch> {
    let sig = RE_SIGNATURE.find(view)?;
    let digits: Vec<u8> = view[sig.start()..]
        .iter()
        .take_while(|b| b.is_ascii_hexdigit() || b.is_ascii_whitespace())
        .filter(|b| b.is_ascii_hexdigit())
        .copied()
        .collect();
    if digits.len() < min_hex || digits.len() % 2 != 0 {
        debug!(
            "Signature at offset {} has {} hex digits; rejected",
            sig.start(),
            digits.len()
        );
        return None;
    }
    let image = ExtractedImage::from_bytes(hex::decode(&digits).ok()?)?;
    Some(ImageMatch {
        image,
        strategy: ImageStrategy::SignatureScan,
        offset: sig.start(),
    })
}

// ── Candidate decoding ──────────────────────────────────────────────────────

/// Decode a hex run, preferring the run extended across line wraps.
fn decode_hex_run(haystack: &[u8], m: Match<'_>) -> Option<ExtractedImage> {
    let run = m.as_bytes();
    let extended = extend_across_lines(haystack, m.end(), run);
    if extended.len() > run.len() {
        if let Some(image) = decode_hex(&extended) {
            return Some(image);
        }
    }
    decode_hex(run)
}

/// `run` followed by every hex line that continues it after CR/LF breaks.
fn extend_across_lines(haystack: &[u8], mut end: usize, run: &[u8]) -> Vec<u8> {
    let mut digits = run.to_vec();
    loop {
        let mut next = end;
        while next < haystack.len() && matches!(haystack[next], b'\r' | b'\n') {
            next += 1;
        }
        if next == end {
            break;
        }
        let line_len = haystack[next..]
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if line_len == 0 {
            break;
        }
        digits.extend_from_slice(&haystack[next..next + line_len]);
        end = next + line_len;
    }
    digits
}

fn decode_hex(digits: &[u8]) -> Option<ExtractedImage> {
    if digits.len() % 2 != 0 {
        return None;
    }
    ExtractedImage::from_bytes(hex::decode(digits).ok()?)
}

fn decode_spaced_hex(candidate: &[u8]) -> Option<ExtractedImage> {
    let digits: Vec<u8> = candidate
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .copied()
        .collect();
    decode_hex(&digits)
}

/// Decode decimal byte values; any value above 255 rejects the candidate.
fn decode_decimal(candidate: &[u8]) -> Option<ExtractedImage> {
    let bytes = RE_DECIMAL_VALUE
        .find_iter(candidate)
        .map(|v| {
            std::str::from_utf8(v.as_bytes())
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .and_then(|n| u8::try_from(n).ok())
        })
        .collect::<Option<Vec<u8>>>()?;
    ExtractedImage::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ImageMime;

    fn tiny_png() -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(1, 1, ::image::Rgb([200, 10, 10]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ::image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn find(input: &[u8]) -> Option<ImageMatch> {
        let config = ScrubConfig::default();
        let patterns = ImagePatterns::new(&config).unwrap();
        locate(Fragment::Bytes(input), &patterns, &config)
    }

    fn decimal_list(bytes: &[u8], sep: &str) -> String {
        bytes
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(sep)
    }

    #[test]
    fn test_pict_hex_run() {
        let png = tiny_png();
        let doc = format!(
            r"{{\rtf1\ansi {{\pict\pngblip\picw1\pich1 {}}} after}}",
            hex::encode(&png)
        );
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::HexRun);
        assert_eq!(m.image.mime(), ImageMime::Png);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_wrapped_hex_is_joined() {
        let png = tiny_png();
        let hex = hex::encode_upper(&png);
        let wrapped: Vec<&str> = hex
            .as_bytes()
            .chunks(64)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        let doc = format!(
            "{{\\rtf1{{\\*\\shppict{{\\pict\\pngblip\r\n{}\r\n}}}}}}",
            wrapped.join("\r\n")
        );
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::HexRun);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_binary_block() {
        let png = tiny_png();
        let mut doc = format!(r"{{\rtf1{{\pict\pngblip\bin{} ", png.len()).into_bytes();
        doc.extend_from_slice(&png);
        doc.extend_from_slice(b"}}");
        let m = find(&doc).unwrap();
        assert_eq!(m.strategy, ImageStrategy::BinaryBlock);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_binary_block_in_latin1_text() {
        let png = tiny_png();
        let mut doc = format!(r"{{\rtf1{{\pict\bin{}", png.len()).into_bytes();
        doc.push(b'\n');
        doc.extend_from_slice(&png);
        doc.extend_from_slice(b"}}");
        let text = decode::latin1(&doc);
        let config = ScrubConfig::default();
        let patterns = ImagePatterns::new(&config).unwrap();
        let m = locate(Fragment::Text(&text), &patterns, &config).unwrap();
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_spaced_hex() {
        let png = tiny_png();
        let pairs: Vec<String> = png.iter().map(|b| format!("{b:02x}")).collect();
        let doc = format!(r"{{\rtf1{{\pict {}}}}}", pairs.join(" "));
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::SpacedHex);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_decimal_bytes() {
        let png = tiny_png();
        let doc = format!(r"{{\rtf1{{\pict {}}}}}", decimal_list(&png, ", "));
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::DecimalBytes);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_decimal_with_out_of_range_value_rejected() {
        let mut values = vec![255u16, 216, 255, 999];
        values.extend(std::iter::repeat(1).take(50));
        let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let doc = format!(r"{{\rtf1{{\pict {}}}}}", list.join(" "));
        assert!(find(doc.as_bytes()).is_none());
    }

    #[test]
    fn test_document_hex_run_without_pict() {
        let png = tiny_png();
        let doc = format!(r"{{\rtf1 stray payload {} end}}", hex::encode(&png));
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::DocumentHexRun);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_document_decimal_without_pict() {
        let png = tiny_png();
        let doc = format!("bytes: {}", decimal_list(&png, " "));
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::DocumentDecimal);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_signature_scan() {
        let doc = b"note: ffd8ffe0 00104a46 49460001 01000001 00010000 rest";
        let m = find(doc).unwrap();
        assert_eq!(m.strategy, ImageStrategy::SignatureScan);
        assert_eq!(m.image.mime(), ImageMime::Jpeg);
        assert_eq!(m.offset, 6);
        assert_eq!(m.image.len(), 20);
    }

    #[test]
    fn test_signature_scan_requires_enough_digits() {
        assert!(find(b"tail 89504e47 0d0a end").is_none());
    }

    #[test]
    fn test_no_markers_is_none() {
        assert!(find(br"{\rtf1\ansi Hello world}").is_none());
        assert!(find(b"just some text").is_none());
        assert!(find(b"").is_none());
    }

    #[test]
    fn test_odd_length_hex_skipped() {
        let hex = format!("{}0", "89504e470d0a1a0a".repeat(3));
        let doc = format!(r"{{\rtf1{{\pict {hex}}}}}");
        assert_eq!(hex.len() % 2, 1);
        assert!(find(doc.as_bytes()).is_none());
    }

    #[test]
    fn test_non_image_hex_skipped() {
        let doc = format!(r"{{\rtf1{{\pict {}}}}}", "ab".repeat(40));
        assert!(find(doc.as_bytes()).is_none());
    }

    #[test]
    fn test_second_candidate_used_after_malformed_first() {
        let png = tiny_png();
        let doc = format!(
            r"{{\rtf1{{\pict {} {}}}}}",
            "cd".repeat(30),
            hex::encode(&png)
        );
        let m = find(doc.as_bytes()).unwrap();
        assert_eq!(m.strategy, ImageStrategy::HexRun);
        assert_eq!(m.image.bytes(), png.as_slice());
    }

    #[test]
    fn test_oversize_fragment_not_scanned() {
        let png = tiny_png();
        let doc = format!(r"{{\rtf1{{\pict {}}}}}", hex::encode(&png));
        let config = ScrubConfig::builder().max_input_bytes(16).build().unwrap();
        let patterns = ImagePatterns::new(&config).unwrap();
        assert!(locate(Fragment::Text(&doc), &patterns, &config).is_none());
    }

    #[test]
    fn test_enclosing_group_ignores_escaped_braces() {
        let view = br"{a{b}\{\pict x}tail";
        let pict = RE_PICT.find(view).unwrap().start();
        assert_eq!(enclosing_group(view, pict), (0, 15));
    }

    #[test]
    fn test_unclosed_group_runs_to_end() {
        let view = br"{\rtf1{\pict abc";
        let pict = RE_PICT.find(view).unwrap().start();
        assert_eq!(enclosing_group(view, pict), (6, view.len()));
    }

    #[test]
    fn test_group_end_skips_binary_payload() {
        let view = b"{\\bin3 }}}x}";
        assert_eq!(find_group_end(view, 0), view.len());
    }
}
