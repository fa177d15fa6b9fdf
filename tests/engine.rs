//! Integration tests for the text and image engines.
//!
//! Everything here runs in-process on synthetic fragments; PNG fixtures are
//! generated with the `image` crate so the expected bytes are exact.

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use rtfscrub::{
    extract_image, extract_text, extract_text_ascii, flatten_alpha, inspect, locate_image, probe,
    Degradation, Extraction, Fragment, ImageCache, ImageMime, ImageStrategy, MemoryImageCache,
    ScrubConfig, Scrubber,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn png_bytes(img: DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn one_pixel_png() -> Vec<u8> {
    png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        1,
        1,
        Rgb([12, 34, 56]),
    )))
}

fn pict_hex(payload: &[u8]) -> String {
    format!(
        r"{{\rtf1\ansi\deff0 Legenda {{\pict\pngblip\picw1\pich1 {}}}}}",
        hex::encode(payload)
    )
}

fn assert_clean(text: &str, context: &str) {
    for c in text.chars() {
        assert!(
            !c.is_control(),
            "[{context}] output contains control U+{:04X}",
            c as u32
        );
    }
}

// ── Text channel ─────────────────────────────────────────────────────────────

#[test]
fn test_non_markup_is_trimmed_identity() {
    let out = extract_text("   Observação do paciente  ");
    assert_eq!(
        out,
        Extraction::Success {
            value: "Observação do paciente".into()
        }
    );
}

#[test]
fn test_hex_escape() {
    assert!(extract_text(r"{\rtf1\ansi Ol\'e1}").into_text().contains("Olá"));
}

#[test]
fn test_unicode_escape() {
    assert!(extract_text(r"{\rtf1\ansi \u233 }").into_text().contains('é'));
}

#[test]
fn test_latin1_bytes_input() {
    let out = extract_text(b"{\\rtf1\\ansi Cora\xe7\xe3o}".as_slice());
    assert_eq!(out.into_text(), "Coração");
}

#[test]
fn test_realistic_document() {
    let doc = r"{\rtf1\ansi\ansicpg1252\deff0{\fonttbl{\f0\fnil\fcharset0 Calibri;}}
{\colortbl ;\red0\green0\blue0;}
\viewkind4\uc1\pard\sa200\sl276\slmult1\lang22\f0\fs22 Paciente relata dor \'e0 noite.\par
Retorno em 15 dias \endash  sem intercorr\'eancias.\par
}";
    let out = extract_text(doc).into_text();
    assert!(out.contains("Paciente relata dor à noite."), "got: {out}");
    assert!(out.contains("Retorno em 15 dias"), "got: {out}");
    assert!(out.contains("sem intercorrências."), "got: {out}");
    assert!(!out.contains('\\'));
    assert!(!out.contains('{'));
}

#[test]
fn test_hyperlink_quoted() {
    let out = extract_text(r#"HYPERLINK "file.pdf" "Report""#).into_text();
    assert!(out.contains("Report"));
    assert!(!out.contains("HYPERLINK"));
}

#[test]
fn test_hyperlink_field_in_markup() {
    let doc = r#"{\rtf1 See {\field{\*\fldinst HYPERLINK "file.pdf" }{\fldrslt Report}}}"#;
    let out = extract_text(doc).into_text();
    assert!(out.contains("Report"), "got: {out}");
    assert!(!out.to_uppercase().contains("HYPERLINK"), "got: {out}");
}

#[test]
fn test_task_description_debris_removed() {
    let doc = r"{\rtf1\ansi DESCRICAO_TAREFA DESCRICAO Troca de senha senha .; ; .; ;}";
    assert_eq!(extract_text(doc).into_text(), "Troca de senha");
}

#[test]
fn test_binary_tail_truncated() {
    let input = format!("Text before {}", "a1".repeat(20));
    assert_eq!(extract_text(input.as_str()).into_text(), "Text before");
}

#[test]
fn test_zip_payload_truncated() {
    let input = format!(r"{{\rtf1 Anexo segue 504b0304{}}}", "14".repeat(30));
    assert_eq!(extract_text(input.as_str()).into_text(), "Anexo segue");
}

#[test]
fn test_output_never_contains_controls() {
    let all_bytes: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
    let cases: Vec<Vec<u8>> = vec![
        all_bytes.clone(),
        [b"{\\rtf1 ".as_slice(), all_bytes.as_slice(), b"}".as_slice()].concat(),
        b"{\\rtf1 a\\u7 b\\u-3913 c\\'07d}".to_vec(),
        "tab\tnew\nline\r\nbell\u{7}zw\u{200B}".as_bytes().to_vec(),
    ];
    for (i, case) in cases.iter().enumerate() {
        let out = extract_text(case).into_text();
        assert_clean(&out, &format!("case {i}"));
    }
}

#[test]
fn test_ascii_variant() {
    let out = extract_text_ascii(r"{\rtf1 Emiss\'e3o \u8220ok\u8221 \u8212 n\'b0 5}");
    assert_eq!(out.into_text(), "Emissao \"ok\" - no 5");
}

#[test]
fn test_absent_and_blank() {
    assert!(extract_text(Fragment::Absent).is_empty());
    assert!(extract_text("").is_empty());
    assert!(extract_text(r"{\rtf1\ansi\deff0{\fonttbl}}").is_empty());
    assert!(extract_image(Fragment::Absent).is_none());
}

// ── Degradation paths ────────────────────────────────────────────────────────

#[test]
fn test_degradation_input_truncated() {
    let config = ScrubConfig::builder().max_input_bytes(32).build().unwrap();
    let scrubber = Scrubber::new(config).unwrap();
    let input = "palavra ".repeat(10);
    let out = scrubber.extract_text(input.as_str());
    assert!(matches!(
        out.reasons(),
        [Degradation::InputTruncated { limit: 32, .. }]
    ));
    assert!(out.value().unwrap().len() <= 32);
}

#[test]
fn test_degradation_simplified_strip() {
    let config = ScrubConfig::builder().max_group_depth(2).build().unwrap();
    let scrubber = Scrubber::new(config).unwrap();
    let out = scrubber.extract_text(r"{\rtf1 {\b {\i deep}} tail}");
    assert!(matches!(out.reasons(), [Degradation::SimplifiedStrip { .. }]));
    assert!(out.into_text().contains("tail"));
}

#[test]
fn test_degradation_pass_through() {
    let config = ScrubConfig::builder().max_group_depth(1).build().unwrap();
    let scrubber = Scrubber::new(config).unwrap();
    let out = scrubber.extract_text(r"{\rtf1{}");
    assert_eq!(
        out.reasons().last(),
        Some(&Degradation::PassThrough),
        "got: {out:?}"
    );
    assert_eq!(out.into_text(), r"{\rtf1{}");
}

#[test]
fn test_degradation_noise_recovered() {
    let mut bytes = vec![0x01u8; 60];
    bytes.extend_from_slice(b"Laudo normal");
    bytes.extend(std::iter::repeat(0x02u8).take(60));
    let out = extract_text(&bytes);
    assert!(matches!(
        out.reasons(),
        [Degradation::NoiseRecovered { legible: 12, .. }]
    ));
    assert_eq!(out.into_text(), "Laudo normal");
}

#[test]
fn test_extraction_serialises_with_status_tag() {
    let json = serde_json::to_value(extract_text("ok")).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["value"], "ok");
}

// ── Image channel ────────────────────────────────────────────────────────────

#[test]
fn test_contiguous_hex_png() {
    let png = one_pixel_png();
    let doc = pict_hex(&png);
    let img = extract_image(&doc).unwrap();
    assert_eq!(img.mime(), ImageMime::Png);
    assert_eq!(img.bytes(), png.as_slice());
}

#[test]
fn test_image_and_text_from_same_fragment() {
    let png = one_pixel_png();
    let doc = pict_hex(&png);
    assert_eq!(extract_text(&doc).into_text(), "Legenda");
    assert!(extract_image(&doc).is_some());
}

#[test]
fn test_no_markers_no_image() {
    assert!(extract_image(r"{\rtf1\ansi Nada aqui.}").is_none());
    assert!(extract_image("plain text without anything").is_none());
}

#[test]
fn test_malformed_candidates_skipped() {
    // odd-length hex, non-hex garbage with a signature prefix, decimal > 255
    let odd = format!(r"{{\rtf1{{\pict {}f}}}}", "89504e47".repeat(6));
    let garbage = r"{\rtf1{\pict 89504E47zzzz}}";
    let decimal = format!(r"{{\rtf1{{\pict 137 80 78 71 {}}}}}", "300 ".repeat(30));
    for doc in [odd.as_str(), garbage, decimal.as_str()] {
        assert!(extract_image(doc).is_none(), "unexpected image in {doc:?}");
    }
}

#[test]
fn test_binary_block_strategy() {
    let png = one_pixel_png();
    let mut doc = format!(r"{{\rtf1{{\pict\pngblip\bin{} ", png.len()).into_bytes();
    doc.extend_from_slice(&png);
    doc.extend_from_slice(b"}}");
    let m = locate_image(&doc).unwrap();
    assert_eq!(m.strategy, ImageStrategy::BinaryBlock);
    assert_eq!(m.image.bytes(), png.as_slice());
}

#[test]
fn test_each_textual_strategy() {
    let png = one_pixel_png();
    let spaced: Vec<String> = png.iter().map(|b| format!("{b:02X}")).collect();
    let decimal: Vec<String> = png.iter().map(|b| b.to_string()).collect();
    let cases = [
        (pict_hex(&png), ImageStrategy::HexRun),
        (
            format!(r"{{\rtf1{{\pict {}}}}}", spaced.join("\n")),
            ImageStrategy::SpacedHex,
        ),
        (
            format!(r"{{\rtf1{{\pict {}}}}}", decimal.join(",")),
            ImageStrategy::DecimalBytes,
        ),
        (
            format!("orphan {}", hex::encode(&png)),
            ImageStrategy::DocumentHexRun,
        ),
        (
            format!("orphan {}", decimal.join(" ")),
            ImageStrategy::DocumentDecimal,
        ),
    ];
    for (doc, expected) in cases {
        let m = locate_image(doc.as_str()).unwrap_or_else(|| panic!("no image for {expected:?}"));
        assert_eq!(m.strategy, expected);
        assert_eq!(m.image.bytes(), png.as_slice(), "{expected:?}");
    }
}

#[test]
fn test_signature_scan_strategy() {
    let doc = "resto ffd8ffe0 00104a46 49460001 0100 0001 0001 0000 ok";
    let m = locate_image(doc).unwrap();
    assert_eq!(m.strategy, ImageStrategy::SignatureScan);
    assert_eq!(m.image.mime(), ImageMime::Jpeg);
}

#[test]
fn test_inspect_report() {
    let png = one_pixel_png();
    let report = inspect(&pict_hex(&png));
    assert!(report.is_markup);
    assert_eq!(report.text.value().map(String::as_str), Some("Legenda"));
    let image = report.image.unwrap();
    assert_eq!(image.strategy, ImageStrategy::HexRun);
    let info = image.info.unwrap();
    assert_eq!((info.width, info.height, info.has_alpha), (1, 1, false));
}

#[test]
fn test_flatten_removes_alpha() {
    let png = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        2,
        2,
        Rgba([0, 0, 255, 64]),
    )));
    let img = extract_image(&pict_hex(&png)).unwrap();
    assert!(probe(&img).unwrap().has_alpha);
    let flat = flatten_alpha(&img).unwrap();
    assert!(!probe(&flat).unwrap().has_alpha);
}

// ── Cache collaborator ───────────────────────────────────────────────────────

/// Counts lookups so the test can see the cache was asked first.
#[derive(Default)]
struct CountingCache {
    inner: MemoryImageCache,
    lookups: AtomicUsize,
}

impl ImageCache for CountingCache {
    fn has_image(&self, key: &str) -> Option<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.has_image(key)
    }

    fn set_has_image(&self, key: &str, present: bool) {
        self.inner.set_has_image(key, present);
    }

    fn image(&self, key: &str) -> Option<rtfscrub::ExtractedImage> {
        self.inner.image(key)
    }

    fn store_image(&self, key: &str, image: &rtfscrub::ExtractedImage) {
        self.inner.store_image(key, image);
    }
}

#[test]
fn test_cache_consulted_before_extraction() {
    let png = one_pixel_png();
    let doc = pict_hex(&png);
    let cache = CountingCache::default();
    let scrubber = Scrubber::default();

    // miss: scans and records
    assert!(scrubber.has_image_cached("sha256:abc", &doc, &cache));
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 1);

    // hit: answered from the cache even for a fragment without a picture
    assert!(scrubber.has_image_cached("sha256:abc", "no picture", &cache));
    let img = scrubber
        .extract_image_cached("sha256:abc", "no picture", &cache)
        .unwrap();
    assert_eq!(img.bytes(), png.as_slice());
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 3);
}

#[test]
fn test_cache_records_absence() {
    let cache = MemoryImageCache::new();
    let scrubber = Scrubber::default();
    assert!(!scrubber.has_image_cached("k", "sem imagem", &cache));
    assert_eq!(cache.has_image("k"), Some(false));
}
