//! Scrubbing entry points.
//!
//! [`Scrubber`] bundles a [`ScrubConfig`] with the patterns compiled from
//! it. Build one per configuration and share it (it is `Send + Sync` and
//! cheap to clone). The free functions at the bottom of the engine section
//! use a process-wide scrubber with the default configuration.
//!
//! The async file layer ([`scrub_file`], [`scrub_files`], [`write_image`])
//! is the only part of the crate that touches the filesystem.

use crate::cache::ImageCache;
use crate::config::ScrubConfig;
use crate::error::{Degradation, ScrubError};
use crate::output::{
    DocumentReport, ExtractedImage, Extraction, ImageMatch, ImageSummary, ScrubbedFile,
};
use crate::pipeline::decode::{self, Fragment, Normalized};
use crate::pipeline::image::{self as image_scan, ImagePatterns};
use crate::pipeline::sanitize::{self, TextPatterns};
use crate::pipeline::{encode, repair, strip};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text and image extraction with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Scrubber {
    config: ScrubConfig,
    text: TextPatterns,
    images: ImagePatterns,
}

impl Scrubber {
    /// Compile the threshold-dependent patterns for `config`.
    ///
    /// # Errors
    /// [`ScrubError::InvalidConfig`] if a threshold produces a pattern the
    /// regex engine rejects (only possible for configs not built through
    /// [`ScrubConfig::builder`]).
    pub fn new(config: ScrubConfig) -> Result<Self, ScrubError> {
        let invalid = |e: regex::Error| ScrubError::InvalidConfig(e.to_string());
        let text = TextPatterns::new(&config).map_err(invalid)?;
        let images = ImagePatterns::new(&config).map_err(invalid)?;
        Ok(Self {
            config,
            text,
            images,
        })
    }

    pub fn config(&self) -> &ScrubConfig {
        &self.config
    }

    /// Display text for a fragment.
    ///
    /// Never fails. Fallback paths are reported as [`Degradation`] tags on
    /// the returned [`Extraction`].
    pub fn extract_text<'a>(&self, fragment: impl Into<Fragment<'a>>) -> Extraction<String> {
        self.text_of(&decode::normalize(fragment.into()))
    }

    /// Like [`Scrubber::extract_text`], rendered in printable ASCII.
    pub fn extract_text_ascii<'a>(&self, fragment: impl Into<Fragment<'a>>) -> Extraction<String> {
        self.extract_text(fragment).and_then(|text| {
            let value = repair::to_ascii(&text);
            if value.is_empty() {
                Extraction::Empty
            } else {
                Extraction::Success { value }
            }
        })
    }

    /// The first embedded PNG/JPEG, if any.
    pub fn extract_image<'a>(&self, fragment: impl Into<Fragment<'a>>) -> Option<ExtractedImage> {
        image_scan::extract(fragment.into(), &self.images, &self.config)
    }

    /// Like [`Scrubber::extract_image`], keeping the strategy and offset.
    pub fn locate_image<'a>(&self, fragment: impl Into<Fragment<'a>>) -> Option<ImageMatch> {
        image_scan::locate(fragment.into(), &self.images, &self.config)
    }

    /// Everything the engine can tell about a fragment.
    pub fn inspect<'a>(&self, fragment: impl Into<Fragment<'a>>) -> DocumentReport {
        let fragment = fragment.into();
        let normalized = decode::normalize(fragment);
        let image = self.locate_image(fragment).map(|m| ImageSummary {
            mime: m.image.mime(),
            len: m.image.len(),
            strategy: m.strategy,
            offset: m.offset,
            info: encode::probe(&m.image)
                .map_err(|e| debug!("Image probe failed: {e}"))
                .ok(),
        });
        DocumentReport {
            input_len: fragment.len(),
            is_markup: normalized.is_markup(),
            text: self.text_of(&normalized),
            image,
        }
    }

    /// Whether the fragment carries an image, answered from `cache` when it
    /// knows. A scan result is written back under `key`.
    pub fn has_image_cached<'a>(
        &self,
        key: &str,
        fragment: impl Into<Fragment<'a>>,
        cache: &dyn ImageCache,
    ) -> bool {
        if let Some(present) = cache.has_image(key) {
            debug!("Image cache hit for {key}: {present}");
            return present;
        }
        self.scan_and_record(key, fragment.into(), cache).is_some()
    }

    /// The embedded image, served from `cache` when it holds the answer.
    pub fn extract_image_cached<'a>(
        &self,
        key: &str,
        fragment: impl Into<Fragment<'a>>,
        cache: &dyn ImageCache,
    ) -> Option<ExtractedImage> {
        if cache.has_image(key) == Some(false) {
            debug!("Image cache says {key} has no image");
            return None;
        }
        if let Some(image) = cache.image(key) {
            debug!("Image cache hit for {key}");
            return Some(image);
        }
        self.scan_and_record(key, fragment.into(), cache)
    }

    fn scan_and_record(
        &self,
        key: &str,
        fragment: Fragment<'_>,
        cache: &dyn ImageCache,
    ) -> Option<ExtractedImage> {
        let found = self.extract_image(fragment);
        cache.set_has_image(key, found.is_some());
        if let Some(image) = &found {
            cache.store_image(key, image);
        }
        found
    }

    fn text_of(&self, normalized: &Normalized) -> Extraction<String> {
        let full = normalized.text();
        if full.is_empty() {
            return Extraction::Empty;
        }
        let limit = self.config.max_input_bytes;
        let text = decode::truncate_to_boundary(full, limit);

        let result = strip::strip(text, &self.config)
            .and_then(|plain| sanitize::sanitize(&plain, &self.text, &self.config));

        if text.len() < full.len() {
            warn!("Fragment of {} bytes truncated to {}", full.len(), text.len());
            result.degrade(Degradation::InputTruncated {
                limit,
                actual: full.len(),
            })
        } else {
            result
        }
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        DEFAULT_SCRUBBER.clone()
    }
}

static DEFAULT_SCRUBBER: Lazy<Scrubber> =
    Lazy::new(|| Scrubber::new(ScrubConfig::default()).unwrap());

/// [`Scrubber::extract_text`] with the default configuration.
pub fn extract_text<'a>(fragment: impl Into<Fragment<'a>>) -> Extraction<String> {
    DEFAULT_SCRUBBER.extract_text(fragment)
}

/// [`Scrubber::extract_text_ascii`] with the default configuration.
pub fn extract_text_ascii<'a>(fragment: impl Into<Fragment<'a>>) -> Extraction<String> {
    DEFAULT_SCRUBBER.extract_text_ascii(fragment)
}

/// [`Scrubber::extract_image`] with the default configuration.
pub fn extract_image<'a>(fragment: impl Into<Fragment<'a>>) -> Option<ExtractedImage> {
    DEFAULT_SCRUBBER.extract_image(fragment)
}

/// [`Scrubber::locate_image`] with the default configuration.
pub fn locate_image<'a>(fragment: impl Into<Fragment<'a>>) -> Option<ImageMatch> {
    DEFAULT_SCRUBBER.locate_image(fragment)
}

/// [`Scrubber::inspect`] with the default configuration.
pub fn inspect<'a>(fragment: impl Into<Fragment<'a>>) -> DocumentReport {
    DEFAULT_SCRUBBER.inspect(fragment)
}

// ── File layer ───────────────────────────────────────────────────────────

/// Read a file and scrub it off the async runtime.
///
/// # Errors
/// Only read failures. The scrub itself cannot fail.
pub async fn scrub_file(
    path: impl AsRef<Path>,
    scrubber: &Scrubber,
) -> Result<ScrubbedFile, ScrubError> {
    let path = path.as_ref().to_path_buf();
    let bytes = read_input(&path).await?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    scrub_bytes(path, bytes, scrubber).await
}

/// Scrub an in-memory fragment off the async runtime, labelled with `path`.
///
/// For input that did not come from a file, such as stdin.
pub async fn scrub_bytes(
    path: PathBuf,
    bytes: Vec<u8>,
    scrubber: &Scrubber,
) -> Result<ScrubbedFile, ScrubError> {
    let scrubber = scrubber.clone();
    tokio::task::spawn_blocking(move || {
        let text = scrubber.extract_text(&bytes);
        let image = scrubber.locate_image(&bytes);
        ScrubbedFile { path, text, image }
    })
    .await
    .map_err(|e| ScrubError::Internal(format!("scrub task panicked: {e}")))
}

/// Scrub many files, `config.concurrency` at a time.
///
/// Results come back in input order. One file failing does not stop the
/// others.
pub async fn scrub_files(
    paths: Vec<PathBuf>,
    scrubber: Arc<Scrubber>,
) -> Vec<Result<ScrubbedFile, ScrubError>> {
    let total = paths.len();
    let callback = scrubber.config().progress_callback.clone();
    info!("Scrubbing {} files", total);
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<(usize, Result<ScrubbedFile, ScrubError>)> =
        stream::iter(paths.into_iter().enumerate().map(|(idx, path)| {
            let scrubber = Arc::clone(&scrubber);
            let callback = callback.clone();
            async move {
                if let Some(ref cb) = callback {
                    cb.on_file_start(&path);
                }
                let result = scrub_file(&path, &scrubber).await;
                if let Some(ref cb) = callback {
                    match &result {
                        Ok(done) => cb.on_file_complete(
                            &path,
                            done.text.value().map_or(0, String::len),
                            done.image.is_some(),
                        ),
                        Err(e) => cb.on_file_error(&path, &e.to_string()),
                    }
                }
                (idx, result)
            }
        }))
        .buffer_unordered(scrubber.config().concurrency)
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    let success = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Scrubbed {}/{} files", success, total);
    if let Some(ref cb) = callback {
        cb.on_batch_complete(total, success);
    }
    results.into_iter().map(|(_, r)| r).collect()
}

/// Write an image to disk.
///
/// Uses atomic write (temp file + rename) so readers never see a partial
/// image.
pub async fn write_image(
    path: impl AsRef<Path>,
    image: &ExtractedImage,
) -> Result<(), ScrubError> {
    let path = path.as_ref();
    let write_err = |e| ScrubError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", image.mime().extension()));
    tokio::fs::write(&tmp_path, image.bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", image.len(), path.display());
    Ok(())
}

async fn read_input(path: &Path) -> Result<Vec<u8>, ScrubError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScrubError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ScrubError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ScrubError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryImageCache;

    const JPEG_HEX: &str = "ffd8ffe000104a46494600010100000100010000ffdb00430008060607060508";

    fn pict_doc() -> String {
        format!(r"{{\rtf1\ansi Caption{{\pict\jpegblip {JPEG_HEX}}}}}")
    }

    #[test]
    fn extract_text_runs_full_pipeline() {
        let out = extract_text(r"{\rtf1\ansi Relat\'f3rio \u8212 final}");
        assert_eq!(out.into_text(), "Relatório - final");
    }

    #[test]
    fn extract_text_accepts_bytes_and_absent() {
        assert_eq!(extract_text(b"plain".as_slice()).into_text(), "plain");
        assert!(extract_text(Fragment::Absent).is_empty());
        assert!(extract_text(None::<&str>).is_empty());
    }

    #[test]
    fn ascii_variant() {
        let out = extract_text_ascii(r"{\rtf1 A\'e7\'e3o}");
        assert_eq!(out.into_text(), "Acao");
    }

    #[test]
    fn oversize_input_is_truncated_and_tagged() {
        let config = ScrubConfig::builder().max_input_bytes(10).build().unwrap();
        let scrubber = Scrubber::new(config).unwrap();
        let out = scrubber.extract_text("abcdefghij klmnop");
        assert_eq!(out.value().map(String::as_str), Some("abcdefghij"));
        assert_eq!(
            out.reasons(),
            &[Degradation::InputTruncated {
                limit: 10,
                actual: 17
            }]
        );
    }

    #[test]
    fn image_alongside_text() {
        let doc = pict_doc();
        let img = extract_image(&doc).unwrap();
        assert_eq!(img.bytes(), hex::decode(JPEG_HEX).unwrap().as_slice());
    }

    #[test]
    fn inspect_reports_both_channels() {
        let report = inspect(&pict_doc());
        assert!(report.is_markup);
        let image = report.image.unwrap();
        assert_eq!(image.len, JPEG_HEX.len() / 2);
        // the payload is a header only; the codec cannot decode it
        assert!(image.info.is_none());
    }

    #[test]
    fn cached_lookup_skips_scan_on_hit() {
        let cache = MemoryImageCache::new();
        cache.set_has_image("k", false);
        let scrubber = Scrubber::default();
        assert!(!scrubber.has_image_cached("k", &pict_doc(), &cache));
        assert!(scrubber.extract_image_cached("k", &pict_doc(), &cache).is_none());
    }

    #[test]
    fn cached_lookup_records_miss_then_serves_image() {
        let cache = MemoryImageCache::new();
        let scrubber = Scrubber::default();
        assert!(scrubber.has_image_cached("k", &pict_doc(), &cache));
        assert_eq!(cache.has_image("k"), Some(true));
        // served from cache even though the fragment no longer has it
        let img = scrubber.extract_image_cached("k", "no picture here", &cache);
        assert!(img.is_some());
    }

    #[test]
    fn scrubber_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scrubber>();
    }
}
