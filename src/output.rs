//! Result types produced by the engine.
//!
//! Text extraction returns an [`Extraction`], a tagged result that keeps the
//! degradation path visible instead of folding every outcome into a bare
//! `String`. Image extraction returns `Option<ExtractedImage>`; `None` means
//! the document simply carries no picture.

use crate::error::Degradation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of a total extraction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction<T> {
    /// The precise path produced a value.
    Success { value: T },
    /// The input held nothing to extract (absent, blank, or all noise).
    Empty,
    /// A value was produced through one or more fallback paths.
    Degraded {
        value: T,
        reasons: Vec<Degradation>,
    },
}

impl<T> Extraction<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Extraction::Success { value } | Extraction::Degraded { value, .. } => Some(value),
            Extraction::Empty => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Extraction::Success { value } | Extraction::Degraded { value, .. } => Some(value),
            Extraction::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Extraction::Empty)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Extraction::Degraded { .. })
    }

    /// Degradation reasons, empty for `Success` and `Empty`.
    pub fn reasons(&self) -> &[Degradation] {
        match self {
            Extraction::Degraded { reasons, .. } => reasons,
            _ => &[],
        }
    }

    /// Attach an extra reason, promoting `Success` to `Degraded`.
    pub(crate) fn degrade(self, reason: Degradation) -> Self {
        match self {
            Extraction::Success { value } => Extraction::Degraded {
                value,
                reasons: vec![reason],
            },
            Extraction::Degraded { value, mut reasons } => {
                reasons.insert(0, reason);
                Extraction::Degraded { value, reasons }
            }
            Extraction::Empty => Extraction::Empty,
        }
    }

    /// Feed the value through a second total step, merging the tags.
    pub(crate) fn and_then<U>(self, f: impl FnOnce(T) -> Extraction<U>) -> Extraction<U> {
        match self {
            Extraction::Success { value } => f(value),
            Extraction::Empty => Extraction::Empty,
            Extraction::Degraded { value, reasons } => match f(value) {
                Extraction::Success { value } => Extraction::Degraded { value, reasons },
                Extraction::Empty => Extraction::Empty,
                Extraction::Degraded {
                    value,
                    reasons: more,
                } => Extraction::Degraded {
                    value,
                    reasons: reasons.into_iter().chain(more).collect(),
                },
            },
        }
    }
}

impl Extraction<String> {
    /// Collapse to display text; `Empty` becomes `""`.
    pub fn into_text(self) -> String {
        self.into_value().unwrap_or_default()
    }
}

/// MIME type of an extracted picture. Closed set: PNG or JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8];

impl ImageMime {
    /// Identify the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(ImageMime::Png)
        } else if bytes.starts_with(JPEG_SIGNATURE) {
            Some(ImageMime::Jpeg)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
        }
    }

    /// File extension used when persisting the image.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageMime::Png => "png",
            ImageMime::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A picture recovered from a fragment.
///
/// The only constructor checks the signature, so `bytes` is never empty and
/// always starts with the magic bytes matching `mime`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedImage {
    #[serde(serialize_with = "serialize_base64")]
    bytes: Vec<u8>,
    mime: ImageMime,
}

impl ExtractedImage {
    /// Wrap `bytes` if they start with a PNG or JPEG signature.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let mime = ImageMime::sniff(&bytes)?;
        Some(Self { bytes, mime })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for ExtractedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn serialize_base64<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    s.serialize_str(&STANDARD.encode(bytes))
}

/// Which encoding the image was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStrategy {
    /// `\binN` followed by N raw bytes inside a picture group.
    BinaryBlock,
    /// Contiguous hex run inside a picture group.
    HexRun,
    /// Hex pairs separated by whitespace inside a picture group.
    SpacedHex,
    /// Decimal byte values inside a picture group.
    DecimalBytes,
    /// Long hex run anywhere in the document.
    DocumentHexRun,
    /// Long decimal sequence anywhere in the document.
    DocumentDecimal,
    /// Hex collected from the first hex-encoded signature in the document.
    SignatureScan,
}

/// An image plus where and how it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMatch {
    pub image: ExtractedImage,
    pub strategy: ImageStrategy,
    /// Byte offset of the encoded candidate in the byte-faithful view.
    pub offset: usize,
}

/// Decoded properties of an extracted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// Summary of an image for reports (bytes omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub mime: ImageMime,
    pub len: usize,
    pub strategy: ImageStrategy,
    pub offset: usize,
    /// `None` when the codec could not decode the payload.
    pub info: Option<ImageInfo>,
}

/// Everything the engine learns about one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub input_len: usize,
    pub is_markup: bool,
    pub text: Extraction<String>,
    pub image: Option<ImageSummary>,
}

/// Result of scrubbing one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrubbedFile {
    pub path: PathBuf,
    pub text: Extraction<String>,
    pub image: Option<ImageMatch>,
}
