//! Error types for the rtfscrub library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`ScrubError`] is **fatal**: the operation cannot proceed at all (file
//!   missing, unreadable, invalid configuration, an extracted image that the
//!   image decoder rejects). Only the file layer, config building and image
//!   post-processing return it; the text and image engines never do.
//!
//! * [`Degradation`] is **non-fatal**: the engine produced a result, but not
//!   through the precise path (input was cut, markup fell back to the
//!   simplified strip, binary noise was mined for readable runs). Carried
//!   inside [`crate::output::Extraction::Degraded`] so callers can tell a
//!   clean extraction from a best-effort one.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the rtfscrub library.
#[derive(Debug, Error)]
pub enum ScrubError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Image errors ──────────────────────────────────────────────────────
    /// The extracted bytes carry a valid signature but the image codec
    /// could not decode or re-encode them.
    #[error("Image decoding failed: {0}")]
    ImageDecode(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an extraction result is best-effort rather than precise.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The fragment exceeded the configured size cap and was cut.
    #[error("input of {actual} bytes truncated to {limit} bytes")]
    InputTruncated { limit: usize, actual: usize },

    /// The precise stripper failed; the simplified two-step strip was used.
    #[error("markup stripped with simplified rules: {cause}")]
    SimplifiedStrip { cause: String },

    /// Neither stripper produced text; the original input was returned.
    #[error("markup could not be stripped; original text returned")]
    PassThrough,

    /// The text was mostly illegible; only readable runs were kept.
    #[error("illegible text ({legible}/{total} legible chars); readable runs recovered")]
    NoiseRecovered { legible: usize, total: usize },
}
