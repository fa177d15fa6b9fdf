//! Configuration types for fragment scrubbing.
//!
//! All engine behaviour is controlled through [`ScrubConfig`], built via its
//! [`ScrubConfigBuilder`]. The numeric thresholds are heuristics inherited
//! from the data this engine was tuned against; the defaults reproduce that
//! behaviour exactly, but every one of them is a knob, not an invariant.

use crate::error::ScrubError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Configuration for text and image extraction.
///
/// Built via [`ScrubConfig::builder()`] or using [`ScrubConfig::default()`].
///
/// # Example
/// ```rust
/// use rtfscrub::ScrubConfig;
///
/// let config = ScrubConfig::builder()
///     .legibility_ratio(0.5)
///     .max_input_bytes(1 << 20)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScrubConfig {
    /// Hard cap on fragment size in bytes. Default: 8 MiB.
    ///
    /// Escape decoding and payload scanning are linear on well-formed input
    /// but can approach quadratic cost on dense pathological escapes. Text
    /// extraction cuts oversize fragments to this length; image extraction
    /// skips them.
    pub max_input_bytes: usize,

    /// Deepest brace nesting the precise stripper accepts. Default: 256.
    ///
    /// Deeper documents fall back to the simplified strip.
    pub max_group_depth: usize,

    /// Below this fraction of legible characters the text is treated as
    /// leaked binary noise. Default: 0.45.
    pub legibility_ratio: f64,

    /// Minimum length of a readable run mined from noise. Default: 4.
    pub min_readable_run: usize,

    /// Hex run length that marks leaked binary in the text channel; the text
    /// is cut at the first such run. Default: 40.
    pub binary_hex_run: usize,

    /// Minimum contiguous hex run inside a picture group. Default: 40.
    pub min_hex_run: usize,

    /// Minimum whitespace-separated hex pairs inside a picture group. Default: 20.
    pub min_spaced_hex_pairs: usize,

    /// Minimum decimal byte values inside a picture group. Default: 20.
    pub min_decimal_values: usize,

    /// Minimum hex run for the whole-document fallback. Default: 80.
    pub document_hex_run: usize,

    /// Minimum decimal values for the whole-document fallback. Default: 40.
    pub document_decimal_values: usize,

    /// Minimum hex digits collected by the signature scan. Default: 32.
    pub min_signature_hex: usize,

    /// Files processed in parallel by [`crate::convert::scrub_files`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 8 * 1024 * 1024,
            max_group_depth: 256,
            legibility_ratio: 0.45,
            min_readable_run: 4,
            binary_hex_run: 40,
            min_hex_run: 40,
            min_spaced_hex_pairs: 20,
            min_decimal_values: 20,
            document_hex_run: 80,
            document_decimal_values: 40,
            min_signature_hex: 32,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScrubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrubConfig")
            .field("max_input_bytes", &self.max_input_bytes)
            .field("max_group_depth", &self.max_group_depth)
            .field("legibility_ratio", &self.legibility_ratio)
            .field("min_readable_run", &self.min_readable_run)
            .field("binary_hex_run", &self.binary_hex_run)
            .field("min_hex_run", &self.min_hex_run)
            .field("min_spaced_hex_pairs", &self.min_spaced_hex_pairs)
            .field("min_decimal_values", &self.min_decimal_values)
            .field("document_hex_run", &self.document_hex_run)
            .field("document_decimal_values", &self.document_decimal_values)
            .field("min_signature_hex", &self.min_signature_hex)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScrubProgressCallback>"),
            )
            .finish()
    }
}

impl ScrubConfig {
    /// Create a new builder for `ScrubConfig`.
    pub fn builder() -> ScrubConfigBuilder {
        ScrubConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Largest repetition count accepted for a run threshold. Patterns are
/// compiled with these counts, so unbounded values would blow the regex
/// size limit.
pub const MAX_RUN_THRESHOLD: usize = 1000;

/// Builder for [`ScrubConfig`].
#[derive(Debug)]
pub struct ScrubConfigBuilder {
    config: ScrubConfig,
}

impl ScrubConfigBuilder {
    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n.max(1);
        self
    }

    pub fn max_group_depth(mut self, n: usize) -> Self {
        self.config.max_group_depth = n.max(1);
        self
    }

    pub fn legibility_ratio(mut self, ratio: f64) -> Self {
        self.config.legibility_ratio = ratio;
        self
    }

    pub fn min_readable_run(mut self, n: usize) -> Self {
        self.config.min_readable_run = n.max(1);
        self
    }

    pub fn binary_hex_run(mut self, n: usize) -> Self {
        self.config.binary_hex_run = n;
        self
    }

    pub fn min_hex_run(mut self, n: usize) -> Self {
        self.config.min_hex_run = n;
        self
    }

    pub fn min_spaced_hex_pairs(mut self, n: usize) -> Self {
        self.config.min_spaced_hex_pairs = n;
        self
    }

    pub fn min_decimal_values(mut self, n: usize) -> Self {
        self.config.min_decimal_values = n;
        self
    }

    pub fn document_hex_run(mut self, n: usize) -> Self {
        self.config.document_hex_run = n;
        self
    }

    pub fn document_decimal_values(mut self, n: usize) -> Self {
        self.config.document_decimal_values = n;
        self
    }

    pub fn min_signature_hex(mut self, n: usize) -> Self {
        self.config.min_signature_hex = n.max(4);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScrubConfig, ScrubError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.legibility_ratio) {
            return Err(ScrubError::InvalidConfig(format!(
                "legibility ratio must be 0.0–1.0, got {}",
                c.legibility_ratio
            )));
        }
        let runs = [
            ("binary_hex_run", c.binary_hex_run, 2),
            ("min_hex_run", c.min_hex_run, 2),
            ("min_spaced_hex_pairs", c.min_spaced_hex_pairs, 1),
            ("min_decimal_values", c.min_decimal_values, 1),
            ("document_hex_run", c.document_hex_run, 2),
            ("document_decimal_values", c.document_decimal_values, 1),
            ("min_readable_run", c.min_readable_run, 1),
        ];
        for (name, value, min) in runs {
            if value < min || value > MAX_RUN_THRESHOLD {
                return Err(ScrubError::InvalidConfig(format!(
                    "{name} must be {min}–{MAX_RUN_THRESHOLD}, got {value}"
                )));
            }
        }
        Ok(self.config)
    }
}
