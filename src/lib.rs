//! # rtfscrub
//!
//! Recover display text and embedded pictures from legacy rich-text (RTF)
//! fragments.
//!
//! ## Why this crate?
//!
//! Rich-text fragments stored in old databases are rarely clean. The same
//! column holds bytes in one row and text in the next, mixes UTF-8 with
//! Latin-1, carries leaked font tables and field instructions, and sometimes
//! has an entire attachment dumped into it as hex. A full RTF parser chokes
//! on most of that. This crate takes the opposite approach: a small set of
//! ordered, total passes that always produce *something*, and say so when
//! the something is best-effort.
//!
//! ## Pipeline Overview
//!
//! ```text
//! fragment (bytes | text | absent)
//!  │
//!  ├─ 1. Decode    UTF-8, else Latin-1; detect `{\rtf`
//!  ├─ 2. Strip     escapes → chars, control words → spaces
//!  ├─ 3. Sanitize  noise, artifacts, HYPERLINK fields, binary tails
//!  ├─ 4. Repair    punctuation, doubled accents, optional ASCII
//!  │
//!  └─ Image        \pict groups: \bin, hex, spaced hex, decimal
//!                  → whole document → signature scan → PNG/JPEG
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rtfscrub::{extract_image, extract_text};
//!
//! let text = extract_text(r"{\rtf1\ansi Ol\'e1 mundo}");
//! assert_eq!(text.into_text(), "Olá mundo");
//!
//! assert!(extract_image("no picture here").is_none());
//! ```
//!
//! Non-default thresholds go through a [`Scrubber`]:
//!
//! ```rust
//! use rtfscrub::{ScrubConfig, Scrubber};
//!
//! let config = ScrubConfig::builder().legibility_ratio(0.3).build().unwrap();
//! let scrubber = Scrubber::new(config).unwrap();
//! let text = scrubber.extract_text(b"plain bytes".as_slice());
//! assert_eq!(text.into_text(), "plain bytes");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rtfscrub` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! rtfscrub = { version = "0.5", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{ImageCache, MemoryImageCache};
pub use config::{ScrubConfig, ScrubConfigBuilder};
pub use convert::{
    extract_image, extract_text, extract_text_ascii, inspect, locate_image, scrub_bytes,
    scrub_file, scrub_files, write_image, Scrubber,
};
pub use error::{Degradation, ScrubError};
pub use output::{
    DocumentReport, ExtractedImage, Extraction, ImageInfo, ImageMatch, ImageMime, ImageStrategy,
    ImageSummary, ScrubbedFile,
};
pub use pipeline::decode::Fragment;
pub use pipeline::encode::{flatten_alpha, probe, to_data_uri};
pub use pipeline::repair::to_ascii;
pub use progress::{NoopProgressCallback, ProgressCallback, ScrubProgressCallback};
