//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn ScrubProgressCallback>`] via
//! [`crate::config::ScrubConfigBuilder::progress_callback`] to receive events
//! while [`crate::convert::scrub_files`] works through a batch.
//!
//! # Example
//!
//! ```rust
//! use rtfscrub::{ScrubProgressCallback, ScrubConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ScrubProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, path: &Path, text_len: usize, has_image: bool) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} done ({} chars, image: {})", path.display(), text_len, has_image);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ScrubConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScrubProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch layer as it processes each file.
///
/// Files are processed concurrently, so the per-file methods may be called
/// from different threads at once. All methods default to no-ops.
pub trait ScrubProgressCallback: Send + Sync {
    /// Called once before any file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is read.
    fn on_file_start(&self, path: &Path) {
        let _ = path;
    }

    /// Called when a file was scrubbed.
    ///
    /// # Arguments
    /// * `text_len` : byte length of the extracted display text
    /// * `has_image`: whether an embedded picture was found
    fn on_file_complete(&self, path: &Path, text_len: usize, has_image: bool) {
        let _ = (path, text_len, has_image);
    }

    /// Called when a file could not be read.
    fn on_file_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScrubProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScrubConfig`].
pub type ProgressCallback = Arc<dyn ScrubProgressCallback>;
