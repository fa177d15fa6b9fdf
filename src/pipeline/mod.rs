//! Pipeline stages for fragment scrubbing.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ strip ──▶ sanitize ──▶ repair   (display text)
//! decode ────┤
//!            └─▶ image ──▶ encode                (embedded picture)
//! ```
//!
//! 1. [`decode`]  : resolve bytes vs. text and detect markup
//! 2. [`strip`]   : control words and escapes → plain text, with a
//!    simplified fallback for documents the precise pass refuses
//! 3. [`sanitize`]: drop noise, leaked artifacts and binary tails
//! 4. [`repair`]  : punctuation folding, Unicode repair, ASCII rendition
//! 5. [`image`]   : find and decode an embedded PNG/JPEG from the
//!    byte-faithful view of the raw input
//! 6. [`encode`]  : data URIs, probing and alpha flattening of found images

pub mod decode;
pub mod encode;
pub mod image;
pub mod repair;
pub mod sanitize;
pub mod strip;
