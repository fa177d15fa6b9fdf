//! Caller-owned image cache.
//!
//! The engine itself keeps no state. Callers that scrub the same fragment
//! repeatedly (a list view asking "does this record have a picture?" on
//! every render) plug in an [`ImageCache`] keyed by a content digest they
//! compute themselves. [`crate::Scrubber::has_image_cached`] and
//! [`crate::Scrubber::extract_image_cached`] consult it before scanning and
//! record what they find.

use crate::output::ExtractedImage;
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage for image lookups. Keys are opaque to the engine.
///
/// Only the presence flag is required; implementations that can hold the
/// decoded bytes override [`ImageCache::image`] and [`ImageCache::store_image`].
pub trait ImageCache: Send + Sync {
    /// Cached answer to "does this fragment carry an image?", if known.
    fn has_image(&self, key: &str) -> Option<bool>;

    fn set_has_image(&self, key: &str, present: bool);

    fn image(&self, key: &str) -> Option<ExtractedImage> {
        let _ = key;
        None
    }

    fn store_image(&self, key: &str, image: &ExtractedImage) {
        let _ = (key, image);
    }
}

#[derive(Debug, Default)]
struct Entry {
    present: Option<bool>,
    image: Option<ExtractedImage>,
}

/// In-process [`ImageCache`] behind a mutex. Unbounded; meant for batch
/// runs and tests, not long-lived servers.
#[derive(Debug, Default)]
pub struct MemoryImageCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entry(&self, key: &str, f: impl FnOnce(&mut Entry)) {
        if let Ok(mut map) = self.entries.lock() {
            f(map.entry(key.to_string()).or_default());
        }
    }
}

impl ImageCache for MemoryImageCache {
    fn has_image(&self, key: &str) -> Option<bool> {
        self.entries.lock().ok()?.get(key)?.present
    }

    fn set_has_image(&self, key: &str, present: bool) {
        self.with_entry(key, |e| {
            e.present = Some(present);
            if !present {
                e.image = None;
            }
        });
    }

    fn image(&self, key: &str) -> Option<ExtractedImage> {
        self.entries.lock().ok()?.get(key)?.image.clone()
    }

    fn store_image(&self, key: &str, image: &ExtractedImage) {
        self.with_entry(key, |e| {
            e.present = Some(true);
            e.image = Some(image.clone());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_none() {
        let cache = MemoryImageCache::new();
        assert_eq!(cache.has_image("k"), None);
        assert!(cache.image("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn flag_round_trips() {
        let cache = MemoryImageCache::new();
        cache.set_has_image("a", false);
        cache.set_has_image("b", true);
        assert_eq!(cache.has_image("a"), Some(false));
        assert_eq!(cache.has_image("b"), Some(true));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn storing_image_sets_flag() {
        let cache = MemoryImageCache::new();
        let img = ExtractedImage::from_bytes(vec![0xFF, 0xD8, 0xFF]).unwrap();
        cache.store_image("k", &img);
        assert_eq!(cache.has_image("k"), Some(true));
        assert_eq!(cache.image("k"), Some(img));
    }

    #[test]
    fn clearing_flag_drops_image() {
        let cache = MemoryImageCache::new();
        let img = ExtractedImage::from_bytes(vec![0xFF, 0xD8, 0xFF]).unwrap();
        cache.store_image("k", &img);
        cache.set_has_image("k", false);
        assert!(cache.image("k").is_none());
    }

    struct FlagOnly(Mutex<Option<bool>>);

    impl ImageCache for FlagOnly {
        fn has_image(&self, _key: &str) -> Option<bool> {
            *self.0.lock().unwrap()
        }

        fn set_has_image(&self, _key: &str, present: bool) {
            *self.0.lock().unwrap() = Some(present);
        }
    }

    #[test]
    fn default_image_methods_are_noops() {
        let cache = FlagOnly(Mutex::new(None));
        let img = ExtractedImage::from_bytes(vec![0xFF, 0xD8, 0xFF]).unwrap();
        cache.store_image("k", &img);
        assert!(cache.image("k").is_none());
        assert_eq!(cache.has_image("k"), None);
    }
}
