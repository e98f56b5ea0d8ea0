use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use gpui::{Image, ImageFormat};

use crate::chat::data_uri::DataUri;

/// Content hash of a data URI.
///
/// Computed once when the URI enters the UI (ingest, or a new conversation snapshot) so
/// rendering never rehashes the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageKey(u64);

impl ImageKey {
    pub fn of(data_uri: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        data_uri.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Decoded images keyed by [`ImageKey`].
///
/// Failed decodes are cached as `None` so a format GPUI cannot paint is parsed at most once.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<ImageKey, Option<Arc<Image>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `None` for malformed URIs and formats GPUI cannot paint.
    pub fn image_for(&mut self, key: ImageKey, data_uri: &str) -> Option<Arc<Image>> {
        self.entries
            .entry(key)
            .or_insert_with(|| decode(data_uri))
            .clone()
    }

    /// Drops every entry whose key is not in `live`.
    pub fn retain(&mut self, live: impl IntoIterator<Item = ImageKey>) {
        let live = live.into_iter().collect::<HashSet<_>>();
        self.entries.retain(|key, _| live.contains(key));
    }
}

fn decode(data_uri: &str) -> Option<Arc<Image>> {
    let Some(decoded) = DataUri::parse(data_uri) else {
        tracing::debug!("malformed data uri for preview");
        return None;
    };
    let Some(format) = ImageFormat::from_mime_type(&decoded.mime) else {
        tracing::debug!(mime = %decoded.mime, "unsupported image format for preview");
        return None;
    };

    Some(Arc::new(Image::from_bytes(format, decoded.bytes)))
}
