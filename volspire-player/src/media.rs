//! Media metadata lookup
//!
//! The engine only knows tracks by [`TrackId`]. A [`MediaResolver`] maps an
//! identifier to its display metadata and, crucially, its audio URL.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use volspire_common::{MediaMeta, TrackId};

pub trait MediaResolver: Send + Sync {
    /// Metadata for `track`, or None if it is unknown
    fn resolve(&self, track: &TrackId) -> Option<MediaMeta>;

    /// Audio URL for `track`, if it has one
    fn audio_url(&self, track: &TrackId) -> Option<String> {
        self.resolve(track).and_then(|meta| meta.audio_url)
    }
}

/// In-memory resolver that can be extended while the engine runs
#[derive(Debug, Default)]
pub struct MediaCatalog {
    entries: RwLock<HashMap<TrackId, MediaMeta>>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(self, track: impl Into<TrackId>, meta: MediaMeta) -> Self {
        self.insert(track, meta);
        self
    }

    /// Add or replace the entry for `track`
    pub fn insert(&self, track: impl Into<TrackId>, meta: MediaMeta) {
        let track = track.into();
        debug!("Catalog entry for {}: {}", track, meta.title);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(track, meta);
    }

    pub fn remove(&self, track: &TrackId) -> Option<MediaMeta> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(track)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaResolver for MediaCatalog {
    fn resolve(&self, track: &TrackId) -> Option<MediaMeta> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(track)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_and_unknown() {
        let catalog = MediaCatalog::new()
            .with("a", MediaMeta::new("Song A").with_audio_url("sim://a"))
            .with("b", MediaMeta::new("Song B"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.audio_url(&"a".into()).as_deref(), Some("sim://a"));
        // Known but without audio
        assert_eq!(catalog.audio_url(&"b".into()), None);
        assert!(catalog.resolve(&"c".into()).is_none());
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let catalog = MediaCatalog::new();
        catalog.insert("a", MediaMeta::new("Old"));
        catalog.insert("a", MediaMeta::new("New").with_audio_url("sim://a"));
        assert_eq!(catalog.resolve(&"a".into()).unwrap().title, "New");

        assert!(catalog.remove(&"a".into()).is_some());
        assert!(catalog.is_empty());
    }
}
