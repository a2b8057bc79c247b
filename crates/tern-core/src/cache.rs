//! In-memory document cache
//!
//! Shared between the transport, which fills it, and the navigation
//! controller, which consults it before asking for confirmation.

use parking_lot::RwLock;
use std::collections::HashMap;

use tern_navigation::{Cache, CacheEntry, CacheMode, Uri};

/// Entries are keyed by URL without the fragment. Form submissions are
/// never stored.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

fn key(uri: &Uri) -> String {
    let mut url = uri.url().clone();
    url.set_fragment(None);
    url.into()
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: CacheEntry) {
        if entry.uri.has_post() {
            return;
        }
        self.entries.write().insert(key(&entry.uri), entry);
    }

    pub fn remove(&self, uri: &Uri) -> Option<CacheEntry> {
        self.entries.write().remove(&key(uri))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Cache for MemoryCache {
    fn lookup(&self, uri: &Uri) -> Option<CacheEntry> {
        if uri.has_post() {
            return None;
        }
        self.entries.read().get(&key(uri)).cloned()
    }

    fn is_valid(&self, entry: &CacheEntry, mode: CacheMode) -> bool {
        match mode {
            CacheMode::Always => true,
            CacheMode::Normal => !entry.incomplete,
            CacheMode::CheckIfModified | CacheMode::ForceReload | CacheMode::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_navigation::PostData;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn test_fragment_is_ignored() {
        let cache = MemoryCache::new();
        cache.insert(CacheEntry::new(uri("http://a.example/page"), b"hi".to_vec()));

        assert!(cache.lookup(&uri("http://a.example/page#section")).is_some());
        assert!(cache.validated(&uri("http://a.example/page"), CacheMode::Normal).is_some());
        assert!(cache.validated(&uri("http://a.example/page"), CacheMode::ForceReload).is_none());
    }

    #[test]
    fn test_incomplete_entries_need_always() {
        let cache = MemoryCache::new();
        cache.insert(CacheEntry::new(uri("http://a.example/"), b"par".to_vec()).mark_incomplete());

        assert!(cache.validated(&uri("http://a.example/"), CacheMode::Normal).is_none());
        assert!(cache.validated(&uri("http://a.example/"), CacheMode::Always).is_some());
    }

    #[test]
    fn test_posts_are_not_cached() {
        let cache = MemoryCache::new();
        let form = uri("http://a.example/submit").with_post(PostData::form("a=1"));
        cache.insert(CacheEntry::new(form.clone(), b"ok".to_vec()));
        assert!(cache.is_empty());
        assert!(cache.lookup(&form).is_none());

        cache.insert(CacheEntry::new(uri("http://a.example/"), b"x".to_vec()));
        assert_eq!(cache.len(), 1);
        assert!(cache.remove(&uri("http://a.example/")).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
