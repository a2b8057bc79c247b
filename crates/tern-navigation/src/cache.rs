//! Seam to the content cache
//!
//! Storage and eviction live elsewhere; the controller only looks entries
//! up and asks whether one may be used under a given [`CacheMode`].

use std::sync::Arc;

use crate::intent::CacheMode;
use crate::uri::Uri;

/// A cached representation of a fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub uri: Uri,
    /// Where the server redirected to, if this entry is a redirect
    pub redirect: Option<Uri>,
    /// The body was cut short (transfer still running or aborted)
    pub incomplete: bool,
    pub content_type: Option<String>,
    pub content: Arc<[u8]>,
}

impl CacheEntry {
    pub fn new(uri: Uri, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            uri,
            redirect: None,
            incomplete: false,
            content_type: None,
            content: content.into(),
        }
    }

    pub fn redirect(uri: Uri, target: Uri) -> Self {
        Self {
            uri,
            redirect: Some(target),
            incomplete: false,
            content_type: None,
            content: Arc::from(Vec::new()),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn mark_incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

pub trait Cache {
    fn lookup(&self, uri: &Uri) -> Option<CacheEntry>;

    fn is_valid(&self, entry: &CacheEntry, mode: CacheMode) -> bool;

    /// An entry that satisfies `uri` under `mode` without refetching.
    fn validated(&self, uri: &Uri, mode: CacheMode) -> Option<CacheEntry> {
        self.lookup(uri).filter(|entry| self.is_valid(entry, mode))
    }
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
    fn lookup(&self, uri: &Uri) -> Option<CacheEntry> {
        (**self).lookup(uri)
    }

    fn is_valid(&self, entry: &CacheEntry, mode: CacheMode) -> bool {
        (**self).is_valid(entry, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneEntry(CacheEntry);

    impl Cache for OneEntry {
        fn lookup(&self, uri: &Uri) -> Option<CacheEntry> {
            self.0.uri.same_resource(uri).then(|| self.0.clone())
        }

        fn is_valid(&self, entry: &CacheEntry, mode: CacheMode) -> bool {
            !entry.incomplete && matches!(mode, CacheMode::Always | CacheMode::Normal)
        }
    }

    #[test]
    fn test_validated_respects_mode() {
        let uri = Uri::parse("http://a.example/").unwrap();
        let cache = OneEntry(CacheEntry::new(uri.clone(), b"hi".to_vec()));

        assert!(cache.validated(&uri, CacheMode::Normal).is_some());
        assert!(cache.validated(&uri, CacheMode::ForceReload).is_none());
    }

    #[test]
    fn test_redirect_entry() {
        let from = Uri::parse("http://a.example/").unwrap();
        let to = Uri::parse("http://b.example/").unwrap();
        let entry = CacheEntry::redirect(from, to.clone());
        assert!(entry.is_redirect());
        assert!(!entry.has_content());
        assert_eq!(entry.redirect, Some(to));
    }
}
