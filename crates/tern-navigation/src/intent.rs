//! What a navigation is for, and how it asked to be loaded

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::history::LocationId;
use crate::uri::Uri;

/// How far a fetch may trust already cached content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Use any cached copy, however old
    Always,
    /// Use a cached copy unless it has expired
    #[default]
    Normal,
    /// Revalidate a cached copy with the server
    CheckIfModified,
    /// Ignore the cache and fetch anew
    ForceReload,
    /// Neither read nor store
    Never,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Always => "always",
            CacheMode::Normal => "normal",
            CacheMode::CheckIfModified => "check_if_modified",
            CacheMode::ForceReload => "force_reload",
            CacheMode::Never => "never",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reason a resource is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationIntent {
    /// Ordinary browsing; produces a new history entry
    Forward,
    /// Load an image map and offer its regions as destinations
    ImageMapFollow,
    /// Return to an existing history entry
    HistoryReplay(LocationId),
    /// Refresh the current entry in place
    Reload,
}

impl NavigationIntent {
    /// The intent a redirect hop continues under.
    ///
    /// Replaying history must not branch the history list, so a replay that
    /// hits a redirect turns into a reload of the replayed entry.
    pub fn on_redirect(self) -> Self {
        match self {
            NavigationIntent::Forward => NavigationIntent::Forward,
            NavigationIntent::ImageMapFollow => NavigationIntent::ImageMapFollow,
            NavigationIntent::HistoryReplay(_) => NavigationIntent::Reload,
            NavigationIntent::Reload => NavigationIntent::Reload,
        }
    }

    /// The history entry this intent operates on, if it names one.
    pub fn target_location(&self) -> Option<LocationId> {
        match self {
            NavigationIntent::HistoryReplay(id) => Some(*id),
            _ => None,
        }
    }

    /// Same variant, ignoring any payload.
    pub fn same_kind(&self, other: &NavigationIntent) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationIntent::Forward => "forward",
            NavigationIntent::ImageMapFollow => "imagemap",
            NavigationIntent::HistoryReplay(_) => "history",
            NavigationIntent::Reload => "reload",
        }
    }
}

impl fmt::Display for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to the navigation controller.
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub uri: Uri,
    /// Name of the frame to load into, if any
    pub target_frame: Option<String>,
    pub cache_mode: CacheMode,
    pub intent: NavigationIntent,
    /// Referrer to send with the first fetch
    pub referrer: Option<Uri>,
    /// Set only when continuing a redirect chain; keeps the redirect counter
    pub redirect_continuation: bool,
}

impl NavigationRequest {
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            target_frame: None,
            cache_mode: CacheMode::Normal,
            intent: NavigationIntent::Forward,
            referrer: None,
            redirect_continuation: false,
        }
    }

    pub fn with_target_frame(mut self, frame: impl Into<String>) -> Self {
        let frame = frame.into();
        self.target_frame = if frame.is_empty() { None } else { Some(frame) };
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn with_intent(mut self, intent: NavigationIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_referrer(mut self, referrer: Option<Uri>) -> Self {
        self.referrer = referrer;
        self
    }
}

/// The active navigation's purpose, kept for as long as its fetch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub intent: NavigationIntent,
    pub target_frame: Option<String>,
    /// History entry being replayed; survives the replay-to-reload remap
    pub target_location: Option<LocationId>,
}

impl Task {
    pub fn new(intent: NavigationIntent, target_frame: Option<String>) -> Self {
        Self {
            intent,
            target_location: intent.target_location(),
            target_frame,
        }
    }

    /// The task a redirect hop continues with, under the remapped `intent`.
    pub fn continue_as(self, intent: NavigationIntent) -> Self {
        Self { intent, ..self }
    }
}
