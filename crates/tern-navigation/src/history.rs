//! Back/forward history
//!
//! The list is an ordered run of [`Location`]s with a cursor on the current
//! one. Entries after the cursor are the forward (redo) list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cache::CacheEntry;
use crate::uri::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(Uuid);

impl LocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// View state of one named frame inside a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    pub name: String,
    pub uri: Uri,
    /// Script state from the previous document must not be reused
    pub script_stale: bool,
}

impl FrameView {
    pub fn new(name: impl Into<String>, uri: Uri) -> Self {
        Self {
            name: name.into(),
            uri,
            script_stale: false,
        }
    }
}

/// One entry of the back/forward list.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: LocationId,
    pub uri: Uri,
    pub frames: Vec<FrameView>,
    /// Last content displayed for this entry
    pub content: Option<CacheEntry>,
    pub visited_at: DateTime<Utc>,
}

impl Location {
    pub fn new(uri: Uri) -> Self {
        Self {
            id: LocationId::new(),
            uri,
            frames: Vec::new(),
            content: None,
            visited_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: CacheEntry) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_frame(mut self, frame: FrameView) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn frame(&self, name: &str) -> Option<&FrameView> {
        self.frames.iter().find(|f| f.name == name)
    }

    /// Whether there is something worth showing again after a failed reload.
    pub fn has_displayable_content(&self) -> bool {
        self.content.as_ref().is_some_and(CacheEntry::has_content)
    }
}

/// The history operations the navigation controller relies on.
pub trait History {
    fn current(&self) -> Option<&Location>;

    fn find(&self, id: LocationId) -> Option<&Location>;

    /// Insert `location` right after the cursor and make it current.
    fn push_new(&mut self, location: Location);

    /// Swap the current entry's URI and content, keeping its place.
    fn replace_current_content(&mut self, uri: Uri, content: CacheEntry) -> bool;

    fn move_cursor_to(&mut self, id: LocationId) -> bool;

    fn clear_forward_list(&mut self);

    /// A frame of the current location, for in-frame navigation.
    fn current_frame_mut(&mut self, name: &str) -> Option<&mut FrameView>;

    fn previous(&self) -> Option<LocationId>;

    fn next(&self) -> Option<LocationId>;
}

#[derive(Debug, Default)]
pub struct HistoryList {
    entries: Vec<Location>,
    cursor: Option<usize>,
}

impl HistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Location] {
        &self.entries
    }

    /// Entries behind the cursor that "forward" would revisit.
    pub fn forward_entries(&self) -> &[Location] {
        match self.cursor {
            Some(cursor) => &self.entries[cursor + 1..],
            None => &[],
        }
    }

    fn position(&self, id: LocationId) -> Option<usize> {
        self.entries.iter().position(|loc| loc.id == id)
    }
}

impl History for HistoryList {
    fn current(&self) -> Option<&Location> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    fn find(&self, id: LocationId) -> Option<&Location> {
        self.entries.iter().find(|loc| loc.id == id)
    }

    fn push_new(&mut self, location: Location) {
        let at = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.insert(at, location);
        self.cursor = Some(at);
    }

    fn replace_current_content(&mut self, uri: Uri, content: CacheEntry) -> bool {
        let Some(cursor) = self.cursor else {
            return false;
        };
        let location = &mut self.entries[cursor];
        location.uri = uri;
        location.content = Some(content);
        location.visited_at = Utc::now();
        true
    }

    fn move_cursor_to(&mut self, id: LocationId) -> bool {
        match self.position(id) {
            Some(at) => {
                self.cursor = Some(at);
                true
            }
            None => false,
        }
    }

    fn clear_forward_list(&mut self) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
    }

    fn current_frame_mut(&mut self, name: &str) -> Option<&mut FrameView> {
        let cursor = self.cursor?;
        self.entries[cursor]
            .frames
            .iter_mut()
            .find(|frame| frame.name == name)
    }

    fn previous(&self) -> Option<LocationId> {
        let cursor = self.cursor?;
        cursor
            .checked_sub(1)
            .and_then(|at| self.entries.get(at))
            .map(|loc| loc.id)
    }

    fn next(&self) -> Option<LocationId> {
        let cursor = self.cursor?;
        self.entries.get(cursor + 1).map(|loc| loc.id)
    }
}
