//! History integrator
//!
//! Puts a settled navigation where it belongs: a frame of the current page,
//! a new history entry, the current entry refreshed in place, or a list of
//! image-map destinations.

use crate::cache::CacheEntry;
use crate::history::{History, Location, LocationId};
use crate::imagemap::{parse_image_map, ImageMapChoice};
use crate::intent::{NavigationIntent, Task};
use crate::uri::Uri;

/// What the integrator did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Loaded into a frame of the current location
    FrameUpdated { frame: String, uri: Uri },
    /// Became a new current history entry
    Pushed(LocationId),
    /// Refreshed an existing entry in place
    Replaced(LocationId),
    /// The cursor moved back or forward to an existing entry
    Moved(LocationId),
    /// Regions of an image map for the user to choose from
    ImageMap(Vec<ImageMapChoice>),
}

/// Apply a displayed result for `task`. `uri` is the navigation's own URI,
/// which the new or refreshed location takes over.
pub fn integrate(history: &mut dyn History, task: &Task, uri: Uri, entry: CacheEntry) -> Applied {
    match task.intent {
        NavigationIntent::Forward => forward(history, task, uri, entry),
        NavigationIntent::Reload => reload(history, task, uri, entry),
        NavigationIntent::HistoryReplay(target) => replay(history, target, uri, entry),
        NavigationIntent::ImageMapFollow => {
            let choices = parse_image_map(&uri, &entry.text(), task.target_frame.as_deref());
            Applied::ImageMap(choices)
        }
    }
}

fn forward(history: &mut dyn History, task: &Task, uri: Uri, entry: CacheEntry) -> Applied {
    if let Some(name) = task.target_frame.as_deref() {
        if let Some(frame) = history.current_frame_mut(name) {
            frame.uri = uri.clone();
            frame.script_stale = true;
            return Applied::FrameUpdated {
                frame: name.to_string(),
                uri,
            };
        }
        tracing::debug!(frame = name, "Target frame not found, loading as a new location");
    }

    let location = Location::new(uri).with_content(entry);
    let id = location.id;
    history.push_new(location);
    // A new branch: whatever was ahead of us is unreachable now.
    history.clear_forward_list();
    Applied::Pushed(id)
}

fn reload(history: &mut dyn History, task: &Task, uri: Uri, entry: CacheEntry) -> Applied {
    if let Some(target) = task.target_location {
        if !history.move_cursor_to(target) {
            tracing::debug!(location = %target, "Replayed location vanished, reloading current");
        }
    }

    let current = history.current().map(|loc| loc.id);
    match current {
        Some(id) if history.replace_current_content(uri.clone(), entry.clone()) => {
            Applied::Replaced(id)
        }
        _ => push_without_branching(history, uri, entry),
    }
}

fn replay(history: &mut dyn History, target: LocationId, uri: Uri, entry: CacheEntry) -> Applied {
    if history.move_cursor_to(target) {
        history.replace_current_content(uri, entry);
        return Applied::Moved(target);
    }
    tracing::debug!(location = %target, "Replayed location vanished, adding it back");
    push_without_branching(history, uri, entry)
}

fn push_without_branching(history: &mut dyn History, uri: Uri, entry: CacheEntry) -> Applied {
    let location = Location::new(uri).with_content(entry);
    let id = location.id;
    history.push_new(location);
    Applied::Pushed(id)
}
