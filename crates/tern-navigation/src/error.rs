//! Navigation error types

use thiserror::Error;

use crate::fetch::{Priority, TransportError};
use crate::history::LocationId;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown history location: {0}")]
    UnknownLocation(LocationId),

    #[error("No current location")]
    NoCurrentLocation,

    #[error("Unknown confirmation: {0}")]
    UnknownConfirmation(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] tern_storage::StorageError),
}

/// A load failure surfaced to the presentation layer.
///
/// Carries the originating URI and the priority the fetch ran at so the
/// caller can word a precise message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Unsupported or malformed URL: {uri}")]
    BadUri { uri: String, priority: Priority },

    #[error("{error}")]
    Transport {
        error: TransportError,
        priority: Priority,
    },
}

impl LoadError {
    pub fn uri(&self) -> &str {
        match self {
            LoadError::BadUri { uri, .. } => uri,
            LoadError::Transport { error, .. } => error.uri.as_str(),
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            LoadError::BadUri { priority, .. } | LoadError::Transport { priority, .. } => *priority,
        }
    }
}
