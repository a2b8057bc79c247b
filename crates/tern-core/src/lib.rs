//! Tern Core
//!
//! Ties the navigation controller to real collaborators: an HTTP transport,
//! an in-memory cache, external protocol handlers and the SQLite-backed
//! settings and visit log.

mod browser;
mod cache;
mod config;
mod error;
mod external;
mod prompter;
mod transport;

pub use browser::{document_title, Browser};
pub use cache::MemoryCache;
pub use config::{Config, DEFAULT_USER_AGENT};
pub use error::CoreError;
pub use external::CommandHandlers;
pub use prompter::QueuedPrompter;
pub use transport::HttpTransport;

// Re-export the pieces front ends work with
pub use tern_navigation::{
    Answer, CacheMode, ConfirmReason, ConfirmationId, ConfirmationPrompt, ImageMapChoice,
    LoadError, Location, LocationId, NavigationConfig, NavigationError, NavigationEvent, Uri,
    Visit, VisitLog,
};
pub use tern_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
