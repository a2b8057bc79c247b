//! Tern Storage Layer
//!
//! SQLite-backed persistence for browser state that outlives a session:
//! the global visit log and user settings.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
