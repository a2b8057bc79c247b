//! Browser configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use tern_navigation::{NavigationConfig, DEFAULT_SEARCH_ENGINE};

pub const DEFAULT_USER_AGENT: &str = concat!("Tern/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Start page; `WWW_HOME` is used when unset
    pub homepage: Option<String>,
    /// Search engine URL template
    pub search_engine: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Scheme to command line, `%s` stands for the URL
    pub external_handlers: BTreeMap<String, String>,
    pub navigation: NavigationConfig,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        let mut external_handlers = BTreeMap::new();
        external_handlers.insert("mailto".to_string(), "xdg-open %s".to_string());

        Self {
            database_path: data_dir.join("tern.db"),
            homepage: None,
            search_engine: DEFAULT_SEARCH_ENGINE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            external_handlers,
            navigation: NavigationConfig::default(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("tern"))
            .unwrap_or_else(|| PathBuf::from(".tern"))
    }

    /// The page `home` goes to.
    pub fn start_page(&self) -> String {
        self.homepage
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| std::env::var("WWW_HOME").ok().filter(|h| !h.trim().is_empty()))
            .unwrap_or_else(|| "about:blank".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
