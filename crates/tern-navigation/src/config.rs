//! Navigation configuration

use serde::{Deserialize, Serialize};

/// Redirect hops followed by one navigation before the controller gives up
/// and displays whatever it has.
pub const DEFAULT_MAX_REDIRECTS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Redirect limit for a single navigation
    pub max_redirects: u32,
    /// Ask before following URIs whose user name mimics another host
    pub warn_malicious: bool,
    /// Ask before (re)posting form data
    pub confirm_submit: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            warn_malicious: true,
            confirm_submit: true,
        }
    }
}
