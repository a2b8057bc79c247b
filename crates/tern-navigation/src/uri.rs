//! Resource identifiers
//!
//! A [`Uri`] is a cheap, reference-counted handle: cloning it hands out
//! another owner of the same parsed URL and optional POST body. Whoever
//! holds the last clone releases it, so a navigation's URI is released
//! exactly once no matter which path (display, error, abort) consumes it.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::NavigationError;
use crate::Result;

/// Form data submitted with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostData {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl PostData {
    pub fn form(body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: "application/x-www-form-urlencoded".to_string(),
            body: body.into(),
        }
    }
}

/// How a scheme is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Fetched by the transport layer
    Builtin,
    /// Recognised, but handed to an external program
    External,
    /// Not recognised at all
    Unknown,
}

const BUILTIN_SCHEMES: &[&str] = &[
    "http", "https", "file", "about", "data", "ftp", "gopher", "finger",
];
const EXTERNAL_SCHEMES: &[&str] = &["mailto", "telnet", "tn3270", "news", "irc"];

#[derive(Debug, PartialEq, Eq)]
struct UriInner {
    url: Url,
    post: Option<PostData>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Uri {
    inner: Arc<UriInner>,
}

impl Uri {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| NavigationError::InvalidUrl(format!("{input}: {e}")))?;
        Ok(Self::from_url(url))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            inner: Arc::new(UriInner { url, post: None }),
        }
    }

    /// A new URI carrying `post` as its request body.
    pub fn with_post(&self, post: PostData) -> Self {
        Self {
            inner: Arc::new(UriInner {
                url: self.inner.url.clone(),
                post: Some(post),
            }),
        }
    }

    pub fn without_post(&self) -> Self {
        if self.inner.post.is_none() {
            return self.clone();
        }
        Self::from_url(self.inner.url.clone())
    }

    /// Resolve a (possibly relative) reference against this URI.
    pub fn join(&self, reference: &str) -> Result<Self> {
        self.inner
            .url
            .join(reference.trim())
            .map(Self::from_url)
            .map_err(|e| NavigationError::InvalidUrl(format!("{reference}: {e}")))
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn as_str(&self) -> &str {
        self.inner.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.inner.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.inner.url.host_str()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.inner.url.fragment()
    }

    pub fn post(&self) -> Option<&PostData> {
        self.inner.post.as_ref()
    }

    pub fn has_post(&self) -> bool {
        self.inner.post.is_some()
    }

    pub fn protocol(&self) -> Protocol {
        let scheme = self.scheme();
        if BUILTIN_SCHEMES.contains(&scheme) {
            Protocol::Builtin
        } else if EXTERNAL_SCHEMES.contains(&scheme) {
            Protocol::External
        } else {
            Protocol::Unknown
        }
    }

    /// The user name, percent-decoded for display. `None` when absent.
    pub fn user_for_display(&self) -> Option<String> {
        let user = self.inner.url.username();
        if user.is_empty() {
            return None;
        }
        Some(percent_decode_str(user).decode_utf8_lossy().into_owned())
    }

    /// The URI as shown to users: password stripped.
    pub fn public_string(&self) -> String {
        if self.inner.url.password().is_none() {
            return self.as_str().to_string();
        }
        let mut url = self.inner.url.clone();
        // Only fails for cannot-be-a-base URLs, which never carry a password.
        let _ = url.set_password(None);
        url.to_string()
    }

    /// Partial equality used to recognise a request that is already in
    /// flight: scheme, host, port, path, query and body must match; the
    /// fragment and credentials are ignored.
    pub fn same_resource(&self, other: &Uri) -> bool {
        let (a, b) = (&self.inner.url, &other.inner.url);
        a.scheme() == b.scheme()
            && a.host_str() == b.host_str()
            && a.port_or_known_default() == b.port_or_known_default()
            && a.path() == b.path()
            && a.query() == b.query()
            && self.inner.post == other.inner.post
    }

    /// Whether both handles share one allocation.
    pub fn ptr_eq(&self, other: &Uri) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_tuple("Uri");
        s.field(&self.as_str());
        if self.has_post() {
            s.field(&"<post>");
        }
        s.finish()
    }
}

impl std::str::FromStr for Uri {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
