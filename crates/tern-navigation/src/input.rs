//! Address bar input resolution
//!
//! 1. A URL with a scheme the browser knows is used as is
//! 2. Something that looks like a host gets `https://`
//! 3. Anything else becomes a search

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::net::IpAddr;

use crate::uri::{Protocol, Uri};
use crate::Result;

pub const DEFAULT_SEARCH_ENGINE: &str = "https://duckduckgo.com/?q=%s";

/// Unreserved characters stay readable in the query.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResolution {
    Address(Uri),
    Search(Uri),
}

impl InputResolution {
    pub fn uri(&self) -> &Uri {
        match self {
            InputResolution::Address(uri) | InputResolution::Search(uri) => uri,
        }
    }

    pub fn into_uri(self) -> Uri {
        match self {
            InputResolution::Address(uri) | InputResolution::Search(uri) => uri,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputResolver {
    /// Search URL template, `%s` is replaced with the query
    search_template: String,
}

impl InputResolver {
    pub fn new() -> Self {
        Self {
            search_template: DEFAULT_SEARCH_ENGINE.to_string(),
        }
    }

    pub fn with_search_engine(template: impl Into<String>) -> Self {
        Self {
            search_template: template.into(),
        }
    }

    pub fn set_search_engine(&mut self, template: impl Into<String>) {
        self.search_template = template.into();
    }

    pub fn search_template(&self) -> &str {
        &self.search_template
    }

    /// Resolve user input. Fails only when the search template itself does
    /// not produce a valid URL.
    pub fn resolve(&self, input: &str) -> Result<InputResolution> {
        let input = input.trim();

        if input.is_empty() {
            return Ok(InputResolution::Address(Uri::parse("about:blank")?));
        }

        if let Some(uri) = self.try_parse_url(input) {
            return Ok(InputResolution::Address(uri));
        }

        let encoded = utf8_percent_encode(input, QUERY).to_string();
        let search = Uri::parse(&self.search_template.replace("%s", &encoded))?;
        Ok(InputResolution::Search(search))
    }

    fn try_parse_url(&self, input: &str) -> Option<Uri> {
        // "localhost:8080" parses with a scheme of "localhost", so only
        // schemes we can actually serve count.
        if let Ok(uri) = Uri::parse(input) {
            if uri.protocol() != Protocol::Unknown {
                return Some(uri);
            }
        }

        if !self.looks_like_host(input) {
            return None;
        }

        let (host, rest) = split_host_and_rest(input);
        let with_https = if is_ipv6_host(host) && !host.starts_with('[') {
            format!("https://[{host}]{rest}")
        } else {
            format!("https://{host}{rest}")
        };
        Uri::parse(&with_https).ok()
    }

    fn looks_like_host(&self, input: &str) -> bool {
        if input.contains(char::is_whitespace) {
            return false;
        }

        let (host, _) = split_host_and_rest(input);
        if host == "localhost" || host.starts_with("localhost:") || parse_ip_host(host).is_some() {
            return true;
        }

        // Dotted name whose last label is alphabetic, e.g. "example.com:80".
        let name = host.split(':').next().unwrap_or(host);
        let mut labels = name.split('.');
        let Some(tld) = labels.next_back() else {
            return false;
        };
        labels.next().is_some()
            && (2..=24).contains(&tld.len())
            && tld.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl Default for InputResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_ipv6_host(host: &str) -> bool {
    matches!(parse_ip_host(host), Some(IpAddr::V6(_)))
}

fn parse_ip_host(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }

    let host = if let Some(bracketed) = host.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or(host)
    } else if host.matches(':').count() == 1 {
        host.split(':').next().unwrap_or(host)
    } else {
        host
    };

    host.parse().ok()
}

fn split_host_and_rest(input: &str) -> (&str, &str) {
    let cut = ['/', '?', '#']
        .iter()
        .filter_map(|ch| input.find(*ch))
        .min()
        .unwrap_or(input.len());
    input.split_at(cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(resolver: &InputResolver, input: &str) -> String {
        match resolver.resolve(input).unwrap() {
            InputResolution::Address(uri) => uri.to_string(),
            other => panic!("Expected Address for {input}, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_url() {
        let resolver = InputResolver::new();
        assert_eq!(address(&resolver, "https://example.com"), "https://example.com/");
        assert_eq!(address(&resolver, "example.com"), "https://example.com/");
        assert_eq!(address(&resolver, "localhost:8080"), "https://localhost:8080/");
        assert_eq!(address(&resolver, "mailto:someone@example.org"), "mailto:someone@example.org");
        assert_eq!(address(&resolver, ""), "about:blank");
    }

    #[test]
    fn test_resolve_search() {
        let resolver = InputResolver::new();
        match resolver.resolve("rust programming").unwrap() {
            InputResolution::Search(uri) => {
                assert_eq!(uri.host(), Some("duckduckgo.com"));
                assert!(uri.as_str().contains("rust%20programming"));
            }
            other => panic!("Expected Search, got {other:?}"),
        }

        let custom = InputResolver::with_search_engine("https://search.example/find?term=%s");
        let resolved = custom.resolve("a&b").unwrap().into_uri();
        assert_eq!(resolved.as_str(), "https://search.example/find?term=a%26b");
    }

    #[test]
    fn test_resolve_ipv6() {
        let resolver = InputResolver::new();
        assert_eq!(address(&resolver, "::1"), "https://[::1]/");
        assert_eq!(address(&resolver, "[::1]:8080"), "https://[::1]:8080/");
        assert_eq!(address(&resolver, "2001:db8::1/path"), "https://[2001:db8::1]/path");
    }

    #[test]
    fn test_unknown_scheme_is_searched() {
        let resolver = InputResolver::new();
        assert!(matches!(
            resolver.resolve("what is this").unwrap(),
            InputResolution::Search(_)
        ));
        assert!(matches!(
            resolver.resolve("version.1").unwrap(),
            InputResolution::Search(_)
        ));
    }
}
