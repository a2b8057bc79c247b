//! Confirmation policy
//!
//! Decides, without side effects, whether a navigation needs a yes/no from
//! the user before it may start.

use std::fmt;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::NavigationConfig;
use crate::intent::{CacheMode, NavigationIntent};
use crate::uri::Uri;

/// Generic top-level labels that make a user name look like a host name.
pub const KNOWN_TLDS: &[&str] = &[
    "com", "edu", "net", "org", "gov", "mil", "int", "biz", "arpa", "aero", "coop", "info",
    "museum", "name", "pro",
];

/// Decides whether a token from a URI's user name reads like a domain.
pub trait DomainHeuristic: Send + Sync {
    fn looks_like_domain(&self, token: &str) -> bool;
}

/// Flags dotted tokens in which a label after the first is a known
/// top-level label, e.g. `paypal.com.evil-host`.
#[derive(Debug, Clone)]
pub struct KnownTldHeuristic {
    tlds: Vec<String>,
}

impl KnownTldHeuristic {
    pub fn new() -> Self {
        Self::with_tlds(KNOWN_TLDS.iter().copied())
    }

    pub fn with_tlds<I, S>(tlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tlds: tlds
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_tld(&self, label: &str) -> bool {
        self.tlds.iter().any(|t| t.eq_ignore_ascii_case(label))
    }
}

impl Default for KnownTldHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainHeuristic for KnownTldHeuristic {
    fn looks_like_domain(&self, token: &str) -> bool {
        token
            .split('.')
            .skip(1)
            .any(|label| !label.is_empty() && self.is_tld(label))
    }
}

/// Whether the decoded user name contains something posing as a host.
pub fn user_impersonates_host(user: &str, heuristic: &dyn DomainHeuristic) -> bool {
    user.split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        .filter(|token| !token.is_empty())
        .any(|token| heuristic.looks_like_domain(token))
}

/// Why the user is being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmReason {
    /// The user name mimics another host
    Impersonation { host: String, user: String },
    /// A redirect wants the form data posted again
    RedirectPost,
    /// The page holding the form never finished loading
    IncompleteReferrer,
    /// First submission of form data
    Post,
    /// Form data is being sent again (history or reload)
    Repost,
}

/// What declining a prompt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineAction {
    /// Drop the navigation and leave everything as it was
    Abandon,
    /// Reload the page currently shown
    ReloadCurrent,
}

impl ConfirmReason {
    pub fn is_post_resubmission(&self) -> bool {
        !matches!(self, ConfirmReason::Impersonation { .. })
    }

    pub fn on_decline(&self) -> DeclineAction {
        if self.is_post_resubmission() {
            DeclineAction::ReloadCurrent
        } else {
            DeclineAction::Abandon
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub reason: ConfirmReason,
    pub uri: Uri,
}

impl ConfirmationPrompt {
    pub fn title(&self) -> &'static str {
        "Warning"
    }

    pub fn message(&self) -> String {
        let target = self.uri.public_string();
        match &self.reason {
            ConfirmReason::Impersonation { host, user } => format!(
                "The URL you are about to follow might be maliciously crafted in order to \
                 confuse you. By following the URL you will be connecting to host \"{host}\" \
                 as user \"{user}\".\n\nDo you want to go to URL {target}?"
            ),
            ConfirmReason::RedirectPost => {
                format!("Do you want to follow the redirect and post form data to URL {target}?")
            }
            ConfirmReason::IncompleteReferrer => format!(
                "The form data you are about to post might be incomplete.\n\
                 Do you want to post to URL {target}?"
            ),
            ConfirmReason::Post => format!("Do you want to post form data to URL {target}?"),
            ConfirmReason::Repost => format!("Do you want to repost form data to URL {target}?"),
        }
    }
}

impl fmt::Display for ConfirmationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    AskConfirmation(ConfirmationPrompt),
}

/// Everything the policy looks at for one navigation.
pub struct ConfirmContext<'a> {
    pub uri: &'a Uri,
    pub intent: &'a NavigationIntent,
    pub cache_mode: CacheMode,
    pub redirect_continuation: bool,
    /// The page the navigation came from
    pub referrer: Option<&'a Uri>,
    pub cache: &'a dyn Cache,
}

#[derive(Clone)]
pub struct ConfirmationPolicy {
    warn_malicious: bool,
    confirm_submit: bool,
    heuristic: Arc<dyn DomainHeuristic>,
}

impl ConfirmationPolicy {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            warn_malicious: config.warn_malicious,
            confirm_submit: config.confirm_submit,
            heuristic: Arc::new(KnownTldHeuristic::new()),
        }
    }

    /// Pick up changed settings, keeping the heuristic.
    pub fn configure(&mut self, config: &NavigationConfig) {
        self.warn_malicious = config.warn_malicious;
        self.confirm_submit = config.confirm_submit;
    }

    pub fn with_heuristic(mut self, heuristic: Arc<dyn DomainHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn evaluate(&self, ctx: &ConfirmContext<'_>) -> Decision {
        if let Some(reason) = self.impersonation(ctx.uri) {
            return self.ask(ctx, reason);
        }

        if !(ctx.uri.has_post() && self.confirm_submit) {
            return Decision::Proceed;
        }

        let referrer_incomplete = ctx
            .referrer
            .and_then(|referrer| ctx.cache.lookup(referrer))
            .is_some_and(|entry| entry.incomplete);

        let reason = if ctx.redirect_continuation {
            ConfirmReason::RedirectPost
        } else if referrer_incomplete {
            ConfirmReason::IncompleteReferrer
        } else if matches!(
            ctx.intent,
            NavigationIntent::HistoryReplay(_) | NavigationIntent::Reload
        ) {
            ConfirmReason::Repost
        } else if ctx.cache.validated(ctx.uri, ctx.cache_mode).is_none() {
            if *ctx.intent == NavigationIntent::Forward {
                ConfirmReason::Post
            } else {
                ConfirmReason::Repost
            }
        } else {
            return Decision::Proceed;
        };

        self.ask(ctx, reason)
    }

    fn impersonation(&self, uri: &Uri) -> Option<ConfirmReason> {
        if !self.warn_malicious {
            return None;
        }
        let user = uri.user_for_display()?;
        if !user_impersonates_host(&user, self.heuristic.as_ref()) {
            return None;
        }
        Some(ConfirmReason::Impersonation {
            host: uri.host().unwrap_or_default().to_string(),
            user,
        })
    }

    fn ask(&self, ctx: &ConfirmContext<'_>, reason: ConfirmReason) -> Decision {
        Decision::AskConfirmation(ConfirmationPrompt {
            reason,
            uri: ctx.uri.clone(),
        })
    }
}

impl fmt::Debug for ConfirmationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationPolicy")
            .field("warn_malicious", &self.warn_malicious)
            .field("confirm_submit", &self.confirm_submit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::history::LocationId;
    use crate::uri::PostData;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapCache(HashMap<String, CacheEntry>);

    impl MapCache {
        fn insert(&mut self, entry: CacheEntry) {
            self.0.insert(entry.uri.as_str().to_string(), entry);
        }
    }

    impl Cache for MapCache {
        fn lookup(&self, uri: &Uri) -> Option<CacheEntry> {
            self.0.get(uri.as_str()).cloned()
        }

        fn is_valid(&self, entry: &CacheEntry, _mode: CacheMode) -> bool {
            !entry.incomplete
        }
    }

    fn policy() -> ConfirmationPolicy {
        ConfirmationPolicy::new(&NavigationConfig::default())
    }

    fn decide(
        uri: &Uri,
        intent: NavigationIntent,
        redirect: bool,
        referrer: Option<&Uri>,
        cache: &MapCache,
    ) -> Decision {
        policy().evaluate(&ConfirmContext {
            uri,
            intent: &intent,
            cache_mode: CacheMode::Normal,
            redirect_continuation: redirect,
            referrer,
            cache,
        })
    }

    fn reason(decision: Decision) -> ConfirmReason {
        match decision {
            Decision::AskConfirmation(prompt) => prompt.reason,
            Decision::Proceed => panic!("Expected AskConfirmation"),
        }
    }

    #[test]
    fn test_impersonating_user_asks() {
        let uri = Uri::parse("http://paypal.com.evil-host@evil-host/").unwrap();
        let decision = decide(&uri, NavigationIntent::Forward, false, None, &MapCache::default());

        match reason(decision) {
            ConfirmReason::Impersonation { host, user } => {
                assert_eq!(host, "evil-host");
                assert_eq!(user, "paypal.com.evil-host");
            }
            other => panic!("Unexpected reason {other:?}"),
        }
    }

    #[test]
    fn test_plain_user_proceeds() {
        let uri = Uri::parse("http://alice@a.example/").unwrap();
        let decision = decide(&uri, NavigationIntent::Forward, false, None, &MapCache::default());
        assert_eq!(decision, Decision::Proceed);

        let dotted = Uri::parse("http://john.doe@a.example/").unwrap();
        let decision = decide(&dotted, NavigationIntent::Reload, true, None, &MapCache::default());
        assert_eq!(decision, Decision::Proceed);
    }

    #[test]
    fn test_heuristic_is_pluggable() {
        struct Never;
        impl DomainHeuristic for Never {
            fn looks_like_domain(&self, _token: &str) -> bool {
                false
            }
        }

        let uri = Uri::parse("http://paypal.com@evil.example/").unwrap();
        let cache = MapCache::default();
        let decision = policy().with_heuristic(Arc::new(Never)).evaluate(&ConfirmContext {
            uri: &uri,
            intent: &NavigationIntent::Forward,
            cache_mode: CacheMode::Normal,
            redirect_continuation: false,
            referrer: None,
            cache: &cache,
        });
        assert_eq!(decision, Decision::Proceed);
    }

    #[test]
    fn test_without_post_never_asks_for_resubmission() {
        let uri = Uri::parse("http://a.example/x").unwrap();
        let cache = MapCache::default();
        for intent in [
            NavigationIntent::Forward,
            NavigationIntent::Reload,
            NavigationIntent::ImageMapFollow,
            NavigationIntent::HistoryReplay(LocationId::new()),
        ] {
            for redirect in [false, true] {
                assert_eq!(decide(&uri, intent, redirect, None, &cache), Decision::Proceed);
            }
        }
    }

    #[test]
    fn test_post_reasons() {
        let uri = Uri::parse("http://a.example/form").unwrap().with_post(PostData::form("q=1"));
        let mut cache = MapCache::default();

        assert_eq!(
            reason(decide(&uri, NavigationIntent::Forward, false, None, &cache)),
            ConfirmReason::Post
        );
        assert_eq!(
            reason(decide(&uri, NavigationIntent::Forward, true, None, &cache)),
            ConfirmReason::RedirectPost
        );
        assert_eq!(
            reason(decide(&uri, NavigationIntent::Reload, false, None, &cache)),
            ConfirmReason::Repost
        );

        let referrer = Uri::parse("http://a.example/page").unwrap();
        cache.insert(CacheEntry::new(referrer.clone(), b"<form>".to_vec()).mark_incomplete());
        assert_eq!(
            reason(decide(&uri, NavigationIntent::Forward, false, Some(&referrer), &cache)),
            ConfirmReason::IncompleteReferrer
        );
    }

    #[test]
    fn test_cached_post_proceeds_on_forward_only() {
        let uri = Uri::parse("http://a.example/form").unwrap().with_post(PostData::form("q=1"));
        let mut cache = MapCache::default();
        cache.insert(CacheEntry::new(uri.clone(), b"result".to_vec()));

        assert_eq!(
            decide(&uri, NavigationIntent::Forward, false, None, &cache),
            Decision::Proceed
        );
        assert_eq!(
            reason(decide(&uri, NavigationIntent::HistoryReplay(LocationId::new()), false, None, &cache)),
            ConfirmReason::Repost
        );
    }

    #[test]
    fn test_disabled_checks() {
        let config = NavigationConfig {
            warn_malicious: false,
            confirm_submit: false,
            ..NavigationConfig::default()
        };
        let policy = ConfirmationPolicy::new(&config);
        let uri = Uri::parse("http://paypal.com@evil.example/")
            .unwrap()
            .with_post(PostData::form("q=1"));
        let cache = MapCache::default();

        let decision = policy.evaluate(&ConfirmContext {
            uri: &uri,
            intent: &NavigationIntent::Forward,
            cache_mode: CacheMode::Normal,
            redirect_continuation: true,
            referrer: None,
            cache: &cache,
        });
        assert_eq!(decision, Decision::Proceed);
    }

    #[test]
    fn test_decline_actions() {
        assert_eq!(ConfirmReason::Post.on_decline(), DeclineAction::ReloadCurrent);
        let impersonation = ConfirmReason::Impersonation {
            host: "h".to_string(),
            user: "u".to_string(),
        };
        assert_eq!(impersonation.on_decline(), DeclineAction::Abandon);
    }
}
