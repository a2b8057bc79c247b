//! Redirect resolver
//!
//! Interprets the events of the pending fetch. A fetch result either
//! settles the navigation or asks for the next redirect hop; the resolver
//! never issues fetches itself, so a hop is always started from the
//! controller's event loop rather than from inside a completion callback.

use crate::cache::CacheEntry;
use crate::fetch::{FetchEvent, FetchEventKind, FetchOutcome, Generation, Progress, TransportError};
use crate::intent::NavigationIntent;
use crate::uri::{Protocol, Uri};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    AwaitingTerminal,
    Resolved,
    Aborted,
}

/// How a navigation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Show this entry. `limit_reached` marks a redirect chain cut short.
    Display {
        entry: CacheEntry,
        limit_reached: bool,
    },
    /// Nothing can load the URI. `target` is set when a redirect pointed
    /// somewhere unloadable.
    BadUri { target: Option<Uri> },
    ExternalProtocol,
    Failed(TransportError),
}

/// What the controller must do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Belongs to a superseded fetch; drop it
    Stale,
    /// Forward to the caller, nothing settles
    Progress(Progress),
    /// Start the next hop
    Follow {
        from: Uri,
        target: Uri,
        intent: NavigationIntent,
    },
    Resolved(Resolution),
}

#[derive(Debug)]
pub struct RedirectResolver {
    limit: u32,
    state: ResolverState,
}

impl RedirectResolver {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: ResolverState::Resolved,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// A fetch was issued; wait for its terminal event.
    pub fn arm(&mut self) {
        self.state = ResolverState::AwaitingTerminal;
    }

    pub fn abort(&mut self) {
        if self.state == ResolverState::AwaitingTerminal {
            self.state = ResolverState::Aborted;
        }
    }

    /// Interpret `event` for the fetch currently pending as `current`.
    ///
    /// `redirects` is the session's redirect counter and is bumped for every
    /// hop taken.
    pub fn on_event(
        &mut self,
        current: Option<Generation>,
        event: FetchEvent,
        intent: NavigationIntent,
        redirects: &mut u32,
    ) -> Step {
        if self.state != ResolverState::AwaitingTerminal || current != Some(event.generation) {
            return Step::Stale;
        }

        let outcome = match event.kind {
            FetchEventKind::Progress(progress) => return Step::Progress(progress),
            FetchEventKind::Terminal(outcome) => outcome,
        };

        self.state = ResolverState::Resolved;

        match outcome {
            FetchOutcome::Ok(entry) => self.on_entry(entry, intent, redirects),
            FetchOutcome::BadUri => Step::Resolved(Resolution::BadUri { target: None }),
            FetchOutcome::ExternalProtocolRequired => Step::Resolved(Resolution::ExternalProtocol),
            FetchOutcome::TransportError(error) => Step::Resolved(Resolution::Failed(error)),
        }
    }

    fn on_entry(&mut self, entry: CacheEntry, intent: NavigationIntent, redirects: &mut u32) -> Step {
        let Some(target) = entry.redirect.clone() else {
            return Step::Resolved(Resolution::Display {
                entry,
                limit_reached: false,
            });
        };

        if *redirects >= self.limit {
            tracing::warn!(
                uri = %entry.uri,
                limit = self.limit,
                "Redirect limit reached, displaying what is available"
            );
            return Step::Resolved(Resolution::Display {
                entry,
                limit_reached: true,
            });
        }

        *redirects += 1;

        if target.protocol() == Protocol::Unknown {
            tracing::debug!(target = %target, "Redirect to unknown scheme");
            return Step::Resolved(Resolution::BadUri {
                target: Some(target),
            });
        }

        // Stays resolved until the controller arms it for the next hop.
        Step::Follow {
            from: entry.uri,
            target,
            intent: intent.on_redirect(),
        }
    }
}
