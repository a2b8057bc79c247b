//! Cancellation manager
//!
//! [`InFlight`] holds everything that lives only as long as one fetch:
//! the pending fetch with its URI, the task describing what to do with the
//! result, and the resolver waiting for the terminal event. Aborting tears
//! all three down together and leaves session-wide state (referrer,
//! redirect counter) to the controller.

use crate::fetch::{
    CompletionSink, FetchEvent, FetchFacade, Generation, PendingFetch, Priority, Transport,
};
use crate::intent::{CacheMode, Task};
use crate::resolver::{RedirectResolver, ResolverState, Step};
use crate::uri::Uri;

/// A fetch that was stopped before it settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedFetch {
    pub generation: Generation,
    pub uri: Uri,
}

#[derive(Debug)]
pub struct InFlight {
    facade: FetchFacade,
    resolver: RedirectResolver,
    task: Option<Task>,
}

impl InFlight {
    pub fn new(redirect_limit: u32) -> Self {
        Self {
            facade: FetchFacade::new(),
            resolver: RedirectResolver::new(redirect_limit),
            task: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.facade.pending().is_none()
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingFetch> {
        self.facade.pending()
    }

    pub fn resolver_state(&self) -> ResolverState {
        self.resolver.state()
    }

    pub fn redirect_limit(&self) -> u32 {
        self.resolver.limit()
    }

    pub fn set_redirect_limit(&mut self, limit: u32) {
        self.resolver.set_limit(limit);
    }

    /// Start fetching `uri` for `task`. Must only be called when idle.
    pub fn start(
        &mut self,
        transport: &mut dyn Transport,
        sink: &CompletionSink,
        task: Task,
        uri: Uri,
        referrer: Option<Uri>,
        cache_mode: CacheMode,
    ) -> Generation {
        self.task = Some(task);
        self.resolver.arm();
        self.facade.start(transport, sink, uri, referrer, cache_mode)
    }

    /// Feed one event from the completion sink through the resolver.
    pub fn on_event(&mut self, event: FetchEvent, redirects: &mut u32) -> Step {
        let Some(intent) = self.task.as_ref().map(|task| task.intent) else {
            return Step::Stale;
        };
        self.resolver
            .on_event(self.facade.current_generation(), event, intent, redirects)
    }

    /// Hand over the task and URI of a fetch the resolver has settled,
    /// leaving nothing in flight.
    pub fn settle(&mut self) -> Option<(Task, Uri)> {
        let pending = self.facade.take()?;
        let task = self.task.take()?;
        Some((task, pending.into_uri()))
    }

    pub fn reprioritize(&mut self, transport: &mut dyn Transport, priority: Priority) {
        if let Some(pending) = self.facade.pending_mut() {
            if pending.priority != priority {
                transport.reprioritize(pending.handle, priority);
                pending.priority = priority;
            }
        }
    }

    /// Stop the pending fetch, if any. `hard` asks the transport to throw
    /// away partial data. Calling this when idle only drops a leftover task.
    pub fn abort(&mut self, transport: &mut dyn Transport, hard: bool) -> Option<AbortedFetch> {
        let Some(pending) = self.facade.take() else {
            self.task = None;
            return None;
        };

        transport.cancel(pending.handle, hard);
        self.resolver.abort();
        self.task = None;

        let generation = pending.generation;
        tracing::debug!(generation, uri = %pending.uri, hard, "Fetch aborted");
        Some(AbortedFetch {
            generation,
            uri: pending.into_uri(),
        })
    }
}
