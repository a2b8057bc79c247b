//! Navigation controller
//!
//! The single entry point a session uses to load things. It ties together
//! the confirmation policy, the in-flight fetch, the redirect resolver and
//! the history integrator, and owns the session-wide state they share: the
//! redirect counter, the referrer and the reload level.
//!
//! Transports never call back into the controller. They push events into a
//! [`CompletionSink`] and the controller drains the queue in [`pump`], so a
//! redirect hop started while handling one event is just another queued
//! event for the next turn of the loop.
//!
//! [`pump`]: NavigationController::pump

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cache::Cache;
use crate::cancel::InFlight;
use crate::config::NavigationConfig;
use crate::confirm::{
    ConfirmContext, ConfirmReason, ConfirmationPolicy, ConfirmationPrompt, Decision,
    DeclineAction, DomainHeuristic,
};
use crate::error::{LoadError, NavigationError};
use crate::fetch::{CompletionSink, FetchEvent, Generation, Priority, Progress, Transport};
use crate::history::{History, LocationId};
use crate::imagemap::ImageMapChoice;
use crate::integrate::{integrate, Applied};
use crate::intent::{CacheMode, NavigationIntent, NavigationRequest, Task};
use crate::resolver::{Resolution, Step};
use crate::uri::Uri;
use crate::Result;

pub type ConfirmationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

/// Presents yes/no questions. The answer comes back through
/// [`NavigationController::answer`].
pub trait Prompter {
    fn ask(&mut self, id: ConfirmationId, prompt: &ConfirmationPrompt);
}

/// Programs that take over URIs the browser does not load itself.
pub trait ExternalHandlers {
    fn handles(&self, uri: &Uri) -> bool;

    /// Pass `uri` on. Returns false when nothing took it.
    fn dispatch(&mut self, uri: &Uri) -> bool;
}

/// The collaborators a controller drives.
pub struct Services {
    pub transport: Box<dyn Transport>,
    pub cache: Arc<dyn Cache>,
    pub history: Box<dyn History>,
    pub prompter: Box<dyn Prompter>,
    pub external: Box<dyn ExternalHandlers>,
}

/// What happened, for whoever presents the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Started {
        generation: Generation,
        uri: Uri,
        intent: NavigationIntent,
    },
    Progress {
        uri: Uri,
        progress: Progress,
    },
    ConfirmationRequested {
        id: ConfirmationId,
        prompt: ConfirmationPrompt,
    },
    Displayed {
        location: LocationId,
        uri: Uri,
    },
    FrameUpdated {
        frame: String,
        uri: Uri,
    },
    ImageMap {
        uri: Uri,
        choices: Vec<ImageMapChoice>,
    },
    /// A failed reload fell back to what was already shown
    Redisplayed {
        location: LocationId,
    },
    RedirectLimitReached {
        uri: Uri,
        limit: u32,
    },
    Failed(LoadError),
    ExternalHandoff {
        uri: Uri,
    },
    /// The user declined a confirmation
    Abandoned {
        uri: Uri,
    },
    Aborted {
        generation: Generation,
        uri: Uri,
    },
}

struct Deferred {
    request: NavigationRequest,
    task: Task,
    reason: ConfirmReason,
}

pub struct NavigationController {
    policy: ConfirmationPolicy,
    in_flight: InFlight,
    services: Services,
    sink: CompletionSink,
    events: UnboundedReceiver<FetchEvent>,
    redirect_count: u32,
    referrer: Option<Uri>,
    reload_mode: CacheMode,
    confirmations: HashMap<ConfirmationId, Deferred>,
    next_confirmation: ConfirmationId,
    outbox: VecDeque<NavigationEvent>,
}

impl NavigationController {
    pub fn new(config: &NavigationConfig, services: Services) -> Self {
        let (sink, events) = CompletionSink::channel();
        Self {
            policy: ConfirmationPolicy::new(config),
            in_flight: InFlight::new(config.max_redirects),
            services,
            sink,
            events,
            redirect_count: 0,
            referrer: None,
            reload_mode: CacheMode::Normal,
            confirmations: HashMap::new(),
            next_confirmation: 1,
            outbox: VecDeque::new(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: Arc<dyn DomainHeuristic>) -> Self {
        self.policy = self.policy.clone().with_heuristic(heuristic);
        self
    }

    /// Apply new settings. A navigation already under way keeps going.
    pub fn reconfigure(&mut self, config: &NavigationConfig) {
        self.policy.configure(config);
        self.in_flight.set_redirect_limit(config.max_redirects);
        tracing::debug!(
            max_redirects = config.max_redirects,
            warn_malicious = config.warn_malicious,
            confirm_submit = config.confirm_submit,
            "Navigation settings applied"
        );
    }

    /// Redirect hops taken by the current navigation.
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    pub fn referrer(&self) -> Option<&Uri> {
        self.referrer.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_idle()
    }

    pub fn loading_uri(&self) -> Option<&Uri> {
        self.in_flight.pending().map(|pending| &pending.uri)
    }

    pub fn history(&self) -> &dyn History {
        self.services.history.as_ref()
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.services.cache
    }

    pub fn has_pending_confirmations(&self) -> bool {
        !self.confirmations.is_empty()
    }

    /// Start an externally requested navigation.
    pub fn navigate(&mut self, request: NavigationRequest) {
        if self.services.external.handles(&request.uri) {
            self.hand_off(request.uri);
            return;
        }

        self.reload_mode = request.cache_mode;

        if self.is_already_loading(&request) {
            tracing::debug!(uri = %request.uri, intent = %request.intent, "Already loading");
            self.in_flight
                .reprioritize(self.services.transport.as_mut(), Priority::Main);
            return;
        }

        self.abort(false);
        self.referrer = request.referrer.clone();

        let request = NavigationRequest {
            redirect_continuation: false,
            ..request
        };
        let task = Task::new(request.intent, request.target_frame.clone());
        self.goto(request, task);
        self.pump();
    }

    /// Follow a link given as text.
    pub fn goto_url(&mut self, input: &str) {
        match Uri::parse(input) {
            Ok(uri) => self.navigate(NavigationRequest::new(uri)),
            Err(e) => {
                tracing::warn!(input, error = %e, "Cannot navigate to malformed URL");
                self.outbox.push_back(NavigationEvent::Failed(LoadError::BadUri {
                    uri: input.to_string(),
                    priority: Priority::Main,
                }));
            }
        }
    }

    pub fn reload(&mut self, cache_mode: CacheMode) -> Result<()> {
        let uri = self
            .services
            .history
            .current()
            .map(|location| location.uri.clone())
            .ok_or(NavigationError::NoCurrentLocation)?;

        let request = NavigationRequest::new(uri)
            .with_intent(NavigationIntent::Reload)
            .with_cache_mode(cache_mode)
            .with_referrer(self.referrer.clone());
        self.navigate(request);
        Ok(())
    }

    /// Returns false when there is nothing to go back to.
    pub fn go_back(&mut self) -> bool {
        match self.services.history.previous() {
            Some(id) => self.go_to_location(id).is_ok(),
            None => false,
        }
    }

    pub fn go_forward(&mut self) -> bool {
        match self.services.history.next() {
            Some(id) => self.go_to_location(id).is_ok(),
            None => false,
        }
    }

    pub fn go_to_location(&mut self, id: LocationId) -> Result<()> {
        let uri = self
            .services
            .history
            .find(id)
            .map(|location| location.uri.clone())
            .ok_or(NavigationError::UnknownLocation(id))?;

        let request = NavigationRequest::new(uri)
            .with_intent(NavigationIntent::HistoryReplay(id))
            .with_cache_mode(CacheMode::Always)
            .with_referrer(self.referrer.clone());
        self.navigate(request);
        Ok(())
    }

    /// Load an image map and offer its regions instead of displaying it.
    pub fn follow_image_map(&mut self, uri: Uri, target_frame: Option<String>) {
        let mut request = NavigationRequest::new(uri).with_intent(NavigationIntent::ImageMapFollow);
        request.target_frame = target_frame;
        request.referrer = self.current_uri();
        self.navigate(request);
    }

    pub fn choose_image_map_entry(&mut self, choice: ImageMapChoice) {
        let mut request = NavigationRequest::new(choice.uri);
        request.target_frame = choice.target;
        request.referrer = self.current_uri();
        self.navigate(request);
    }

    /// Resolve a confirmation raised earlier.
    pub fn answer(&mut self, id: ConfirmationId, answer: Answer) -> Result<()> {
        let deferred = self
            .confirmations
            .remove(&id)
            .ok_or(NavigationError::UnknownConfirmation(id))?;

        tracing::info!(confirmation = id, ?answer, "Confirmation answered");

        match answer {
            Answer::Yes => {
                self.abort(false);
                self.load(deferred.request, deferred.task);
                self.pump();
            }
            Answer::No => {
                self.outbox.push_back(NavigationEvent::Abandoned {
                    uri: deferred.request.uri,
                });
                if deferred.reason.on_decline() == DeclineAction::ReloadCurrent
                    && self.services.history.current().is_some()
                {
                    self.reload(CacheMode::Normal)?;
                }
            }
        }
        Ok(())
    }

    /// Stop the current fetch. Safe to call when nothing is loading.
    pub fn abort(&mut self, hard: bool) {
        if let Some(aborted) = self.in_flight.abort(self.services.transport.as_mut(), hard) {
            self.outbox.push_back(NavigationEvent::Aborted {
                generation: aborted.generation,
                uri: aborted.uri,
            });
        }
    }

    /// Process every queued fetch event, including those queued while
    /// processing.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(event);
        }
    }

    /// Wait for the next fetch event and process it along with anything
    /// queued behind it. Returns false when nothing is loading.
    pub async fn wait_for_event(&mut self) -> bool {
        if self.in_flight.is_idle() {
            return false;
        }
        match self.events.recv().await {
            Some(event) => {
                self.dispatch(event);
                self.pump();
                true
            }
            None => false,
        }
    }

    pub fn drain_events(&mut self) -> Vec<NavigationEvent> {
        self.outbox.drain(..).collect()
    }

    fn current_uri(&self) -> Option<Uri> {
        self.services
            .history
            .current()
            .map(|location| location.uri.clone())
    }

    fn is_already_loading(&self, request: &NavigationRequest) -> bool {
        match (self.in_flight.task(), self.in_flight.pending()) {
            (Some(task), Some(pending)) => {
                task.intent.same_kind(&request.intent) && pending.uri.same_resource(&request.uri)
            }
            _ => false,
        }
    }

    /// Ask for confirmation if needed, otherwise start the fetch.
    fn goto(&mut self, request: NavigationRequest, task: Task) {
        if !request.redirect_continuation {
            self.redirect_count = 0;
        }

        let decision = self.policy.evaluate(&ConfirmContext {
            uri: &request.uri,
            intent: &request.intent,
            cache_mode: request.cache_mode,
            redirect_continuation: request.redirect_continuation,
            referrer: self.referrer.as_ref(),
            cache: self.services.cache.as_ref(),
        });

        match decision {
            Decision::Proceed => self.load(request, task),
            Decision::AskConfirmation(prompt) => self.defer(request, task, prompt),
        }
    }

    fn load(&mut self, request: NavigationRequest, task: Task) {
        let generation = self.in_flight.start(
            self.services.transport.as_mut(),
            &self.sink,
            task,
            request.uri.clone(),
            self.referrer.clone(),
            request.cache_mode,
        );

        tracing::info!(
            generation,
            uri = %request.uri,
            intent = %request.intent,
            redirects = self.redirect_count,
            "Navigation started"
        );
        self.outbox.push_back(NavigationEvent::Started {
            generation,
            uri: request.uri,
            intent: request.intent,
        });
    }

    fn defer(&mut self, request: NavigationRequest, task: Task, prompt: ConfirmationPrompt) {
        let id = self.next_confirmation;
        self.next_confirmation += 1;

        tracing::info!(
            confirmation = id,
            uri = %prompt.uri.public_string(),
            reason = ?prompt.reason,
            "Confirmation required"
        );

        self.services.prompter.ask(id, &prompt);
        self.confirmations.insert(
            id,
            Deferred {
                request,
                task,
                reason: prompt.reason.clone(),
            },
        );
        self.outbox
            .push_back(NavigationEvent::ConfirmationRequested { id, prompt });
    }

    fn dispatch(&mut self, event: FetchEvent) {
        let generation = event.generation;
        match self.in_flight.on_event(event, &mut self.redirect_count) {
            Step::Stale => tracing::trace!(generation, "Dropping stale fetch event"),
            Step::Progress(progress) => {
                if let Some(pending) = self.in_flight.pending() {
                    self.outbox.push_back(NavigationEvent::Progress {
                        uri: pending.uri.clone(),
                        progress,
                    });
                }
            }
            Step::Follow {
                from,
                target,
                intent,
            } => self.follow_redirect(from, target, intent),
            Step::Resolved(resolution) => self.resolve(resolution),
        }
    }

    fn follow_redirect(&mut self, from: Uri, target: Uri, intent: NavigationIntent) {
        let Some(task) = self.in_flight.task().cloned() else {
            return;
        };
        // Ends this generation; the hop gets a fresh one.
        self.in_flight.abort(self.services.transport.as_mut(), false);

        if intent == NavigationIntent::Forward && self.services.external.handles(&target) {
            self.hand_off(target);
            return;
        }

        tracing::debug!(
            from = %from,
            to = %target,
            intent = %intent,
            redirects = self.redirect_count,
            "Following redirect"
        );

        self.referrer = Some(from);

        let cache_mode = if task.intent == NavigationIntent::Reload {
            self.reload_mode
        } else {
            CacheMode::Normal
        };
        let mut next = task.continue_as(intent);
        if intent == NavigationIntent::Reload {
            next.target_frame = None;
        }

        let request = NavigationRequest {
            uri: target,
            target_frame: next.target_frame.clone(),
            cache_mode,
            intent,
            referrer: self.referrer.clone(),
            redirect_continuation: true,
        };
        self.goto(request, next);
    }

    fn resolve(&mut self, resolution: Resolution) {
        let priority = self
            .in_flight
            .pending()
            .map_or(Priority::Main, |pending| pending.priority);
        let Some((task, uri)) = self.in_flight.settle() else {
            return;
        };

        match resolution {
            Resolution::Display {
                entry,
                limit_reached,
            } => {
                if limit_reached {
                    self.outbox.push_back(NavigationEvent::RedirectLimitReached {
                        uri: uri.clone(),
                        limit: self.in_flight.redirect_limit(),
                    });
                }
                let shown = uri.clone();
                let applied = integrate(self.services.history.as_mut(), &task, uri, entry);
                tracing::info!(uri = %shown, intent = %task.intent, redirects = self.redirect_count, "Navigation resolved");
                self.outbox.push_back(applied_event(applied, shown));
            }
            Resolution::BadUri { target } => {
                let failed = target.unwrap_or(uri);
                tracing::warn!(uri = %failed, "Unsupported or malformed URL");
                self.outbox.push_back(NavigationEvent::Failed(LoadError::BadUri {
                    uri: failed.public_string(),
                    priority,
                }));
            }
            Resolution::ExternalProtocol => self.hand_off(uri),
            Resolution::Failed(error) => {
                tracing::warn!(uri = %uri, error = %error.state, "Navigation failed");
                self.outbox
                    .push_back(NavigationEvent::Failed(LoadError::Transport { error, priority }));
                if task.intent == NavigationIntent::Reload {
                    self.redisplay(&task);
                }
            }
        }
    }

    /// Keep showing what a failed reload was meant to replace.
    fn redisplay(&mut self, task: &Task) {
        let history = self.services.history.as_ref();
        let previous = task
            .target_location
            .and_then(|id| history.find(id))
            .or_else(|| history.current());

        if let Some(location) = previous.filter(|location| location.has_displayable_content()) {
            self.outbox
                .push_back(NavigationEvent::Redisplayed { location: location.id });
        }
    }

    fn hand_off(&mut self, uri: Uri) {
        if self.services.external.dispatch(&uri) {
            tracing::info!(uri = %uri.public_string(), "Handed off to external handler");
            self.outbox.push_back(NavigationEvent::ExternalHandoff { uri });
        } else {
            tracing::warn!(uri = %uri.public_string(), "No external handler for URL");
            self.outbox.push_back(NavigationEvent::Failed(LoadError::BadUri {
                uri: uri.public_string(),
                priority: Priority::Main,
            }));
        }
    }

    #[cfg(test)]
    fn resolver_state(&self) -> crate::resolver::ResolverState {
        self.in_flight.resolver_state()
    }
}

fn applied_event(applied: Applied, uri: Uri) -> NavigationEvent {
    match applied {
        Applied::Pushed(location) | Applied::Replaced(location) | Applied::Moved(location) => {
            NavigationEvent::Displayed { location, uri }
        }
        Applied::FrameUpdated { frame, uri } => NavigationEvent::FrameUpdated { frame, uri },
        Applied::ImageMap(choices) => NavigationEvent::ImageMap { uri, choices },
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        self.in_flight.abort(self.services.transport.as_mut(), true);
    }
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("in_flight", &self.in_flight)
            .field("redirect_count", &self.redirect_count)
            .field("referrer", &self.referrer)
            .field("reload_mode", &self.reload_mode)
            .field("confirmations", &self.confirmations.len())
            .finish_non_exhaustive()
    }
}
