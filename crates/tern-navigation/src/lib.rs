//! Tern Navigation
//!
//! Loads a URI into a session: one fetch at a time, redirects followed up to
//! a limit, confirmation before anything suspicious or a form resubmission,
//! and the result routed into a frame, the back/forward list or an
//! image-map menu.
//!
//! - [`NavigationController`] is the entry point
//! - [`Transport`], [`Cache`] and [`History`] are the seams to the rest of
//!   the browser
//! - [`VisitLog`] and [`InputResolver`] back the address bar

mod cache;
mod cancel;
mod config;
mod confirm;
mod controller;
mod error;
mod fetch;
mod history;
mod imagemap;
mod input;
mod integrate;
mod intent;
mod resolver;
mod uri;
mod visits;

pub use cache::{Cache, CacheEntry};
pub use cancel::{AbortedFetch, InFlight};
pub use config::{NavigationConfig, DEFAULT_MAX_REDIRECTS};
pub use confirm::{
    user_impersonates_host, ConfirmContext, ConfirmReason, ConfirmationPolicy,
    ConfirmationPrompt, DeclineAction, Decision, DomainHeuristic, KnownTldHeuristic, KNOWN_TLDS,
};
pub use controller::{
    Answer, ConfirmationId, ExternalHandlers, NavigationController, NavigationEvent, Prompter,
    Services,
};
pub use error::{LoadError, NavigationError};
pub use fetch::{
    CompletionSink, FetchEvent, FetchEventKind, FetchFacade, FetchHandle, FetchOutcome,
    FetchRequest, Generation, PendingFetch, Priority, Progress, Transport, TransportError,
    TransportErrorKind, TransportState,
};
pub use history::{FrameView, History, HistoryList, Location, LocationId};
pub use imagemap::{parse_image_map, ImageMapChoice};
pub use input::{InputResolution, InputResolver, DEFAULT_SEARCH_ENGINE};
pub use integrate::{integrate, Applied};
pub use intent::{CacheMode, NavigationIntent, NavigationRequest, Task};
pub use resolver::{RedirectResolver, Resolution, ResolverState, Step};
pub use uri::{PostData, Protocol, Uri};
pub use visits::{Visit, VisitLog};

pub type Result<T> = std::result::Result<T, NavigationError>;
