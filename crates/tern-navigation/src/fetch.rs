//! Fetch façade
//!
//! Thin adapter over the transport layer. It owns the single outstanding
//! [`PendingFetch`] of a session and stamps every fetch with a fresh
//! generation so late events from superseded fetches can be recognised.

use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::cache::CacheEntry;
use crate::intent::CacheMode;
use crate::uri::Uri;

/// Identifies one start-to-terminal cycle of a fetch.
pub type Generation = u64;

/// Transport-side identifier of a running fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// The document the user asked for
    Main,
    /// A frame inside that document
    Frame,
    /// Background work the user is not waiting on
    Background,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Main => "main",
            Priority::Frame => "frame",
            Priority::Background => "background",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Request,
    Body,
    Io,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Other => "unknown",
        }
    }
}

/// Opaque failure state as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportState {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportState {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub state: TransportState,
    pub uri: Uri,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} while loading {}", self.state, self.uri.public_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub received: u64,
    pub total: Option<u64>,
}

/// How a fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok(CacheEntry),
    BadUri,
    ExternalProtocolRequired,
    TransportError(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEventKind {
    Progress(Progress),
    Terminal(FetchOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEvent {
    pub generation: Generation,
    pub kind: FetchEventKind,
}

impl FetchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, FetchEventKind::Terminal(_))
    }
}

/// What the transport is asked to load.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub generation: Generation,
    pub uri: Uri,
    pub referrer: Option<Uri>,
    pub priority: Priority,
    pub cache_mode: CacheMode,
}

/// Where a transport reports progress and completion.
///
/// Sending never blocks and never re-enters the controller; events queue
/// up until the controller pumps them.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    tx: UnboundedSender<FetchEvent>,
}

impl CompletionSink {
    pub fn channel() -> (Self, UnboundedReceiver<FetchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: FetchEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Completion sink closed, dropping fetch event");
        }
    }

    pub fn progress(&self, generation: Generation, received: u64, total: Option<u64>) {
        self.send(FetchEvent {
            generation,
            kind: FetchEventKind::Progress(Progress { received, total }),
        });
    }

    pub fn finish(&self, generation: Generation, outcome: FetchOutcome) {
        self.send(FetchEvent {
            generation,
            kind: FetchEventKind::Terminal(outcome),
        });
    }
}

/// The transport layer as seen by the controller.
pub trait Transport {
    /// Begin loading. Events for the request go to `sink`, possibly before
    /// this call returns.
    fn fetch(&mut self, request: FetchRequest, sink: &CompletionSink) -> FetchHandle;

    /// Stop a fetch. `hard` discards partial data; otherwise whatever was
    /// already cached is kept.
    fn cancel(&mut self, handle: FetchHandle, hard: bool);

    fn reprioritize(&mut self, handle: FetchHandle, priority: Priority);
}

/// The one outstanding fetch of a session. Owns its URI.
#[derive(Debug)]
pub struct PendingFetch {
    pub generation: Generation,
    pub uri: Uri,
    pub cache_mode: CacheMode,
    pub priority: Priority,
    pub handle: FetchHandle,
}

impl PendingFetch {
    /// Give up the fetch, handing its URI to the caller.
    pub fn into_uri(self) -> Uri {
        self.uri
    }
}

#[derive(Debug)]
pub struct FetchFacade {
    next_generation: Generation,
    pending: Option<PendingFetch>,
}

impl FetchFacade {
    pub fn new() -> Self {
        Self {
            next_generation: 1,
            pending: None,
        }
    }

    /// Issue a fetch for `uri`. The caller must have aborted any previous
    /// fetch first.
    pub fn start(
        &mut self,
        transport: &mut dyn Transport,
        sink: &CompletionSink,
        uri: Uri,
        referrer: Option<Uri>,
        cache_mode: CacheMode,
    ) -> Generation {
        debug_assert!(self.pending.is_none(), "fetch started while another is pending");

        let generation = self.next_generation;
        self.next_generation += 1;

        let request = FetchRequest {
            generation,
            uri: uri.clone(),
            referrer,
            priority: Priority::Main,
            cache_mode,
        };
        let handle = transport.fetch(request, sink);

        tracing::debug!(generation, uri = %uri, cache_mode = %cache_mode, "Fetch started");

        self.pending = Some(PendingFetch {
            generation,
            uri,
            cache_mode,
            priority: Priority::Main,
            handle,
        });
        generation
    }

    pub fn pending(&self) -> Option<&PendingFetch> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut PendingFetch> {
        self.pending.as_mut()
    }

    pub fn take(&mut self) -> Option<PendingFetch> {
        self.pending.take()
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.pending.as_ref().map(|p| p.generation)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current_generation() == Some(generation)
    }
}

impl Default for FetchFacade {
    fn default() -> Self {
        Self::new()
    }
}
