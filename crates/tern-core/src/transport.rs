//! HTTP transport
//!
//! Implements the navigation transport on `reqwest`. Redirects are not
//! followed here: a 3xx becomes a cache entry pointing at its target and
//! the navigation controller decides whether to go on.

use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, PRAGMA, REFERER};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use tern_navigation::{
    Cache, CacheEntry, CacheMode, CompletionSink, FetchHandle, FetchOutcome, FetchRequest,
    Priority, Transport, TransportError, TransportErrorKind, TransportState, Uri,
};

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::Result;

const ABOUT_BLANK: &str = "<html><head><title></title></head><body></body></html>";

/// Body received so far by a running transfer.
#[derive(Default)]
struct Partial {
    receiving: bool,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Partial {
    /// What an interrupted transfer leaves behind. `None` before the body
    /// started or after it was handed over complete.
    fn take_incomplete(&mut self, uri: &Uri) -> Option<CacheEntry> {
        if !self.receiving {
            return None;
        }
        self.receiving = false;
        let entry = CacheEntry::new(uri.clone(), std::mem::take(&mut self.body)).mark_incomplete();
        Some(match self.content_type.take() {
            Some(content_type) => entry.with_content_type(content_type),
            None => entry,
        })
    }
}

struct Running {
    task: JoinHandle<()>,
    uri: Uri,
    partial: Arc<Mutex<Partial>>,
}

pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Handle,
    cache: Arc<MemoryCache>,
    external_schemes: HashSet<String>,
    running: HashMap<u64, Running>,
    next_handle: u64,
}

impl HttpTransport {
    pub fn new(config: &Config, cache: Arc<MemoryCache>, runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            runtime,
            cache,
            external_schemes: config.external_handlers.keys().cloned().collect(),
            running: HashMap::new(),
            next_handle: 1,
        })
    }

    fn spawn(&mut self, handle: FetchHandle, request: FetchRequest, sink: &CompletionSink) {
        self.running.retain(|_, running| !running.task.is_finished());

        let uri = request.uri.clone();
        let partial = Arc::new(Mutex::new(Partial::default()));
        let task = self.runtime.spawn(load(
            self.client.clone(),
            self.cache.clone(),
            partial.clone(),
            request,
            sink.clone(),
        ));
        self.running.insert(handle.0, Running { task, uri, partial });
    }
}

impl Transport for HttpTransport {
    fn fetch(&mut self, request: FetchRequest, sink: &CompletionSink) -> FetchHandle {
        let handle = FetchHandle(self.next_handle);
        self.next_handle += 1;

        let generation = request.generation;
        let uri = request.uri.clone();
        let scheme = uri.scheme().to_string();

        if self.external_schemes.contains(&scheme) {
            sink.finish(generation, FetchOutcome::ExternalProtocolRequired);
            return handle;
        }

        match scheme.as_str() {
            "about" => {
                sink.finish(generation, about_page(&uri));
                return handle;
            }
            "http" | "https" | "file" => {}
            _ => {
                tracing::debug!(uri = %uri, "No transport for scheme");
                sink.finish(generation, FetchOutcome::BadUri);
                return handle;
            }
        }

        if let Some(entry) = self.cache.validated(&uri, request.cache_mode) {
            tracing::debug!(generation, uri = %uri, "Served from cache");
            sink.finish(generation, FetchOutcome::Ok(entry));
            return handle;
        }

        self.spawn(handle, request, sink);
        handle
    }

    fn cancel(&mut self, handle: FetchHandle, hard: bool) {
        let Some(running) = self.running.remove(&handle.0) else {
            return;
        };
        running.task.abort();
        if hard {
            self.cache.remove(&running.uri);
        } else if let Some(entry) = running.partial.lock().take_incomplete(&running.uri) {
            // Keep what arrived so far for the next look at this URI.
            tracing::debug!(uri = %running.uri, bytes = entry.content.len(), "Keeping partial body");
            self.cache.insert(entry);
        }
        tracing::debug!(handle = handle.0, uri = %running.uri, hard, "Transfer cancelled");
    }

    fn reprioritize(&mut self, handle: FetchHandle, priority: Priority) {
        // Transfers are independent connections; priority is advisory only.
        tracing::trace!(handle = handle.0, %priority, "Reprioritize requested");
    }
}

fn about_page(uri: &Uri) -> FetchOutcome {
    match uri.url().path() {
        "blank" => FetchOutcome::Ok(
            CacheEntry::new(uri.clone(), ABOUT_BLANK.as_bytes().to_vec())
                .with_content_type("text/html"),
        ),
        "version" => {
            let body = format!(
                "<html><head><title>Tern</title></head><body>Tern {}</body></html>",
                env!("CARGO_PKG_VERSION")
            );
            FetchOutcome::Ok(
                CacheEntry::new(uri.clone(), body.into_bytes()).with_content_type("text/html"),
            )
        }
        _ => FetchOutcome::BadUri,
    }
}

async fn load(
    client: reqwest::Client,
    cache: Arc<MemoryCache>,
    partial: Arc<Mutex<Partial>>,
    request: FetchRequest,
    sink: CompletionSink,
) {
    let generation = request.generation;

    let result = if request.uri.scheme() == "file" {
        read_file(&request.uri).await
    } else {
        download(&client, &request, &partial, &sink).await
    };
    if let Some(entry) = partial.lock().take_incomplete(&request.uri) {
        // A body error cut the transfer short.
        cache.insert(entry);
    }

    let outcome = match result {
        Ok(entry) => {
            cache.insert(entry.clone());
            FetchOutcome::Ok(entry)
        }
        Err(Failure::BadUri) => FetchOutcome::BadUri,
        Err(Failure::Transport(state)) => {
            tracing::debug!(generation, uri = %request.uri, error = %state, "Transfer failed");
            FetchOutcome::TransportError(TransportError {
                state,
                uri: request.uri.clone(),
            })
        }
    };

    sink.finish(generation, outcome);
}

enum Failure {
    BadUri,
    Transport(TransportState),
}

impl From<TransportState> for Failure {
    fn from(state: TransportState) -> Self {
        Failure::Transport(state)
    }
}

async fn read_file(uri: &Uri) -> std::result::Result<CacheEntry, Failure> {
    let path = uri.url().to_file_path().map_err(|_| Failure::BadUri)?;
    let body = tokio::fs::read(&path)
        .await
        .map_err(|e| TransportState::new(TransportErrorKind::Io, e.to_string()))?;

    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    let entry = CacheEntry::new(uri.clone(), body);
    Ok(if is_html {
        entry.with_content_type("text/html")
    } else {
        entry
    })
}

async fn download(
    client: &reqwest::Client,
    request: &FetchRequest,
    partial: &Mutex<Partial>,
    sink: &CompletionSink,
) -> std::result::Result<CacheEntry, Failure> {
    let uri = &request.uri;

    let mut builder = match uri.post() {
        Some(post) => client
            .post(uri.url().clone())
            .header(CONTENT_TYPE, post.content_type.clone())
            .body(post.body.clone()),
        None => client.get(uri.url().clone()),
    };
    if let Some(referrer) = &request.referrer {
        builder = builder.header(REFERER, referrer.public_string());
    }
    builder = match request.cache_mode {
        CacheMode::CheckIfModified => builder.header(CACHE_CONTROL, "max-age=0"),
        CacheMode::ForceReload | CacheMode::Never => builder
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache"),
        CacheMode::Always | CacheMode::Normal => builder,
    };

    let response = builder.send().await.map_err(classify)?;
    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok());
        if let Some(location) = location {
            let target = uri.join(location).map_err(|_| Failure::BadUri)?;
            // Only 307 and 308 repeat the request body.
            let target = match uri.post() {
                Some(post)
                    if status == StatusCode::TEMPORARY_REDIRECT
                        || status == StatusCode::PERMANENT_REDIRECT =>
                {
                    target.with_post(post.clone())
                }
                _ => target,
            };
            tracing::debug!(uri = %uri, status = status.as_u16(), target = %target, "Redirect received");
            return Ok(CacheEntry::redirect(uri.clone(), target));
        }
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let total = response.content_length();

    {
        let mut partial = partial.lock();
        partial.receiving = true;
        partial.content_type = content_type.clone();
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| TransportState::new(TransportErrorKind::Body, e.to_string()))?;
        let received = {
            let mut partial = partial.lock();
            partial.body.extend_from_slice(&chunk);
            partial.body.len() as u64
        };
        sink.progress(request.generation, received, total);
    }

    let body = {
        let mut partial = partial.lock();
        partial.receiving = false;
        std::mem::take(&mut partial.body)
    };

    tracing::debug!(uri = %uri, status = status.as_u16(), bytes = body.len(), "Transfer complete");

    let entry = CacheEntry::new(uri.clone(), body);
    Ok(match content_type {
        Some(content_type) => entry.with_content_type(content_type),
        None => entry,
    })
}

/// Sort a client error into a transport state.
fn classify(e: reqwest::Error) -> TransportState {
    let message = e.to_string();
    let lowered = format!("{e:?}").to_lowercase();

    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        if lowered.contains("dns") || lowered.contains("resolve") || lowered.contains("name") {
            TransportErrorKind::Dns
        } else if lowered.contains("tls")
            || lowered.contains("certificate")
            || lowered.contains("handshake")
        {
            TransportErrorKind::Tls
        } else {
            TransportErrorKind::Connect
        }
    } else if e.is_body() || e.is_decode() {
        TransportErrorKind::Body
    } else if e.is_request() || e.is_builder() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    TransportState::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_navigation::{FetchEvent, FetchEventKind};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn request(generation: u64, url: &str, cache_mode: CacheMode) -> FetchRequest {
        FetchRequest {
            generation,
            uri: Uri::parse(url).unwrap(),
            referrer: None,
            priority: Priority::Main,
            cache_mode,
        }
    }

    fn transport() -> (HttpTransport, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let transport =
            HttpTransport::new(&Config::new("/tmp/tern-test".into()), cache.clone(), Handle::current())
                .unwrap();
        (transport, cache)
    }

    fn terminal(rx: &mut UnboundedReceiver<FetchEvent>) -> FetchOutcome {
        loop {
            match rx.try_recv().unwrap().kind {
                FetchEventKind::Terminal(outcome) => return outcome,
                FetchEventKind::Progress(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_local_schemes_complete_immediately() {
        let (mut transport, _cache) = transport();
        let (sink, mut rx) = CompletionSink::channel();

        transport.fetch(request(1, "about:blank", CacheMode::Normal), &sink);
        assert!(matches!(terminal(&mut rx), FetchOutcome::Ok(entry) if entry.has_content()));

        transport.fetch(request(2, "mailto:someone@example.org", CacheMode::Normal), &sink);
        assert_eq!(terminal(&mut rx), FetchOutcome::ExternalProtocolRequired);

        transport.fetch(request(3, "gopher://example.org/", CacheMode::Normal), &sink);
        assert_eq!(terminal(&mut rx), FetchOutcome::BadUri);

        transport.fetch(request(4, "about:nothing-here", CacheMode::Normal), &sink);
        assert_eq!(terminal(&mut rx), FetchOutcome::BadUri);
    }

    #[tokio::test]
    async fn test_cache_hit_is_synchronous() {
        let (mut transport, cache) = transport();
        let (sink, mut rx) = CompletionSink::channel();
        let uri = Uri::parse("http://cached.example/").unwrap();
        cache.insert(CacheEntry::new(uri.clone(), b"cached".to_vec()));

        transport.fetch(request(1, "http://cached.example/", CacheMode::Normal), &sink);
        let FetchOutcome::Ok(entry) = terminal(&mut rx) else {
            panic!("Expected a cache hit");
        };
        assert_eq!(entry.text(), "cached");
    }

    #[tokio::test]
    async fn test_hard_cancel_evicts() {
        let (mut transport, cache) = transport();
        let (sink, _rx) = CompletionSink::channel();
        let uri = Uri::parse("http://cached.example/").unwrap();
        cache.insert(CacheEntry::new(uri.clone(), b"stale".to_vec()));

        let handle = transport.fetch(request(1, "http://cached.example/", CacheMode::ForceReload), &sink);
        transport.cancel(handle, true);
        assert!(cache.is_empty());

        // Unknown handles are ignored.
        transport.cancel(FetchHandle(999), true);
    }

    /// Serves response headers and the start of a body, then stalls.
    async fn stalled_server(head: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(head).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        format!("http://{addr}/page")
    }

    const STALLED: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n<html>partial";

    async fn first_progress(rx: &mut UnboundedReceiver<FetchEvent>) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            match event.kind {
                FetchEventKind::Progress(_) => return,
                FetchEventKind::Terminal(outcome) => panic!("Transfer ended early: {outcome:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_soft_cancel_keeps_partial_body() {
        let (mut transport, cache) = transport();
        let (sink, mut rx) = CompletionSink::channel();
        let url = stalled_server(STALLED).await;

        let handle = transport.fetch(request(1, &url, CacheMode::Normal), &sink);
        first_progress(&mut rx).await;
        transport.cancel(handle, false);

        let entry = cache.lookup(&Uri::parse(&url).unwrap()).unwrap();
        assert!(entry.incomplete);
        assert_eq!(entry.text(), "<html>partial");
        assert_eq!(entry.content_type.as_deref(), Some("text/html"));

        // Incomplete entries do not satisfy a normal load.
        assert!(cache.validated(&entry.uri, CacheMode::Normal).is_none());
        assert!(cache.validated(&entry.uri, CacheMode::Always).is_some());
    }

    #[tokio::test]
    async fn test_hard_cancel_drops_partial_body() {
        let (mut transport, cache) = transport();
        let (sink, mut rx) = CompletionSink::channel();
        let url = stalled_server(STALLED).await;

        let handle = transport.fetch(request(1, &url, CacheMode::Normal), &sink);
        first_progress(&mut rx).await;
        transport.cancel(handle, true);

        assert!(cache.lookup(&Uri::parse(&url).unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_file_scheme_reads_local_file() {
        let (mut transport, _cache) = transport();
        let (sink, mut rx) = CompletionSink::channel();

        let path = std::env::temp_dir().join(format!("tern-transport-{}.html", std::process::id()));
        std::fs::write(&path, "<title>Local</title>").unwrap();
        let url = reqwest::Url::from_file_path(&path).unwrap();

        transport.fetch(request(1, url.as_str(), CacheMode::Normal), &sink);
        let event = rx.recv().await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let FetchEventKind::Terminal(FetchOutcome::Ok(entry)) = event.kind else {
            panic!("Expected file contents");
        };
        assert_eq!(entry.content_type.as_deref(), Some("text/html"));
        assert!(entry.text().contains("Local"));
    }
}
