//! Main browser state container
//!
//! Owns the database, the address bar resolver and one navigation
//! controller wired to the HTTP transport, and turns navigation events into
//! visit log entries.

use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::runtime::Handle;

use tern_navigation::{
    Answer, CacheMode, ConfirmationId, ConfirmationPrompt, ImageMapChoice,
    InputResolution, InputResolver, Location, LocationId, NavigationConfig, NavigationController,
    NavigationEvent, NavigationRequest, Services, Transport, Uri, VisitLog,
};
use tern_storage::Database;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::external::CommandHandlers;
use crate::prompter::QueuedPrompter;
use crate::transport::HttpTransport;
use crate::Result;

const SETTING_HOMEPAGE: &str = "homepage";
const SETTING_SEARCH_ENGINE: &str = "search_engine";
const SETTING_NAVIGATION: &str = "navigation";

pub struct Browser {
    config: Config,
    db: Database,
    visits: VisitLog,
    input_resolver: InputResolver,
    cache: Arc<MemoryCache>,
    prompter: QueuedPrompter,
    controller: NavigationController,
}

impl Browser {
    /// Open the database and build a browser fetching over HTTP. Must be
    /// called from within a tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;

        let runtime = Handle::try_current()
            .map_err(|e| crate::CoreError::Config(format!("no async runtime: {e}")))?;
        let cache = Arc::new(MemoryCache::new());
        let transport = HttpTransport::new(&config, cache.clone(), runtime)?;

        Ok(Self::with_transport(config, db, cache, Box::new(transport)))
    }

    /// Build a browser around an existing database and transport.
    pub fn with_transport(
        config: Config,
        db: Database,
        cache: Arc<MemoryCache>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let prompter = QueuedPrompter::new();
        let services = Services {
            transport,
            cache: cache.clone(),
            history: Box::new(tern_navigation::HistoryList::new()),
            prompter: Box::new(prompter.clone()),
            external: Box::new(CommandHandlers::new(config.external_handlers.clone())),
        };
        let controller = NavigationController::new(&config.navigation, services);

        Self {
            visits: VisitLog::new(db.clone()),
            input_resolver: InputResolver::with_search_engine(config.search_engine.clone()),
            config,
            db,
            cache,
            prompter,
            controller,
        }
    }

    /// Apply settings saved in the database over the configuration.
    pub fn initialize(&mut self) -> Result<()> {
        if let Some(homepage) = self.db.get_setting(SETTING_HOMEPAGE)? {
            self.config.homepage = Some(homepage);
        }

        if let Some(template) = self.db.get_setting(SETTING_SEARCH_ENGINE)? {
            self.input_resolver.set_search_engine(template.clone());
            self.config.search_engine = template;
        }

        if let Some(value) = self.db.get_setting_json(SETTING_NAVIGATION)? {
            let navigation: NavigationConfig = serde_json::from_value(value)?;
            self.controller.reconfigure(&navigation);
            self.config.navigation = navigation;
        }

        tracing::info!(
            homepage = %self.config.start_page(),
            max_redirects = self.config.navigation.max_redirects,
            "Browser initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn visits(&self) -> &VisitLog {
        &self.visits
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn current(&self) -> Option<&Location> {
        self.controller.history().current()
    }

    pub fn is_loading(&self) -> bool {
        self.controller.is_loading()
    }

    // === Settings ===

    pub fn set_homepage(&mut self, homepage: &str) -> Result<()> {
        self.db.set_setting(SETTING_HOMEPAGE, homepage)?;
        self.config.homepage = Some(homepage.to_string());
        Ok(())
    }

    pub fn set_search_engine(&mut self, template: &str) -> Result<()> {
        self.db.set_setting(SETTING_SEARCH_ENGINE, template)?;
        self.input_resolver.set_search_engine(template);
        self.config.search_engine = template.to_string();
        Ok(())
    }

    pub fn set_navigation_config(&mut self, navigation: NavigationConfig) -> Result<()> {
        self.db
            .set_setting_json(SETTING_NAVIGATION, &serde_json::to_value(&navigation)?)?;
        self.controller.reconfigure(&navigation);
        self.config.navigation = navigation;
        Ok(())
    }

    // === Navigation ===

    /// Go to whatever the user typed: an address or a search.
    pub fn open(&mut self, input: &str) -> Result<Uri> {
        let resolution = self.input_resolver.resolve(input)?;
        if let InputResolution::Search(uri) = &resolution {
            tracing::debug!(search = %uri, "Input resolved to search");
        }
        let uri = resolution.into_uri();
        self.controller.navigate(NavigationRequest::new(uri.clone()));
        Ok(uri)
    }

    pub fn home(&mut self) -> Result<Uri> {
        let start = self.config.start_page();
        self.open(&start)
    }

    pub fn back(&mut self) -> bool {
        self.controller.go_back()
    }

    pub fn forward(&mut self) -> bool {
        self.controller.go_forward()
    }

    pub fn go_to_location(&mut self, id: LocationId) -> Result<()> {
        Ok(self.controller.go_to_location(id)?)
    }

    pub fn reload(&mut self, cache_mode: CacheMode) -> Result<()> {
        Ok(self.controller.reload(cache_mode)?)
    }

    pub fn follow_image_map(&mut self, uri: Uri, target_frame: Option<String>) {
        self.controller.follow_image_map(uri, target_frame);
    }

    pub fn choose_image_map_entry(&mut self, choice: ImageMapChoice) {
        self.controller.choose_image_map_entry(choice);
    }

    pub fn abort(&mut self) {
        self.controller.abort(true);
    }

    /// Questions waiting for [`answer`](Self::answer).
    pub fn pending_questions(&self) -> Vec<(ConfirmationId, ConfirmationPrompt)> {
        self.prompter.take_all()
    }

    pub fn answer(&mut self, id: ConfirmationId, answer: Answer) -> Result<()> {
        Ok(self.controller.answer(id, answer)?)
    }

    /// Collect what happened since the last call, recording displayed
    /// pages in the visit log.
    pub fn events(&mut self) -> Vec<NavigationEvent> {
        let events = self.controller.drain_events();
        for event in &events {
            if let NavigationEvent::Displayed { location, uri } = event {
                self.record_visit(*location, uri);
            }
        }
        events
    }

    /// Drive the current navigation until nothing is loading.
    pub async fn run_until_idle(&mut self) -> Vec<NavigationEvent> {
        let mut events = self.events();
        while self.controller.wait_for_event().await {
            events.extend(self.events());
        }
        events
    }

    fn record_visit(&self, location: LocationId, uri: &Uri) {
        let title = self
            .controller
            .history()
            .find(location)
            .and_then(|loc| loc.content.as_ref())
            .and_then(|entry| document_title(&entry.text()))
            .unwrap_or_default();

        if let Err(e) = self.visits.record(uri, &title) {
            tracing::warn!(uri = %uri.public_string(), error = %e, "Failed to record visit");
        }
    }
}

/// The `<title>` of an HTML document, whitespace collapsed.
pub fn document_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let doc = Html::parse_document(html);
    let title = doc
        .select(&selector)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}
