//! Viewport controller
//!
//! A [`Session`] owns everything about one open book: the document, the
//! layout, the render cache, the page slots and the turn widget. It is driven
//! from a single thread: the host calls [`Session::notify_resize`] when the
//! container changes size and [`Session::tick`] from its event loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::cache::{RenderCache, RenderOptions};
use super::debounce::ResizeDebouncer;
use super::engine::{DocumentEngine, DocumentHandle, EngineError, PageHandle};
use super::layout::{DEFAULT_ASPECT, DEFAULT_GUTTER, LayoutSpec};
use super::prefetch::PREFETCH_RADIUS;
use super::request::{RenderOutcome, RenderTicket};
use super::slots::PageSlots;
use super::state::{Command, Effect, ViewState};
use super::widget::{TurnEvent, TurnWidget, WidgetConfig, WidgetError};
use super::DEFAULT_RESIZE_QUIET_MS;

/// Session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    /// Opening the document. A session whose load failed stays here.
    Loading,
    Ready,
}

/// Fatal errors while opening a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentLoadError {
    #[error("could not open `{source_path}`: {source}")]
    Open {
        source_path: String,
        #[source]
        source: EngineError,
    },

    #[error("`{source_path}` has no pages")]
    Empty { source_path: String },

    #[error("could not measure the first page of `{source_path}`: {source}")]
    FirstPage {
        source_path: String,
        #[source]
        source: EngineError,
    },

    #[error("an earlier load failed; tear the session down before loading again")]
    Abandoned,
}

/// An open document
pub struct DocumentState<D> {
    pub handle: D,
    pub source: String,
    pub page_count: usize,
    /// Width over height of the first page
    pub aspect: f32,
}

/// Tunables for a session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub gutter: u32,
    pub fallback_aspect: f32,
    pub resize_quiet: Duration,
    pub prefetch_radius: usize,
    pub render: RenderOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gutter: DEFAULT_GUTTER,
            fallback_aspect: DEFAULT_ASPECT,
            resize_quiet: Duration::from_millis(DEFAULT_RESIZE_QUIET_MS),
            prefetch_radius: PREFETCH_RADIUS,
            render: RenderOptions::default(),
        }
    }
}

/// One open book
pub struct Session<E: DocumentEngine, W: TurnWidget> {
    engine: Arc<E>,
    widget: W,
    widget_ready: bool,
    config: SessionConfig,
    phase: SessionPhase,
    view: ViewState,
    document: Option<DocumentState<E::Document>>,
    cache: Option<RenderCache>,
    slots: PageSlots,
    pending: Vec<RenderTicket>,
    debouncer: ResizeDebouncer,
    event_tx: Sender<TurnEvent>,
    event_rx: Receiver<TurnEvent>,
}

impl<E: DocumentEngine, W: TurnWidget> Session<E, W> {
    #[must_use]
    pub fn create(engine: Arc<E>, widget: W, config: SessionConfig) -> Self {
        let (event_tx, event_rx) = flume::unbounded();
        Self {
            engine,
            widget,
            widget_ready: false,
            view: Self::fresh_view(&config, 0),
            debouncer: ResizeDebouncer::new(config.resize_quiet),
            config,
            phase: SessionPhase::Uninitialized,
            document: None,
            cache: None,
            slots: PageSlots::new(),
            pending: Vec::new(),
            event_tx,
            event_rx,
        }
    }

    fn fresh_view(config: &SessionConfig, container_width: u32) -> ViewState {
        ViewState::new(
            container_width,
            config.gutter,
            config.fallback_aspect,
            config.prefetch_radius,
        )
    }

    /// Open `source`, lay it out for `container_width`, show the first spread.
    ///
    /// Blocks until pages 1-3 are rendered. A failure is fatal for this
    /// session: it stays in [`SessionPhase::Loading`] until torn down.
    pub fn load(&mut self, source: &str, container_width: u32) -> Result<(), DocumentLoadError> {
        match self.phase {
            SessionPhase::Loading => return Err(DocumentLoadError::Abandoned),
            SessionPhase::Ready => self.teardown(),
            SessionPhase::Uninitialized => {}
        }

        info!("Loading {source} into a {container_width}px container");
        self.phase = SessionPhase::Loading;
        self.view = Self::fresh_view(&self.config, container_width);

        let handle = self
            .engine
            .open_document(source)
            .map_err(|source_err| DocumentLoadError::Open {
                source_path: source.to_string(),
                source: source_err,
            })?;

        let page_count = handle.page_count();
        if page_count == 0 {
            return Err(DocumentLoadError::Empty {
                source_path: source.to_string(),
            });
        }

        let aspect = handle
            .page(1)
            .and_then(|page| page.viewport(1.0))
            .map(|viewport| viewport.aspect())
            .map_err(|source_err| DocumentLoadError::FirstPage {
                source_path: source.to_string(),
                source: source_err,
            })?;

        info!("Opened {source}: {page_count} pages, aspect {aspect:.3}");

        self.cache = Some(RenderCache::new(
            Arc::clone(&self.engine),
            source,
            self.config.render,
        ));
        self.document = Some(DocumentState {
            handle,
            source: source.to_string(),
            page_count,
            aspect,
        });

        let effects = self.view.apply(Command::DocumentLoaded { page_count, aspect });
        self.execute_effects(effects);

        self.phase = SessionPhase::Ready;
        Ok(())
    }

    /// Record a container resize; the reflow happens on a later [`tick`](Self::tick)
    pub fn notify_resize(&mut self, container_width: u32, now: Instant) {
        if self.phase != SessionPhase::Ready {
            return;
        }
        self.debouncer.queue(container_width, now);
    }

    /// Run a due reflow, then process widget events and finished renders
    pub fn tick(&mut self, now: Instant) {
        if self.phase == SessionPhase::Ready {
            if let Some(width) = self.debouncer.take_ready(now) {
                self.reflow(width);
            }
        }
        self.pump();
    }

    /// Time until a pending resize is due
    #[must_use]
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    fn reflow(&mut self, container_width: u32) {
        let current_page = match self.widget.current_page() {
            Ok(page) if self.widget_ready => Some(page),
            Ok(_) => None,
            Err(e) => {
                debug!("Widget cannot report its page: {e}");
                None
            }
        };

        let effects = self.view.apply(Command::Reflow {
            container_width,
            current_page,
        });
        info!(
            "Reflow for {container_width}px: pages {}x{}, gutter {}",
            self.view.layout.page_width, self.view.layout.page_height, self.view.layout.gutter
        );
        self.execute_effects(effects);
    }

    /// Handle queued turn events and attach any renders that have finished
    pub fn pump(&mut self) {
        let events: Vec<TurnEvent> = self.event_rx.try_iter().collect();
        for event in events {
            debug!("Turn event {event:?}");
            let effects = self.view.apply(Command::Turn(event));
            self.execute_effects(effects);
        }

        let pending = std::mem::take(&mut self.pending);
        for ticket in pending {
            match ticket.try_resolve() {
                Some(outcome) => self.accept(outcome),
                None => self.pending.push(ticket),
            }
        }
    }

    /// Pump until every queued render finished or `timeout` elapsed.
    ///
    /// Returns true if nothing is left pending.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.pending.is_empty() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let ticket = self.pending.remove(0);
            match ticket.wait_timeout(remaining) {
                Some(outcome) => self.accept(outcome),
                None => {
                    self.pending.insert(0, ticket);
                    return false;
                }
            }
        }
    }

    /// Jump the book to `page`
    pub fn go_to_page(&mut self, page: usize) -> Result<(), WidgetError> {
        if !self.widget_ready {
            return Err(WidgetError::NotInitialized);
        }
        self.widget.go_to_page(page)
    }

    /// Release the document, the cache and the widget
    pub fn teardown(&mut self) {
        if self.phase == SessionPhase::Uninitialized {
            return;
        }
        info!("Tearing down session");
        self.widget.unsubscribe();
        if self.widget_ready {
            if let Err(e) = self.widget.destroy() {
                warn!("Turn widget destroy failed: {e}");
            }
            self.widget_ready = false;
        }
        let _ = self.event_rx.try_iter().count();
        self.cache = None;
        self.pending.clear();
        self.slots.clear();
        self.document = None;
        self.debouncer.clear();
        self.view = Self::fresh_view(&self.config, self.view.container_width);
        self.phase = SessionPhase::Uninitialized;
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RebuildSlots(page_count) => self.slots.rebuild(page_count),

                Effect::InitWidget => self.init_widget(),

                Effect::ResizeWidget { width, height } => self.resize_widget(width, height),

                Effect::InvalidateCache => {
                    if let Some(cache) = &self.cache {
                        cache.invalidate_all();
                    }
                    self.pending.clear();
                    self.slots.clear_surfaces();
                }

                Effect::AwaitPages(pages) => {
                    for page in pages {
                        if let Some(ticket) = self.request(page) {
                            self.accept(ticket.wait());
                        }
                    }
                }

                Effect::RenderPages(pages) => {
                    for page in pages {
                        if let Some(ticket) = self.request(page) {
                            match ticket.try_resolve() {
                                Some(outcome) => self.accept(outcome),
                                None => self.pending.push(ticket),
                            }
                        }
                    }
                }
            }
        }
    }

    fn request(&self, page: usize) -> Option<RenderTicket> {
        let cache = self.cache.as_ref()?;
        Some(cache.get_or_render_page(page, &self.view.layout))
    }

    fn accept(&mut self, outcome: RenderOutcome) {
        match outcome {
            Ok(surface) => {
                debug!(
                    "Page {} ready ({}x{} px)",
                    surface.page, surface.width_px, surface.height_px
                );
                self.slots.attach(surface);
            }
            Err(e) => error!("Render error: {e}"),
        }
    }

    fn init_widget(&mut self) {
        if self.widget_ready {
            if let Err(e) = self.widget.destroy() {
                debug!("Destroying previous turn widget failed: {e}");
            }
            self.widget_ready = false;
        }

        let config = WidgetConfig::for_spread(&self.view.layout, self.view.page_count);
        match self.widget.init(&config) {
            Ok(()) => {
                self.widget_ready = true;
                self.widget.subscribe(self.event_tx.clone());
                debug!("Turn widget ready at {}x{}", config.width, config.height);
            }
            Err(e) => error!("Turn widget init failed: {e}"),
        }
    }

    fn resize_widget(&mut self, width: u32, height: u32) {
        if !self.widget_ready {
            self.init_widget();
            return;
        }

        let resized = self
            .widget
            .resize(width, height)
            .and_then(|()| self.widget.set_page_count(self.view.page_count));
        if let Err(e) = resized {
            warn!("Turn widget reconfigure failed ({e}), rebuilding it");
            self.init_widget();
            let page = self.view.active_page;
            if self.widget_ready && page > 1 {
                if let Err(e) = self.widget.go_to_page(page) {
                    warn!("Could not restore page {page} after rebuild: {e}");
                }
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn layout(&self) -> LayoutSpec {
        self.view.layout
    }

    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[must_use]
    pub fn active_page(&self) -> usize {
        self.view.active_page
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentState<E::Document>> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |doc| doc.page_count)
    }

    #[must_use]
    pub fn slots(&self) -> &PageSlots {
        &self.slots
    }

    #[must_use]
    pub fn cache(&self) -> Option<&RenderCache> {
        self.cache.as_ref()
    }

    #[must_use]
    pub fn pending_renders(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_resize_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    #[must_use]
    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
