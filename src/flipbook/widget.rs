//! Page-turn widget seam
//!
//! The animation itself lives outside this crate. The controller sizes the
//! widget, tells it the page count, asks where it is, and listens for the two
//! events it emits while turning.

use std::time::Duration;

use flume::Sender;
use log::debug;

use super::layout::LayoutSpec;
use super::slots::spread_pages;

/// Events emitted by a turn widget, each carrying the destination page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    /// A turn towards `page` started
    Turning(usize),
    /// The book settled on `page`
    Turned(usize),
}

impl TurnEvent {
    #[must_use]
    pub const fn page(&self) -> usize {
        match self {
            Self::Turning(page) | Self::Turned(page) => *page,
        }
    }
}

/// How many pages the widget shows at once
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Display {
    Single,
    #[default]
    Double,
}

/// Widget construction options
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetConfig {
    pub width: u32,
    pub height: u32,
    pub pages: usize,
    pub display: Display,
    pub duration: Duration,
    pub elevation: u32,
    pub gradients: bool,
    pub acceleration: bool,
    pub auto_center: bool,
}

impl WidgetConfig {
    /// Two-up book sized to the spread of `layout`
    #[must_use]
    pub fn for_spread(layout: &LayoutSpec, pages: usize) -> Self {
        Self {
            width: layout.spread_width(),
            height: layout.spread_height(),
            pages,
            display: Display::Double,
            duration: Duration::from_millis(700),
            elevation: 50,
            gradients: true,
            acceleration: true,
            auto_center: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("turn widget is not initialized")]
    NotInitialized,

    #[error("turn widget rejected size {width}x{height}: {detail}")]
    Resize {
        width: u32,
        height: u32,
        detail: String,
    },

    #[error("page {page} out of range (book has {page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("turn widget: {0}")]
    Backend(String),
}

/// A page-turn widget
pub trait TurnWidget {
    fn init(&mut self, config: &WidgetConfig) -> Result<(), WidgetError>;

    fn resize(&mut self, width: u32, height: u32) -> Result<(), WidgetError>;

    fn set_page_count(&mut self, pages: usize) -> Result<(), WidgetError>;

    fn go_to_page(&mut self, page: usize) -> Result<(), WidgetError>;

    /// Page the book is currently open at
    fn current_page(&self) -> Result<usize, WidgetError>;

    fn destroy(&mut self) -> Result<(), WidgetError>;

    /// Deliver [`TurnEvent`]s to `events` until [`unsubscribe`](Self::unsubscribe)
    fn subscribe(&mut self, events: Sender<TurnEvent>);

    fn unsubscribe(&mut self);
}

/// Turn widget without animation: turns complete immediately.
///
/// Used by the command-line renderer and by tests.
#[derive(Debug, Default)]
pub struct HeadlessBook {
    config: Option<WidgetConfig>,
    page: usize,
    subscriber: Option<Sender<TurnEvent>>,
    init_count: usize,
    destroy_count: usize,
    page_count_updates: usize,
    failing_resizes: usize,
    position_unknown: bool,
}

impl HeadlessBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `resize` fail
    pub fn fail_next_resizes(&mut self, count: usize) {
        self.failing_resizes = count;
    }

    /// Make `current_page` fail, as a widget mid-teardown would
    pub fn set_position_unknown(&mut self, unknown: bool) {
        self.position_unknown = unknown;
    }

    #[must_use]
    pub fn config(&self) -> Option<&WidgetConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.config.as_ref().map(|c| (c.width, c.height))
    }

    #[must_use]
    pub fn init_count(&self) -> usize {
        self.init_count
    }

    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroy_count
    }

    /// Calls to `set_page_count` since creation
    #[must_use]
    pub fn page_count_updates(&self) -> usize {
        self.page_count_updates
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscriber.is_some()
    }

    /// Turn to the next spread
    pub fn next_spread(&mut self) -> Result<(), WidgetError> {
        let config = self.config.as_ref().ok_or(WidgetError::NotInitialized)?;
        let (left, right) = spread_pages(self.page, config.pages);
        let last = right.or(left).unwrap_or(self.page);
        if last >= config.pages {
            return Ok(());
        }
        self.go_to_page(last + 1)
    }

    /// Turn to the previous spread
    pub fn previous_spread(&mut self) -> Result<(), WidgetError> {
        let config = self.config.as_ref().ok_or(WidgetError::NotInitialized)?;
        let (left, right) = spread_pages(self.page, config.pages);
        let first = left.or(right).unwrap_or(self.page);
        if first <= 1 {
            return Ok(());
        }
        self.go_to_page(first - 1)
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.subscriber {
            let _ = tx.send(event);
        }
    }
}

impl TurnWidget for HeadlessBook {
    fn init(&mut self, config: &WidgetConfig) -> Result<(), WidgetError> {
        debug!(
            "Headless book init {}x{}, {} pages",
            config.width, config.height, config.pages
        );
        self.config = Some(config.clone());
        self.page = if config.pages > 0 { 1 } else { 0 };
        self.init_count += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), WidgetError> {
        let config = self.config.as_mut().ok_or(WidgetError::NotInitialized)?;
        if self.failing_resizes > 0 {
            self.failing_resizes -= 1;
            return Err(WidgetError::Resize {
                width,
                height,
                detail: "injected failure".to_string(),
            });
        }
        config.width = width;
        config.height = height;
        Ok(())
    }

    fn set_page_count(&mut self, pages: usize) -> Result<(), WidgetError> {
        let config = self.config.as_mut().ok_or(WidgetError::NotInitialized)?;
        config.pages = pages;
        self.page = self.page.min(pages);
        self.page_count_updates += 1;
        Ok(())
    }

    fn go_to_page(&mut self, page: usize) -> Result<(), WidgetError> {
        let config = self.config.as_ref().ok_or(WidgetError::NotInitialized)?;
        if page == 0 || page > config.pages {
            return Err(WidgetError::PageOutOfRange {
                page,
                page_count: config.pages,
            });
        }
        self.emit(TurnEvent::Turning(page));
        self.page = page;
        self.emit(TurnEvent::Turned(page));
        Ok(())
    }

    fn current_page(&self) -> Result<usize, WidgetError> {
        if self.config.is_none() {
            return Err(WidgetError::NotInitialized);
        }
        if self.position_unknown {
            return Err(WidgetError::Backend("position unavailable".to_string()));
        }
        Ok(self.page)
    }

    fn destroy(&mut self) -> Result<(), WidgetError> {
        self.config = None;
        self.page = 0;
        self.destroy_count += 1;
        Ok(())
    }

    fn subscribe(&mut self, events: Sender<TurnEvent>) {
        self.subscriber = Some(events);
    }

    fn unsubscribe(&mut self) {
        self.subscriber = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flipbook::layout::{DEFAULT_ASPECT, compute_layout};

    fn book(pages: usize) -> HeadlessBook {
        let mut book = HeadlessBook::new();
        let layout = compute_layout(1200, 16, DEFAULT_ASPECT);
        book.init(&WidgetConfig::for_spread(&layout, pages)).unwrap();
        book
    }

    #[test]
    fn config_matches_spread() {
        let layout = compute_layout(1200, 16, DEFAULT_ASPECT);
        let config = WidgetConfig::for_spread(&layout, 12);
        assert_eq!(config.width, 2 * 592 + 16);
        assert_eq!(config.height, 789);
        assert_eq!(config.display, Display::Double);
        assert_eq!(config.duration, Duration::from_millis(700));
        assert_eq!(config.elevation, 50);
    }

    #[test]
    fn go_to_page_emits_turning_then_turned() {
        let mut book = book(10);
        let (tx, rx) = flume::unbounded();
        book.subscribe(tx);

        book.go_to_page(6).unwrap();
        assert_eq!(book.current_page().unwrap(), 6);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![TurnEvent::Turning(6), TurnEvent::Turned(6)]);

        book.unsubscribe();
        book.go_to_page(7).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn go_to_page_rejects_out_of_range() {
        let mut book = book(4);
        assert!(matches!(
            book.go_to_page(5),
            Err(WidgetError::PageOutOfRange { page: 5, .. })
        ));
        assert!(book.go_to_page(0).is_err());
    }

    #[test]
    fn uninitialized_widget_errors() {
        let mut book = HeadlessBook::new();
        assert!(matches!(book.resize(10, 10), Err(WidgetError::NotInitialized)));
        assert!(book.current_page().is_err());
    }

    #[test]
    fn injected_resize_failures_run_out() {
        let mut book = book(4);
        book.fail_next_resizes(1);
        assert!(book.resize(100, 50).is_err());
        book.resize(100, 50).unwrap();
        assert_eq!(book.size(), Some((100, 50)));
    }

    #[test]
    fn spreads_walk_forward_and_back() {
        let mut book = book(7);
        book.next_spread().unwrap();
        assert_eq!(book.current_page().unwrap(), 2);
        book.next_spread().unwrap();
        assert_eq!(book.current_page().unwrap(), 4);
        book.previous_spread().unwrap();
        assert_eq!(book.current_page().unwrap(), 3);
        book.previous_spread().unwrap();
        assert_eq!(book.current_page().unwrap(), 1);
        book.previous_spread().unwrap();
        assert_eq!(book.current_page().unwrap(), 1);
    }
}
