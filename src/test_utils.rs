//! In-memory document engine for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use flume::{Receiver, Sender};

use crate::flipbook::{
    DocumentEngine, DocumentHandle, EngineError, PageHandle, PageSurface, PageViewport,
};

/// Letter-ish default page size in document units
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (600.0, 800.0);

struct FakeShared {
    page_sizes: Vec<(f32, f32)>,
    render_calls: AtomicUsize,
    open_calls: AtomicUsize,
    fail_open: AtomicBool,
    failures: Mutex<HashMap<usize, usize>>,
    rendered: Mutex<Vec<(usize, u32, u32)>>,
    gate: Option<(Sender<usize>, Receiver<()>)>,
}

/// Document engine whose pages are blank rectangles.
///
/// Counts rasterizations, can be told to fail, and can hold every render
/// until the test releases it through a [`RenderGate`].
#[derive(Clone)]
pub struct FakeEngine {
    shared: Arc<FakeShared>,
}

impl FakeEngine {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self::with_pages(vec![DEFAULT_PAGE_SIZE; page_count])
    }

    #[must_use]
    pub fn with_page_size(page_count: usize, width: f32, height: f32) -> Self {
        Self::with_pages(vec![(width, height); page_count])
    }

    #[must_use]
    pub fn with_pages(page_sizes: Vec<(f32, f32)>) -> Self {
        Self::build(page_sizes, None)
    }

    /// Engine whose renders block until released
    #[must_use]
    pub fn gated(page_count: usize) -> (Self, RenderGate) {
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let engine = Self::build(
            vec![DEFAULT_PAGE_SIZE; page_count],
            Some((started_tx, release_rx)),
        );
        let gate = RenderGate {
            started: started_rx,
            release: release_tx,
        };
        (engine, gate)
    }

    fn build(page_sizes: Vec<(f32, f32)>, gate: Option<(Sender<usize>, Receiver<()>)>) -> Self {
        Self {
            shared: Arc::new(FakeShared {
                page_sizes,
                render_calls: AtomicUsize::new(0),
                open_calls: AtomicUsize::new(0),
                fail_open: AtomicBool::new(false),
                failures: Mutex::new(HashMap::new()),
                rendered: Mutex::new(Vec::new()),
                gate,
            }),
        }
    }

    /// Fail the next `times` renders of `page`
    pub fn fail_page(&self, page: usize, times: usize) {
        self.shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page, times);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Total calls to `render_into`
    #[must_use]
    pub fn render_calls(&self) -> usize {
        self.shared.render_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn render_calls_for(&self, page: usize) -> usize {
        self.rendered().iter().filter(|(p, _, _)| *p == page).count()
    }

    #[must_use]
    pub fn open_calls(&self) -> usize {
        self.shared.open_calls.load(Ordering::SeqCst)
    }

    /// `(page, width_px, height_px)` of every render, in call order
    #[must_use]
    pub fn rendered(&self) -> Vec<(usize, u32, u32)> {
        self.shared
            .rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Holds gated renders until released
pub struct RenderGate {
    started: Receiver<usize>,
    release: Sender<()>,
}

impl RenderGate {
    /// Page of the next render that reached the gate
    #[must_use]
    pub fn wait_started(&self, timeout: Duration) -> Option<usize> {
        self.started.recv_timeout(timeout).ok()
    }

    /// Let `count` held renders proceed
    pub fn release(&self, count: usize) {
        for _ in 0..count {
            let _ = self.release.send(());
        }
    }
}

impl DocumentEngine for FakeEngine {
    type Document = FakeDocument;

    fn open_document(&self, source: &str) -> Result<Self::Document, EngineError> {
        self.shared.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(EngineError::Open {
                source_path: source.to_string(),
                detail: "fake open failure".to_string(),
            });
        }
        Ok(FakeDocument {
            shared: Arc::clone(&self.shared),
        })
    }
}

pub struct FakeDocument {
    shared: Arc<FakeShared>,
}

impl DocumentHandle for FakeDocument {
    type Page = FakePage;

    fn page_count(&self) -> usize {
        self.shared.page_sizes.len()
    }

    fn page(&self, page: usize) -> Result<Self::Page, EngineError> {
        let size = page
            .checked_sub(1)
            .and_then(|i| self.shared.page_sizes.get(i))
            .copied()
            .ok_or(EngineError::PageOutOfRange {
                page,
                page_count: self.shared.page_sizes.len(),
            })?;
        Ok(FakePage {
            shared: Arc::clone(&self.shared),
            page,
            size,
        })
    }
}

pub struct FakePage {
    shared: Arc<FakeShared>,
    page: usize,
    size: (f32, f32),
}

impl PageHandle for FakePage {
    fn viewport(&self, scale: f32) -> Result<PageViewport, EngineError> {
        Ok(PageViewport {
            width: self.size.0 * scale,
            height: self.size.1 * scale,
            scale,
        })
    }

    fn render_into(
        &self,
        surface: &mut PageSurface,
        _viewport: &PageViewport,
    ) -> Result<(), EngineError> {
        self.shared.render_calls.fetch_add(1, Ordering::SeqCst);
        self.shared
            .rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.page, surface.width_px, surface.height_px));

        if let Some((started, release)) = &self.shared.gate {
            let _ = started.send(self.page);
            let _ = release.recv();
        }

        {
            let mut failures = self
                .shared
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = failures.get_mut(&self.page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(EngineError::render(format!(
                        "fake failure on page {}",
                        self.page
                    )));
                }
            }
        }

        // Ink the top row so rendered pages differ from blank paper.
        if let Some(row) = surface.row_mut(0) {
            row.fill(0);
        }
        Ok(())
    }
}
