//! Page render cache
//!
//! Maps a page at a given pixel size to its rendered surface. This is the
//! only way pages get rasterized: misses are queued to the worker pool, and
//! concurrent requests for a key that is already being rendered wait on the
//! same job instead of starting another one.
//!
//! Every entry belongs to the current page dimensions. Asking for a page at
//! different dimensions, or calling [`RenderCache::invalidate_all`], drops
//! all entries and all in-flight waiters. Workers that finish a render from
//! before the drop find a different generation and throw the result away.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flume::Sender;
use log::{debug, error};
use lru::LruCache;

use super::engine::DocumentEngine;
use super::layout::LayoutSpec;
use super::prefetch::PREFETCH_RADIUS;
use super::request::{PageRenderError, RenderJob, RenderOutcome, RenderTicket};
use super::types::{PageSurface, Rgb};
use super::worker::render_worker;
use super::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};

/// Cache key for rendered pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number (1-indexed)
    pub page: usize,
    /// Target page width in layout pixels
    pub page_width: u32,
    /// Target page height in layout pixels
    pub page_height: u32,
}

impl CacheKey {
    #[must_use]
    pub const fn new(page: usize, layout: &LayoutSpec) -> Self {
        Self {
            page,
            page_width: layout.page_width,
            page_height: layout.page_height,
        }
    }

    #[must_use]
    pub const fn dims(&self) -> (u32, u32) {
        (self.page_width, self.page_height)
    }
}

/// How surfaces are rasterized and how many are kept
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    /// Physical pixels per layout pixel
    pub device_pixel_ratio: f32,
    /// Extra resolution multiplier on top of the device pixel ratio
    pub scale_multiplier: f32,
    /// Background painted before the page is drawn
    pub paper: Rgb,
    /// Number of render worker threads
    pub workers: usize,
    /// Completed surfaces kept for the current layout
    pub capacity: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            scale_multiplier: 1.0,
            paper: Rgb::PAPER,
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CACHE_SIZE,
        }
    }
}

impl RenderOptions {
    fn sanitized(self) -> Self {
        let positive = |v: f32| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        Self {
            device_pixel_ratio: positive(self.device_pixel_ratio),
            scale_multiplier: positive(self.scale_multiplier),
            workers: self.workers.max(1),
            // Never smaller than one neighborhood, or warm pages evict each other.
            capacity: self.capacity.max(2 * PREFETCH_RADIUS + 1),
            ..self
        }
    }
}

/// Counters for cache traffic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a completed entry
    pub hits: u64,
    /// Requests that joined a render already in flight
    pub coalesced: u64,
    /// Renders that completed and were stored
    pub rasterized: u64,
    /// Renders that failed
    pub failed: u64,
    /// Renders thrown away because the layout changed underneath them
    pub discarded: u64,
}

/// State shared between the cache and its workers
pub(crate) struct CacheIndex {
    generation: u64,
    dims: Option<(u32, u32)>,
    ready: LruCache<CacheKey, Arc<PageSurface>>,
    in_flight: HashMap<CacheKey, Vec<Sender<RenderOutcome>>>,
    stats: CacheStats,
}

impl CacheIndex {
    fn new(capacity: usize) -> Self {
        Self {
            generation: 0,
            dims: None,
            ready: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            in_flight: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.ready.clear();
        // Dropping the senders resolves every waiting ticket as superseded.
        self.in_flight.clear();
    }

    /// Whether a job issued under `generation` for `key` is still wanted
    pub(crate) fn is_current(&self, key: &CacheKey, generation: u64) -> bool {
        generation == self.generation && self.dims == Some(key.dims())
    }

    pub(crate) fn discard(&mut self, key: &CacheKey) {
        self.stats.discarded += 1;
        debug!(
            "Discarding stale render of page {} at {}x{}",
            key.page, key.page_width, key.page_height
        );
    }

    /// Store a finished render and wake its waiters
    pub(crate) fn complete(
        &mut self,
        key: CacheKey,
        generation: u64,
        outcome: Result<PageSurface, PageRenderError>,
    ) {
        if !self.is_current(&key, generation) {
            self.discard(&key);
            return;
        }

        let waiters = self.in_flight.remove(&key).unwrap_or_default();
        match outcome {
            Ok(surface) => {
                self.stats.rasterized += 1;
                let surface = Arc::new(surface);
                self.ready.put(key, Arc::clone(&surface));
                for waiter in waiters {
                    let _ = waiter.send(Ok(Arc::clone(&surface)));
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                for waiter in waiters {
                    let _ = waiter.send(Err(err.clone()));
                }
            }
        }
    }
}

pub(crate) fn lock_index(index: &Mutex<CacheIndex>) -> MutexGuard<'_, CacheIndex> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render cache backed by a pool of worker threads
pub struct RenderCache {
    index: Arc<Mutex<CacheIndex>>,
    job_tx: Sender<RenderJob>,
    options: RenderOptions,
}

impl RenderCache {
    /// Spawn workers that each open `source` with `engine`
    #[must_use]
    pub fn new<E: DocumentEngine>(engine: Arc<E>, source: &str, options: RenderOptions) -> Self {
        let options = options.sanitized();
        let index = Arc::new(Mutex::new(CacheIndex::new(options.capacity)));

        // MPMC: every worker pulls from the same queue.
        let (job_tx, job_rx) = flume::unbounded();

        for worker_id in 0..options.workers {
            let engine = Arc::clone(&engine);
            let source = source.to_string();
            let jobs = job_rx.clone();
            let index = Arc::clone(&index);

            let spawned = std::thread::Builder::new()
                .name(format!("page-render-{worker_id}"))
                .spawn(move || render_worker(engine.as_ref(), &source, jobs, &index));
            if let Err(e) = spawned {
                error!("Failed to spawn render worker {worker_id}: {e}");
            }
        }

        Self {
            index,
            job_tx,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Get the surface for `page` at `layout`, rendering it if needed
    pub fn get_or_render_page(&self, page: usize, layout: &LayoutSpec) -> RenderTicket {
        let key = CacheKey::new(page, layout);
        let mut index = lock_index(&self.index);

        if index.dims != Some(key.dims()) {
            if let Some((w, h)) = index.dims {
                debug!(
                    "Layout changed {w}x{h} -> {}x{}, dropping cached pages",
                    key.page_width, key.page_height
                );
            }
            index.invalidate();
            index.dims = Some(key.dims());
        }

        if let Some(surface) = index.ready.get(&key).cloned() {
            index.stats.hits += 1;
            return RenderTicket::Ready(surface);
        }

        let (tx, rx) = flume::bounded(1);
        if let Some(waiters) = index.in_flight.get_mut(&key) {
            waiters.push(tx);
            index.stats.coalesced += 1;
            debug!("Page {page} already rendering, joining in-flight job");
            return RenderTicket::Pending { key, rx };
        }

        index.in_flight.insert(key, vec![tx]);
        let generation = index.generation;
        drop(index);

        let job = RenderJob::Page {
            key,
            generation,
            device_pixel_ratio: self.options.device_pixel_ratio,
            scale_multiplier: self.options.scale_multiplier,
            paper: self.options.paper,
        };
        if self.job_tx.send(job).is_err() {
            let mut index = lock_index(&self.index);
            for waiter in index.in_flight.remove(&key).unwrap_or_default() {
                let _ = waiter.send(Err(PageRenderError::WorkerGone { page }));
            }
        }

        RenderTicket::Pending { key, rx }
    }

    /// Drop every cached surface and abandon in-flight renders
    pub fn invalidate_all(&self) {
        let mut index = lock_index(&self.index);
        debug!(
            "Invalidating {} cached pages, {} in flight",
            index.ready.len(),
            index.in_flight.len()
        );
        index.invalidate();
    }

    /// Check if a completed surface is cached, without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        lock_index(&self.index).ready.contains(key)
    }

    #[must_use]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        lock_index(&self.index).in_flight.contains_key(key)
    }

    /// Number of completed surfaces
    #[must_use]
    pub fn len(&self) -> usize {
        lock_index(&self.index).ready.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        lock_index(&self.index).stats
    }

    /// Stop all workers. Pending tickets resolve as superseded.
    pub fn shutdown(&self) {
        lock_index(&self.index).invalidate();
        for _ in 0..self.options.workers {
            let _ = self.job_tx.send(RenderJob::Shutdown);
        }
    }
}

impl Drop for RenderCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::flipbook::layout::{DEFAULT_ASPECT, compute_layout};
    use crate::test_utils::FakeEngine;

    const WAIT: Duration = Duration::from_secs(5);

    fn layout() -> LayoutSpec {
        compute_layout(1200, 16, DEFAULT_ASPECT)
    }

    fn cache_for(engine: &FakeEngine) -> RenderCache {
        RenderCache::new(Arc::new(engine.clone()), "fake.pdf", RenderOptions::default())
    }

    #[test]
    fn key_compares_by_value() {
        let a = CacheKey::new(3, &layout());
        let b = CacheKey {
            page: 3,
            page_width: 592,
            page_height: 789,
        };
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new(4, &layout()));
        let other = compute_layout(800, 16, DEFAULT_ASPECT);
        assert_ne!(a, CacheKey::new(3, &other));
    }

    #[test]
    fn tiny_capacity_still_holds_a_neighborhood() {
        let engine = FakeEngine::new(10);
        let options = RenderOptions {
            capacity: 1,
            ..RenderOptions::default()
        };
        let cache = RenderCache::new(Arc::new(engine.clone()), "fake.pdf", options);
        assert_eq!(cache.options().capacity, 2 * PREFETCH_RADIUS + 1);

        let first: Vec<_> = (3..=7)
            .map(|page| cache.get_or_render_page(page, &layout()).wait().unwrap())
            .collect();
        for (page, surface) in (3..=7).zip(&first) {
            let again = cache.get_or_render_page(page, &layout()).wait().unwrap();
            assert!(Arc::ptr_eq(surface, &again));
        }
        assert_eq!(engine.render_calls(), 5);
    }

    #[test]
    fn second_request_hits_cache() {
        let engine = FakeEngine::new(10);
        let cache = cache_for(&engine);

        let first = cache.get_or_render_page(1, &layout()).wait().unwrap();
        let second = cache.get_or_render_page(1, &layout());
        assert!(second.is_ready());
        let second = second.wait().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.render_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_all_forces_fresh_render() {
        let engine = FakeEngine::new(10);
        let cache = cache_for(&engine);

        let first = cache.get_or_render_page(2, &layout()).wait().unwrap();
        cache.invalidate_all();
        assert!(cache.is_empty());

        let again = cache.get_or_render_page(2, &layout()).wait().unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(engine.render_calls(), 2);
    }

    #[test]
    fn concurrent_requests_share_one_render() {
        let (engine, gate) = FakeEngine::gated(10);
        let cache = cache_for(&engine);

        let a = cache.get_or_render_page(1, &layout());
        assert_eq!(gate.wait_started(WAIT), Some(1));
        let b = cache.get_or_render_page(1, &layout());
        assert!(!b.is_ready());
        assert!(cache.is_in_flight(&CacheKey::new(1, &layout())));

        gate.release(1);
        let a = a.wait().unwrap();
        let b = b.wait().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.render_calls(), 1);
        assert_eq!(cache.stats().coalesced, 1);
    }

    #[test]
    fn failed_render_is_not_cached() {
        let engine = FakeEngine::new(10);
        engine.fail_page(4, 1);
        let cache = cache_for(&engine);

        let err = cache.get_or_render_page(4, &layout()).wait().unwrap_err();
        assert!(matches!(err, PageRenderError::Engine { page: 4, .. }));
        assert!(!cache.contains(&CacheKey::new(4, &layout())));

        let retried = cache.get_or_render_page(4, &layout()).wait();
        assert!(retried.is_ok());
        assert_eq!(engine.render_calls(), 2);
        assert_eq!(cache.stats().failed, 1);
    }

    #[test]
    fn stale_render_is_discarded() {
        let (engine, gate) = FakeEngine::gated(10);
        let options = RenderOptions {
            workers: 1,
            ..RenderOptions::default()
        };
        let cache = RenderCache::new(Arc::new(engine.clone()), "fake.pdf", options);
        let old = layout();
        let new = compute_layout(800, 16, DEFAULT_ASPECT);

        let stale = cache.get_or_render_page(1, &old);
        assert_eq!(gate.wait_started(WAIT), Some(1));

        let fresh = cache.get_or_render_page(1, &new);
        assert!(matches!(
            stale.wait(),
            Err(PageRenderError::Superseded { page: 1 })
        ));

        gate.release(2);
        let fresh = fresh.wait().unwrap();
        assert_eq!(fresh.page, 1);

        assert!(!cache.contains(&CacheKey::new(1, &old)));
        assert!(cache.contains(&CacheKey::new(1, &new)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().discarded, 1);
    }

    #[test]
    fn surface_is_sized_for_device_pixels() {
        let engine = FakeEngine::with_page_size(4, 600.0, 800.0);
        let options = RenderOptions {
            device_pixel_ratio: 2.0,
            ..RenderOptions::default()
        };
        let cache = RenderCache::new(Arc::new(engine.clone()), "fake.pdf", options);
        let layout = LayoutSpec {
            page_width: 300,
            page_height: 400,
            gutter: 16,
        };

        let surface = cache.get_or_render_page(1, &layout).wait().unwrap();
        assert_eq!((surface.width_px, surface.height_px), (600, 800));
        assert!((surface.scale - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn surface_background_is_paper() {
        let engine = FakeEngine::new(2);
        let cache = cache_for(&engine);
        let surface = cache.get_or_render_page(2, &layout()).wait().unwrap();
        let bottom = surface.height_px - 1;
        assert_eq!(surface.pixel(5, bottom), Some(Rgb::PAPER));
    }

    #[test]
    fn out_of_range_page_reports_engine_error() {
        let engine = FakeEngine::new(3);
        let cache = cache_for(&engine);
        let err = cache.get_or_render_page(9, &layout()).wait().unwrap_err();
        assert_eq!(err.page(), 9);
    }

    #[test]
    fn shutdown_supersedes_pending_tickets() {
        let (engine, gate) = FakeEngine::gated(3);
        let cache = cache_for(&engine);
        let ticket = cache.get_or_render_page(1, &layout());
        assert_eq!(gate.wait_started(WAIT), Some(1));
        cache.shutdown();
        gate.release(1);
        assert!(ticket.wait().is_err());
    }
}
