use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flipbook::flipbook::{
    CacheKey, DEFAULT_ASPECT, PageRenderError, RenderCache, RenderOptions, Rgb, compose_spread,
    compute_layout,
};
use flipbook::test_utils::FakeEngine;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn requests_from_two_threads_share_one_render() {
    let (engine, gate) = FakeEngine::gated(10);
    let cache = RenderCache::new(Arc::new(engine.clone()), "book.pdf", RenderOptions::default());
    let layout = compute_layout(1200, 16, DEFAULT_ASPECT);

    let tickets = thread::scope(|scope| {
        let a = scope.spawn(|| cache.get_or_render_page(4, &layout));
        let b = scope.spawn(|| cache.get_or_render_page(4, &layout));
        [a.join().unwrap(), b.join().unwrap()]
    });

    assert_eq!(gate.wait_started(WAIT), Some(4));
    gate.release(1);

    let [a, b] = tickets;
    let a = a.wait().unwrap();
    let b = b.wait().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.render_calls(), 1);

    let stats = cache.stats();
    assert_eq!(stats.rasterized, 1);
    assert_eq!(stats.coalesced, 1);
}

#[test]
fn layout_change_supersedes_in_flight_render() {
    let (engine, gate) = FakeEngine::gated(10);
    let options = RenderOptions {
        workers: 1,
        ..RenderOptions::default()
    };
    let cache = RenderCache::new(Arc::new(engine.clone()), "book.pdf", options);
    let wide = compute_layout(1200, 16, DEFAULT_ASPECT);
    let narrow = compute_layout(816, 16, DEFAULT_ASPECT);

    let old = cache.get_or_render_page(1, &wide);
    assert_eq!(gate.wait_started(WAIT), Some(1));

    // Asking at new dimensions drops the old entry before it lands.
    let new = cache.get_or_render_page(1, &narrow);
    assert!(matches!(old.wait(), Err(PageRenderError::Superseded { page: 1 })));

    gate.release(1);
    assert_eq!(gate.wait_started(WAIT), Some(1));
    gate.release(1);

    let surface = new.wait().unwrap();
    assert!(surface.width_px <= narrow.page_width);
    assert!(cache.contains(&CacheKey::new(1, &narrow)));
    assert!(!cache.contains(&CacheKey::new(1, &wide)));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().discarded, 1);
}

#[test]
fn cache_is_bounded() {
    let engine = FakeEngine::new(10);
    let options = RenderOptions {
        capacity: 5,
        ..RenderOptions::default()
    };
    let cache = RenderCache::new(Arc::new(engine.clone()), "book.pdf", options);
    let layout = compute_layout(1200, 16, DEFAULT_ASPECT);

    for page in 1..=10 {
        cache.get_or_render_page(page, &layout).wait().unwrap();
    }

    assert_eq!(cache.len(), 5);
    assert!(cache.contains(&CacheKey::new(10, &layout)));
    assert!(!cache.contains(&CacheKey::new(1, &layout)));

    cache.get_or_render_page(1, &layout).wait().unwrap();
    assert_eq!(engine.render_calls_for(1), 2);
}

#[test]
fn unopenable_document_fails_every_page() {
    let engine = FakeEngine::new(10);
    engine.set_fail_open(true);
    let cache = RenderCache::new(Arc::new(engine.clone()), "book.pdf", RenderOptions::default());
    let layout = compute_layout(1200, 16, DEFAULT_ASPECT);

    let err = cache.get_or_render_page(2, &layout).wait().unwrap_err();
    assert!(matches!(err, PageRenderError::Engine { page: 2, .. }));
    assert!(cache.is_empty());
    assert_eq!(engine.render_calls(), 0);
}

#[test]
fn high_resolution_render_fits_its_spread_half() {
    let engine = FakeEngine::new(4);
    let options = RenderOptions {
        scale_multiplier: 2.0,
        ..RenderOptions::default()
    };
    let cache = RenderCache::new(Arc::new(engine), "book.pdf", options);
    let layout = compute_layout(1200, 16, DEFAULT_ASPECT);

    let surface = cache.get_or_render_page(2, &layout).wait().unwrap();
    assert!(surface.width_px > layout.page_width);

    let mut page = (*surface).clone();
    let last_row = page.height_px - 1;
    page.row_mut(last_row).unwrap().fill(0);

    let image = compose_spread(Some(&page), None, &layout, 1.0, Rgb::PAPER);
    assert_eq!(image.dimensions(), (1200, 789));
    // The inked bottom edge is still in the picture.
    let bottom_dark = (780..789).any(|y| image.get_pixel(296, y).0.iter().all(|&c| c < 0xc0));
    assert!(bottom_dark);
}
