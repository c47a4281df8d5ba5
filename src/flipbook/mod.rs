//! Two-page spread rendering infrastructure

mod cache;
mod debounce;
mod engine;
#[cfg(feature = "pdf")]
mod mupdf_engine;
mod layout;
mod prefetch;
mod request;
mod session;
mod slots;
mod spread;
mod state;
mod types;
mod widget;
mod worker;

pub use cache::{CacheKey, CacheStats, RenderCache, RenderOptions};
pub use debounce::ResizeDebouncer;
pub use engine::{DocumentEngine, DocumentHandle, EngineError, PageHandle};
#[cfg(feature = "pdf")]
pub use mupdf_engine::{MupdfDocument, MupdfEngine, MupdfPage};
pub use layout::{
    DEFAULT_ASPECT, DEFAULT_GUTTER, LayoutSpec, MIN_CONTAINER_WIDTH, compute_layout, refine_layout,
};
pub use prefetch::{PREFETCH_RADIUS, initial_pages, neighborhood, neighborhood_with_radius};
pub use request::{PageRenderError, RenderJob, RenderTicket};
pub use session::{DocumentLoadError, DocumentState, Session, SessionConfig, SessionPhase};
pub use slots::{PageSide, PageSlot, PageSlots, spread_pages};
pub use spread::{compose_spread, save_spread};
pub use state::{Command, Effect, ViewState};
pub use types::*;
pub use widget::{Display, HeadlessBook, TurnEvent, TurnWidget, WidgetConfig, WidgetError};

/// Quiet period before a burst of resize events triggers a reflow
pub const DEFAULT_RESIZE_QUIET_MS: u64 = 180;
/// Default number of render worker threads
pub const DEFAULT_WORKERS: usize = 2;
/// Default number of completed surfaces kept per layout
pub const DEFAULT_CACHE_SIZE: usize = 32;
