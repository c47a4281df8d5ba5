//! Render jobs and the tickets handed to callers

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, TryRecvError};

use super::cache::CacheKey;
use super::engine::EngineError;
use super::types::{PageSurface, Rgb};

/// Outcome delivered to every waiter of a key
pub type RenderOutcome = Result<Arc<PageSurface>, PageRenderError>;

/// Errors from rendering a single page. Never cached.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PageRenderError {
    #[error("page {page}: {detail}")]
    Engine { page: usize, detail: String },

    #[error("page {page}: superseded by a layout change")]
    Superseded { page: usize },

    #[error("page {page}: render workers are gone")]
    WorkerGone { page: usize },
}

impl PageRenderError {
    pub fn engine(page: usize, err: &EngineError) -> Self {
        Self::Engine {
            page,
            detail: err.to_string(),
        }
    }

    #[must_use]
    pub fn page(&self) -> usize {
        match self {
            Self::Engine { page, .. } | Self::Superseded { page } | Self::WorkerGone { page } => {
                *page
            }
        }
    }
}

/// Work item sent to render workers
#[derive(Clone, Debug)]
pub enum RenderJob {
    /// Rasterize one page
    Page {
        key: CacheKey,
        /// Cache generation the job was issued under
        generation: u64,
        device_pixel_ratio: f32,
        scale_multiplier: f32,
        paper: Rgb,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Result of asking the cache for a page.
///
/// `Ready` when the surface was already cached, otherwise `Pending` until the
/// (possibly shared) rasterization for the key completes.
#[derive(Debug)]
pub enum RenderTicket {
    Ready(Arc<PageSurface>),
    Pending {
        key: CacheKey,
        rx: Receiver<RenderOutcome>,
    },
}

impl RenderTicket {
    #[must_use]
    pub fn page(&self) -> usize {
        match self {
            Self::Ready(surface) => surface.page,
            Self::Pending { key, .. } => key.page,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Block until the surface is available
    pub fn wait(self) -> RenderOutcome {
        match self {
            Self::Ready(surface) => Ok(surface),
            Self::Pending { key, rx } => rx
                .recv()
                .unwrap_or(Err(PageRenderError::Superseded { page: key.page })),
        }
    }

    /// Block for at most `timeout`; `None` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RenderOutcome> {
        match self {
            Self::Ready(surface) => Some(Ok(Arc::clone(surface))),
            Self::Pending { key, rx } => match rx.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    Some(Err(PageRenderError::Superseded { page: key.page }))
                }
            },
        }
    }

    /// Poll without blocking; `None` if still pending
    pub fn try_resolve(&self) -> Option<RenderOutcome> {
        match self {
            Self::Ready(surface) => Some(Ok(Arc::clone(surface))),
            Self::Pending { key, rx } => match rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    Some(Err(PageRenderError::Superseded { page: key.page }))
                }
            },
        }
    }
}
