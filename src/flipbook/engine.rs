//! Document engine seam
//!
//! Parsing and rasterization are delegated to an engine. Each render worker
//! opens its own [`DocumentHandle`], so handles need not be `Send`; the engine
//! itself is shared across workers.

use super::types::{PageSurface, PageViewport};

/// Errors reported by a document engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot open `{source_path}`: {detail}")]
    Open { source_path: String, detail: String },

    #[error("page {page} out of range (document has {page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("render failed: {detail}")]
    Render { detail: String },

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),
}

impl EngineError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render { detail: msg.into() }
    }
}

/// Opens documents
pub trait DocumentEngine: Send + Sync + 'static {
    type Document: DocumentHandle;

    fn open_document(&self, source: &str) -> Result<Self::Document, EngineError>;
}

/// An open document
pub trait DocumentHandle {
    type Page: PageHandle;

    fn page_count(&self) -> usize;

    /// Load page `page` (1-indexed)
    fn page(&self, page: usize) -> Result<Self::Page, EngineError>;
}

/// A loaded page
pub trait PageHandle {
    /// Page size in document units multiplied by `scale`
    fn viewport(&self, scale: f32) -> Result<PageViewport, EngineError>;

    /// Draw the page into `surface`, which is already sized for `viewport`
    /// and filled with the background colour
    fn render_into(
        &self,
        surface: &mut PageSurface,
        viewport: &PageViewport,
    ) -> Result<(), EngineError>;
}
