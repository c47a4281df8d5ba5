//! MuPDF-backed document engine

use mupdf::{Colorspace, Document, Matrix, Page, Pixmap};

use super::engine::{DocumentEngine, DocumentHandle, EngineError, PageHandle};
use super::types::{PageSurface, PageViewport};

/// Opens PDF (and other MuPDF-supported) documents from the filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfEngine;

impl DocumentEngine for MupdfEngine {
    type Document = MupdfDocument;

    fn open_document(&self, source: &str) -> Result<Self::Document, EngineError> {
        let doc = Document::open(source).map_err(|e| EngineError::Open {
            source_path: source.to_string(),
            detail: e.to_string(),
        })?;
        let page_count = doc.page_count()?.max(0) as usize;
        Ok(MupdfDocument { doc, page_count })
    }
}

pub struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl DocumentHandle for MupdfDocument {
    type Page = MupdfPage;

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&self, page: usize) -> Result<Self::Page, EngineError> {
        if page == 0 || page > self.page_count {
            return Err(EngineError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        let page = self.doc.load_page((page - 1) as i32)?;
        Ok(MupdfPage { page })
    }
}

pub struct MupdfPage {
    page: Page,
}

impl PageHandle for MupdfPage {
    fn viewport(&self, scale: f32) -> Result<PageViewport, EngineError> {
        let bounds = self.page.bounds()?;
        Ok(PageViewport {
            width: (bounds.x1 - bounds.x0) * scale,
            height: (bounds.y1 - bounds.y0) * scale,
            scale,
        })
    }

    fn render_into(
        &self,
        surface: &mut PageSurface,
        viewport: &PageViewport,
    ) -> Result<(), EngineError> {
        let transform = Matrix::new_scale(viewport.scale, viewport.scale);
        let rgb = Colorspace::device_rgb();
        let pixmap = self.page.to_pixmap(&transform, &rgb, true, false)?;
        composite_over(&pixmap, surface)
    }
}

/// Blend a premultiplied RGBA pixmap over the surface's existing pixels
fn composite_over(pixmap: &Pixmap, surface: &mut PageSurface) -> Result<(), EngineError> {
    let n = pixmap.n() as usize;
    if n != 4 {
        return Err(EngineError::render(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let width = (pixmap.width()).min(surface.width_px) as usize;
    let height = (pixmap.height()).min(surface.height_px);
    if samples.len() < stride.saturating_mul(height as usize) || width * n > stride {
        return Err(EngineError::render("pixmap buffer size mismatch"));
    }

    for y in 0..height {
        let src_start = y as usize * stride;
        let src = &samples[src_start..src_start + width * n];
        let Some(dst) = surface.row_mut(y) else {
            break;
        };
        for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
            let inv_alpha = 255 - u16::from(src_px[3]);
            for c in 0..3 {
                let bg = u16::from(dst_px[c]) * inv_alpha / 255;
                dst_px[c] = (u16::from(src_px[c]) + bg).min(255) as u8;
            }
        }
    }

    Ok(())
}
