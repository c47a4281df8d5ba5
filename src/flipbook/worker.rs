//! Page render worker - runs in separate thread(s)

use std::sync::Mutex;

use flume::Receiver;
use log::{debug, error};

use super::cache::{CacheIndex, CacheKey, lock_index};
use super::engine::{DocumentEngine, DocumentHandle, EngineError, PageHandle};
use super::request::{PageRenderError, RenderJob};
use super::types::{PageSurface, Rgb};

/// Longest surface edge in device pixels
pub const MAX_SURFACE_DIMENSION: f32 = 8192.0;

/// Pre-computed rasterization parameters for a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RasterSpec {
    pub scale: f32,
    pub width_px: u32,
    pub height_px: u32,
}

impl RasterSpec {
    /// Fit `page_bounds` (document units) inside `target` (layout pixels),
    /// then multiply by the device pixel ratio
    pub(crate) fn compute(page_bounds: (f32, f32), target: (u32, u32), device_scale: f32) -> Self {
        let (page_width, page_height) = page_bounds;
        let (target_width, target_height) = (target.0 as f32, target.1 as f32);

        let fit = (target_width / page_width).min(target_height / page_height);
        let mut scale = fit * device_scale;

        let max_dim = (page_width * scale).max(page_height * scale);
        if max_dim > MAX_SURFACE_DIMENSION {
            scale *= MAX_SURFACE_DIMENSION / max_dim;
        }

        Self {
            scale,
            width_px: ((page_width * scale).round() as u32).max(1),
            height_px: ((page_height * scale).round() as u32).max(1),
        }
    }
}

/// Main worker function - runs in a dedicated thread
pub(crate) fn render_worker<E: DocumentEngine>(
    engine: &E,
    source: &str,
    jobs: Receiver<RenderJob>,
    index: &Mutex<CacheIndex>,
) {
    let doc = match engine.open_document(source) {
        Ok(d) => Some(d),
        Err(e) => {
            error!("Render worker could not open {source}: {e}");
            None
        }
    };

    for job in jobs {
        match job {
            RenderJob::Page {
                key,
                generation,
                device_pixel_ratio,
                scale_multiplier,
                paper,
            } => {
                {
                    let mut index = lock_index(index);
                    if !index.is_current(&key, generation) {
                        index.discard(&key);
                        continue;
                    }
                }

                let outcome = match &doc {
                    Some(doc) => {
                        render_page(doc, &key, device_pixel_ratio * scale_multiplier, paper)
                            .map_err(|e| PageRenderError::engine(key.page, &e))
                    }
                    None => Err(PageRenderError::Engine {
                        page: key.page,
                        detail: format!("document {source} is not open"),
                    }),
                };
                if let Err(e) = &outcome {
                    debug!("Render failed: {e}");
                }

                lock_index(index).complete(key, generation, outcome);
            }

            RenderJob::Shutdown => break,
        }
    }
}

/// Render a single page onto a paper-coloured surface
pub fn render_page<D: DocumentHandle>(
    doc: &D,
    key: &CacheKey,
    device_scale: f32,
    paper: Rgb,
) -> Result<PageSurface, EngineError> {
    let page = doc.page(key.page)?;
    let base = page.viewport(1.0)?;
    if !(base.width > 0.0 && base.height > 0.0) {
        return Err(EngineError::render(format!(
            "page {} has empty bounds {}x{}",
            key.page, base.width, base.height
        )));
    }

    let spec = RasterSpec::compute((base.width, base.height), key.dims(), device_scale);
    let viewport = page.viewport(spec.scale)?;

    let mut surface = PageSurface::filled(key.page, spec.width_px, spec.height_px, spec.scale, paper);
    page.render_into(&mut surface, &viewport)?;

    debug!(
        "Rendered page {} at {}x{} ({}x{} px)",
        key.page, key.page_width, key.page_height, spec.width_px, spec.height_px
    );
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_spec_fits_matching_aspect_exactly() {
        let spec = RasterSpec::compute((600.0, 800.0), (592, 789), 1.0);
        assert_eq!(spec.width_px, 592);
        assert_eq!(spec.height_px, 789);
    }

    #[test]
    fn raster_spec_scales_by_device_ratio() {
        let spec = RasterSpec::compute((612.0, 792.0), (306, 396), 2.0);
        assert_eq!((spec.width_px, spec.height_px), (612, 792));
        assert!((spec.scale - 1.0).abs() < 1e-6);
    }

    #[test]
    fn raster_spec_fits_mismatched_page_inside_target() {
        // Landscape page in a portrait slot is limited by width.
        let spec = RasterSpec::compute((800.0, 600.0), (300, 400), 1.0);
        assert_eq!(spec.width_px, 300);
        assert_eq!(spec.height_px, 225);
    }

    #[test]
    fn raster_spec_caps_huge_surfaces() {
        let spec = RasterSpec::compute((600.0, 800.0), (6000, 8000), 3.0);
        assert!(spec.width_px as f32 <= MAX_SURFACE_DIMENSION);
        assert!(spec.height_px as f32 <= MAX_SURFACE_DIMENSION);
        assert_eq!(spec.height_px, 8192);
    }
}
