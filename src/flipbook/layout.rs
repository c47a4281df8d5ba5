//! Spread layout arithmetic
//!
//! Decides the pixel size of each page so that two pages plus the gutter
//! fit the container width. Height follows a fallback aspect ratio until the
//! document's first page is known, then the true aspect via [`refine_layout`].

/// Container widths below this are treated as this wide
pub const MIN_CONTAINER_WIDTH: u32 = 320;
/// Gutter between the two pages of a spread
pub const DEFAULT_GUTTER: u32 = 16;
/// Width over height used before the document is known (600x800 page)
pub const DEFAULT_ASPECT: f32 = 600.0 / 800.0;

/// Page pixel dimensions for one container size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutSpec {
    pub page_width: u32,
    pub page_height: u32,
    pub gutter: u32,
}

impl LayoutSpec {
    /// Width of two pages plus the gutter
    #[must_use]
    pub const fn spread_width(&self) -> u32 {
        2 * self.page_width + self.gutter
    }

    #[must_use]
    pub const fn spread_height(&self) -> u32 {
        self.page_height
    }

    #[must_use]
    pub const fn page_dims(&self) -> (u32, u32) {
        (self.page_width, self.page_height)
    }
}

fn usable_aspect(aspect: f32) -> Option<f32> {
    (aspect.is_finite() && aspect > 0.0).then_some(aspect)
}

fn height_for(page_width: u32, aspect: f32) -> u32 {
    ((page_width as f32 / aspect).round() as u32).max(1)
}

/// Fit a two-page spread into `container_width`
#[must_use]
pub fn compute_layout(container_width: u32, gutter: u32, fallback_aspect: f32) -> LayoutSpec {
    let width = container_width.max(MIN_CONTAINER_WIDTH);
    let gutter = gutter.clamp(1, width - 2);
    let aspect = usable_aspect(fallback_aspect).unwrap_or(DEFAULT_ASPECT);

    let page_width = ((width - gutter) / 2).max(1);

    LayoutSpec {
        page_width,
        page_height: height_for(page_width, aspect),
        gutter,
    }
}

/// Match page height to the document aspect, keeping the horizontal fit
#[must_use]
pub fn refine_layout(layout: LayoutSpec, document_aspect: f32) -> LayoutSpec {
    let Some(aspect) = usable_aspect(document_aspect) else {
        return layout;
    };
    LayoutSpec {
        page_height: height_for(layout.page_width, aspect),
        ..layout
    }
}
