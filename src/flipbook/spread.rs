//! Composing a visible spread into a single image

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ImageError, RgbImage};

use super::layout::LayoutSpec;
use super::types::{PageSurface, Rgb};

/// Lay `left` and `right` out as an open book in device pixels.
///
/// Each page is centred in its half; missing pages leave `background`.
#[must_use]
pub fn compose_spread(
    left: Option<&PageSurface>,
    right: Option<&PageSurface>,
    layout: &LayoutSpec,
    device_pixel_ratio: f32,
    background: Rgb,
) -> RgbImage {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    let device = |v: u32| ((v as f32 * dpr).round() as u32).max(1);
    let page_width = device(layout.page_width);
    let gutter = device(layout.gutter);
    let height = device(layout.page_height);

    let mut image = RgbImage::from_pixel(
        2 * page_width + gutter,
        height,
        image::Rgb([background.r, background.g, background.b]),
    );

    for (surface, x0) in [(left, 0), (right, page_width + gutter)] {
        let Some(page) = surface.and_then(|s| fit_into(s, page_width, height)) else {
            continue;
        };
        let dx = x0 + (page_width - page.width()) / 2;
        let dy = (height - page.height()) / 2;
        imageops::replace(&mut image, &page, i64::from(dx), i64::from(dy));
    }

    image
}

/// The surface as an image no larger than `max_width` x `max_height`.
///
/// Surfaces rendered with an extra scale multiplier are downsampled,
/// keeping the page's aspect ratio.
fn fit_into(surface: &PageSurface, max_width: u32, max_height: u32) -> Option<RgbImage> {
    let page = RgbImage::from_raw(surface.width_px, surface.height_px, surface.pixels.clone())?;
    if page.width() <= max_width && page.height() <= max_height {
        return Some(page);
    }

    let scale = (max_width as f32 / page.width() as f32)
        .min(max_height as f32 / page.height() as f32);
    let width = ((page.width() as f32 * scale).round() as u32).clamp(1, max_width);
    let height = ((page.height() as f32 * scale).round() as u32).clamp(1, max_height);
    Some(imageops::resize(&page, width, height, FilterType::Triangle))
}

/// Write `image` as `spread-<left>-<right>.png` inside `dir`
pub fn save_spread(
    image: &RgbImage,
    dir: &Path,
    left: Option<usize>,
    right: Option<usize>,
) -> Result<PathBuf, ImageError> {
    let name = |page: Option<usize>| page.map_or_else(|| "blank".to_string(), |p| p.to_string());
    std::fs::create_dir_all(dir).map_err(ImageError::IoError)?;
    let path = dir.join(format!("spread-{}-{}.png", name(left), name(right)));
    image.save(&path)?;
    Ok(path)
}
