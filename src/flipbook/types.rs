//! Core types for page rendering

use serde::{Deserialize, Serialize};

/// RGB colour used to fill surfaces before rasterization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Warm off-white that reads as paper behind transparent page content
    pub const PAPER: Rgb = Rgb::new(0xfa, 0xf6, 0xee);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::PAPER
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value).ok_or_else(|| format!("invalid colour `{value}`, expected #rrggbb"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Page dimensions in document units at a given scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageViewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl PageViewport {
    /// Width over height
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Rendered bitmap for one page at one layout.
///
/// Pixels are packed RGB (3 bytes per pixel), row-major, no padding.
#[derive(Clone)]
pub struct PageSurface {
    /// Raw RGB pixel data
    pub pixels: Vec<u8>,
    /// Surface width in device pixels
    pub width_px: u32,
    /// Surface height in device pixels
    pub height_px: u32,
    /// Page number (1-indexed)
    pub page: usize,
    /// Scale from document units to device pixels
    pub scale: f32,
}

impl PageSurface {
    /// Allocate a surface filled with a solid colour
    #[must_use]
    pub fn filled(page: usize, width_px: u32, height_px: u32, scale: f32, color: Rgb) -> Self {
        let len = width_px as usize * height_px as usize;
        let mut pixels = Vec::with_capacity(len * 3);
        for _ in 0..len {
            pixels.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self {
            pixels,
            width_px,
            height_px,
            page,
            scale,
        }
    }

    /// Pixel at (x, y), `None` when out of bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        let offset = (y as usize * self.width_px as usize + x as usize) * 3;
        Some(Rgb::new(
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ))
    }

    /// Mutable RGB row `y`
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height_px {
            return None;
        }
        let row_bytes = self.width_px as usize * 3;
        let start = y as usize * row_bytes;
        self.pixels.get_mut(start..start + row_bytes)
    }
}

impl std::fmt::Debug for PageSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSurface")
            .field("page", &self.page)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}
