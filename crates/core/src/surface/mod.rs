use std::{fmt, path::Path};

use image::{ImageFormat, Pixel, Rgba, RgbaImage};

use crate::{geometry::Bounds, Color, FakeoutError, Result};

/// Fixed-size RGBA8 raster that shapes paint onto.
///
/// Backed by an [`RgbaImage`] with straight alpha. A fresh bitmap is fully
/// transparent.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    /// Allocates a transparent bitmap.
    ///
    /// Fails with [`FakeoutError::SurfaceAllocation`] when either dimension is
    /// zero, the byte size overflows, or the allocator refuses the request.
    pub fn try_new(width: u32, height: u32) -> Result<Self> {
        let unavailable = || FakeoutError::SurfaceAllocation { width, height };
        if width == 0 || height == 0 {
            return Err(unavailable());
        }

        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(usize::from(Rgba::<u8>::CHANNEL_COUNT)))
            .ok_or_else(unavailable)?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|_| unavailable())?;
        pixels.resize(len, 0);

        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(unavailable)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Returns the pixel at `(x, y)` or `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image.get_pixel_checked(x, y).map(|pixel| Color::from(*pixel))
    }

    /// Composites `color` over every pixel whose centre lies inside `bounds`.
    ///
    /// Coverage outside the bitmap is clipped; a box that misses the bitmap
    /// entirely leaves it untouched.
    pub fn fill_bounds(&mut self, bounds: &Bounds, color: Color) {
        if color.a == 0 {
            return;
        }

        let Some((x0, x1)) = covered_span(bounds.min_x(), bounds.max_x(), self.width()) else {
            return;
        };
        let Some((y0, y1)) = covered_span(bounds.min_y(), bounds.max_y(), self.height()) else {
            return;
        };

        let source = Rgba::from(color);
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.get_pixel_mut(x, y).blend(&source);
            }
        }
    }

    /// Composites `color` over the whole bitmap.
    pub fn fill(&mut self, color: Color) {
        if color.a == 0 {
            return;
        }
        let source = Rgba::from(color);
        for pixel in self.image.pixels_mut() {
            pixel.blend(&source);
        }
    }

    /// Encodes the bitmap as a PNG file at `path`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Half-open range of pixel indices whose centres fall in `[min, max)`,
/// clipped to `[0, limit)`.
fn covered_span(min: f32, max: f32, limit: u32) -> Option<(u32, u32)> {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return None;
    }

    let first = (min - 0.5).ceil().max(0.0);
    let end = (max - 0.5).ceil().min(limit as f32);
    if end <= first {
        return None;
    }

    Some((first as u32, end as u32))
}
