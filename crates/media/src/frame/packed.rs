//! Declares [PackedImage], an owned image whose channels are stored together
//! pixel by pixel.

use std::fmt::{self, Debug, Formatter};

use super::{DimensionMismatchError, Dimensions, Pixel};

/// How the bytes of a [PackedImage] are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 4 bytes per pixel in red, green, blue, alpha order.
    #[default]
    Rgba8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => size_of::<Pixel>(),
        }
    }
}

/// An owned, explicitly sized image. There are always exactly
/// `dimensions.area()` pixels, stored row by row with no padding, so the byte
/// length is always `width * height * 4`.
///
/// ```
/// use media::frame::{PackedImage, Pixel};
///
/// let image = PackedImage::from_fill((4, 2).into(), Pixel::WHITE);
/// assert_eq!(image.as_bytes().len(), 4 * 2 * 4);
/// assert_eq!(image.get(1, 3), Some(Pixel::WHITE));
/// assert_eq!(image.get(2, 0), None);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackedImage {
    dimensions: Dimensions,
    format: PixelFormat,
    pixels: Vec<Pixel>,
}

impl PackedImage {
    /// Create an image with every pixel set to [Pixel::BLACK].
    pub fn new(dimensions: Dimensions) -> Self {
        Self::from_fill(dimensions, Pixel::BLACK)
    }

    /// Create an image with every pixel set to `fill_pixel`.
    pub fn from_fill(dimensions: Dimensions, fill_pixel: Pixel) -> Self {
        Self {
            dimensions,
            format: PixelFormat::Rgba8,
            pixels: vec![fill_pixel; dimensions.area()],
        }
    }

    /// Create an image where each pixel is the result of `f(row, col)`.
    pub fn from_fn<F>(dimensions: Dimensions, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Pixel,
    {
        let width = dimensions.width();
        let pixels = (0..dimensions.area())
            .map(|i| f(i / width, i % width))
            .collect();

        Self {
            dimensions,
            format: PixelFormat::Rgba8,
            pixels,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    /// The raw bytes, `width * 4` per row with no row padding.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// The number of bytes in one row.
    pub fn bytes_per_row(&self) -> usize {
        self.dimensions.width() * self.format.bytes_per_pixel()
    }

    /// The pixel at `row`, `col`, or [None] if that's out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<Pixel> {
        if row >= self.dimensions.height() || col >= self.dimensions.width() {
            return None;
        }
        Some(self.pixels[row * self.dimensions.width() + col])
    }

    /// Set every pixel to `fill_pixel`.
    pub fn fill(&mut self, fill_pixel: Pixel) {
        self.pixels.fill(fill_pixel);
    }

    /// Copy every pixel from `src`. The two images must have the same
    /// dimensions.
    ///
    /// Also see [Self::copy_resizing_from].
    pub fn copy_from(&mut self, src: &PackedImage) -> Result<(), DimensionMismatchError> {
        DimensionMismatchError::check(self.dimensions, src.dimensions)?;
        self.pixels.copy_from_slice(&src.pixels);
        Ok(())
    }

    /// Become an exact copy of `src`, changing dimensions if needed. The
    /// existing allocation is reused whenever it's big enough.
    pub fn copy_resizing_from(&mut self, src: &PackedImage) {
        self.dimensions = src.dimensions;
        self.format = src.format;
        self.pixels.clear();
        self.pixels.extend_from_slice(&src.pixels);
    }

    /// Change the dimensions, setting every pixel to [Pixel::BLACK]. Nothing
    /// from the old contents survives. Returns whether the dimensions actually
    /// changed.
    pub fn reset(&mut self, dimensions: Dimensions) -> bool {
        let changed = self.dimensions != dimensions;
        self.dimensions = dimensions;
        self.pixels.clear();
        self.pixels.resize(dimensions.area(), Pixel::BLACK);
        changed
    }
}

/// A 1x1 black image.
impl Default for PackedImage {
    fn default() -> Self {
        Self::new((1, 1).into())
    }
}

// The pixel data is far too big to be useful in debug output.
impl Debug for PackedImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedImage")
            .field("dimensions", &self.dimensions)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
