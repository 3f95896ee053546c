//! A Sobel edge filter for [PackedImage]s.
//!
//! The filter works on brightness only: the input is reduced to one luma byte
//! per pixel (see [Pixel::luma]), optionally smoothed with a 3x3 binomial
//! kernel, and then run through the two 3x3 Sobel kernels
//!
//! ```text
//!       -1  0  1            -1 -2 -1
//! Gx =  -2  0  2      Gy =   0  0  0
//!       -1  0  1             1  2  1
//! ```
//!
//! The magnitude `|Gx| + |Gy|` (clamped to `255`) becomes the gray value of
//! the output pixel. Pixels on the outermost ring don't have a full
//! neighborhood and are always opaque black.

use util::debug_log_info;

use crate::frame::{DimensionMismatchError, PackedImage, Pixel};

/// Runs the edge filter, keeping its working planes around between calls so
/// steady-state filtering doesn't allocate.
///
/// # Example
///
/// ```
/// use media::edge::EdgeFilter;
/// use media::frame::{PackedImage, Pixel};
///
/// let input = PackedImage::from_fill((8, 8).into(), Pixel::from_gray(90));
/// let mut output = PackedImage::new((8, 8).into());
///
/// let mut filter = EdgeFilter::new();
/// filter.apply(&input, &mut output, true).unwrap();
///
/// // A flat image has no edges at all.
/// assert!(output.pixels().iter().all(|&p| p == Pixel::BLACK));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    smoothing: bool,
    threshold: Option<u8>,
    /// One luma byte per pixel, smoothed in place when smoothing is on.
    luma: Vec<u8>,
    /// The horizontal pass of the smoothing kernel.
    scratch: Vec<u8>,
}

impl EdgeFilter {
    /// A filter with no smoothing and no threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blur the luma plane with a 3x3 binomial kernel before taking the
    /// gradient. This keeps sensor noise from showing up as edges.
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Output pure white where the gradient magnitude is at least `threshold`
    /// and black everywhere else, instead of the magnitude itself.
    pub fn with_threshold(mut self, threshold: Option<u8>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    pub fn threshold(&self) -> Option<u8> {
        self.threshold
    }

    /// Filter `input` into `output`. With `enabled` set to `false` the output
    /// becomes an exact copy of the input (alpha included).
    ///
    /// Both images must have the same dimensions. If they don't, an error is
    /// returned and `output` isn't touched.
    pub fn apply(
        &mut self,
        input: &PackedImage,
        output: &mut PackedImage,
        enabled: bool,
    ) -> Result<(), DimensionMismatchError> {
        if !enabled {
            return output.copy_from(input);
        }
        DimensionMismatchError::check(output.dimensions(), input.dimensions())?;

        let dims = input.dimensions();
        let (width, height) = (dims.width(), dims.height());

        if width < 3 || height < 3 {
            output.fill(Pixel::BLACK);
            return Ok(());
        }

        self.ensure_scratch(dims.area());

        for (luma, pixel) in self.luma.iter_mut().zip(input.pixels()) {
            *luma = pixel.luma();
        }

        if self.smoothing {
            smooth_binomial(&mut self.luma, &mut self.scratch, width);
        }

        sobel(&self.luma, output.pixels_mut(), width, self.threshold);

        Ok(())
    }

    /// Size the working planes for `area` pixels. Capacity is kept, so this
    /// only allocates when a bigger frame shows up.
    fn ensure_scratch(&mut self, area: usize) {
        if self.luma.len() == area {
            return;
        }

        if area > self.luma.capacity() {
            debug_log_info!("Growing edge filter scratch planes to {area} pixels.");
        }
        self.luma.resize(area, 0);
        if self.smoothing {
            self.scratch.resize(area, 0);
        }
    }
}

/// Smooth `plane` in place with the separable kernel `[1 2 1] / 4` applied
/// horizontally (into `scratch`) and then vertically (back into `plane`).
/// Samples past the edges repeat the nearest edge sample.
fn smooth_binomial(plane: &mut [u8], scratch: &mut Vec<u8>, width: usize) {
    scratch.resize(plane.len(), 0);

    for (src, dst) in plane.chunks_exact(width).zip(scratch.chunks_exact_mut(width)) {
        for col in 0..width {
            let left = src[col.saturating_sub(1)] as u16;
            let right = src[(col + 1).min(width - 1)] as u16;
            dst[col] = ((left + 2 * src[col] as u16 + right + 2) >> 2) as u8;
        }
    }

    let height = plane.len() / width;
    for row in 0..height {
        let up = &scratch[row.saturating_sub(1) * width..][..width];
        let here = &scratch[row * width..][..width];
        let down = &scratch[(row + 1).min(height - 1) * width..][..width];
        let dst = &mut plane[row * width..][..width];

        for col in 0..width {
            dst[col] = ((up[col] as u16 + 2 * here[col] as u16 + down[col] as u16 + 2) >> 2) as u8;
        }
    }
}

/// Write the Sobel magnitude of `luma` into `out`. Both hold `width` columns
/// and at least 3 rows, and the image is at least 3 columns wide.
fn sobel(luma: &[u8], out: &mut [Pixel], width: usize, threshold: Option<u8>) {
    let height = luma.len() / width;
    let last_col = width - 1;

    out[..width].fill(Pixel::BLACK);
    out[(height - 1) * width..].fill(Pixel::BLACK);

    for row in 1..height - 1 {
        let top = &luma[(row - 1) * width..][..width];
        let mid = &luma[row * width..][..width];
        let bot = &luma[(row + 1) * width..][..width];
        let out_row = &mut out[row * width..][..width];

        out_row[0] = Pixel::BLACK;
        out_row[last_col] = Pixel::BLACK;

        for col in 1..last_col {
            let at = |line: &[u8], c: usize| line[c] as i32;

            let gx = (at(top, col + 1) + 2 * at(mid, col + 1) + at(bot, col + 1))
                - (at(top, col - 1) + 2 * at(mid, col - 1) + at(bot, col - 1));
            let gy = (at(bot, col - 1) + 2 * at(bot, col) + at(bot, col + 1))
                - (at(top, col - 1) + 2 * at(top, col) + at(top, col + 1));

            let magnitude = (gx.abs() + gy.abs()).min(u8::MAX as i32) as u8;
            let value = match threshold {
                Some(threshold) if magnitude >= threshold => u8::MAX,
                Some(_) => 0,
                None => magnitude,
            };

            out_row[col] = Pixel::from_gray(value);
        }
    }
}
