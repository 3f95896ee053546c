//! YUV 4:2:0 to RGBA conversion.
//!
//! Samples are treated as full range BT.601 (the JFIF flavor cameras use for
//! their preview streams), so a luma of `0` is black and `255` is white. The
//! math is done in 16.16 fixed point.

use thiserror::Error;

use crate::frame::{
    ChromaLayout, DimensionMismatchError, FrameFormatError, PackedImage, Pixel, PlanarFrame,
};

/// `1.402` in 16.16 fixed point (V's contribution to red).
const CR_R: i32 = 91_881;
/// `0.344136` in 16.16 fixed point (U's contribution to green).
const CB_G: i32 = 22_554;
/// `0.714136` in 16.16 fixed point (V's contribution to green).
const CR_G: i32 = 46_802;
/// `1.772` in 16.16 fixed point (U's contribution to blue).
const CB_B: i32 = 116_130;
/// Half of `1 << 16`, added before shifting to round to nearest.
const ROUND: i32 = 1 << 15;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertError {
    #[error("Invalid frame format: {0}")]
    InvalidFrameFormat(#[from] FrameFormatError),
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatchError),
}

/// Converts [PlanarFrame]s into [PackedImage]s.
///
/// # Example
///
/// ```
/// use media::convert::ColorConverter;
/// use media::frame::{PackedImage, PlanarFrame, Pixel};
///
/// // A 2x2 NV21 frame: luma 235 everywhere, neutral chroma.
/// let data = [235, 235, 235, 235, 128, 128];
/// let frame = PlanarFrame::nv21((2, 2).into(), &data).unwrap();
///
/// let mut image = PackedImage::new((2, 2).into());
/// ColorConverter::new().convert(&frame, &mut image).unwrap();
/// assert!(image.pixels().iter().all(|&p| p == Pixel::from_gray(235)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    pub const fn new() -> Self {
        Self
    }

    /// Convert `frame` into `output`, overwriting every pixel. Alpha is always
    /// `255`.
    ///
    /// The frame is validated first. If it's malformed or `output` has
    /// different dimensions, an error is returned and `output` isn't touched.
    pub fn convert(
        &self,
        frame: &PlanarFrame,
        output: &mut PackedImage,
    ) -> Result<(), ConvertError> {
        let layout = frame.validate()?;
        Ok(self.convert_validated(frame, layout, output)?)
    }

    /// [Self::convert] for a frame whose [PlanarFrame::validate] already
    /// returned `layout`.
    pub(crate) fn convert_validated(
        &self,
        frame: &PlanarFrame,
        layout: ChromaLayout,
        output: &mut PackedImage,
    ) -> Result<(), DimensionMismatchError> {
        DimensionMismatchError::check(output.dimensions(), frame.dimensions())?;

        match layout {
            ChromaLayout::Separate => convert_rows::<1>(frame, output.pixels_mut()),
            ChromaLayout::Interleaved => convert_rows::<2>(frame, output.pixels_mut()),
        }

        Ok(())
    }
}

/// The conversion loop, monomorphized over the chroma pixel stride so the
/// inner loop has no branches on layout.
///
/// The frame must already be validated and `out` must hold exactly one pixel
/// per luma sample.
fn convert_rows<const CHROMA_STRIDE: usize>(frame: &PlanarFrame, out: &mut [Pixel]) {
    let width = frame.dimensions().width();
    let (y, u, v) = (frame.y(), frame.u(), frame.v());

    for (row, out_row) in out.chunks_exact_mut(width).enumerate() {
        let y_row = &y.data()[row * y.row_stride()..][..width];
        let chroma_row = row / 2;
        let u_row = &u.data()[chroma_row * u.row_stride()..];
        let v_row = &v.data()[chroma_row * v.row_stride()..];

        // Each pair of luma samples shares one chroma pair. With an odd width
        // the final chunk holds a single sample.
        for (pair, (out_pair, y_pair)) in out_row.chunks_mut(2).zip(y_row.chunks(2)).enumerate() {
            let chroma = pair * CHROMA_STRIDE;
            let offsets = ChromaOffsets::new(u_row[chroma], v_row[chroma]);

            for (pixel, &luma) in out_pair.iter_mut().zip(y_pair) {
                *pixel = offsets.apply(luma);
            }
        }
    }
}

/// What one chroma pair adds to each color channel.
#[derive(Debug, Clone, Copy)]
struct ChromaOffsets {
    red: i32,
    green: i32,
    blue: i32,
}

impl ChromaOffsets {
    #[inline(always)]
    fn new(u: u8, v: u8) -> Self {
        let u = u as i32 - 128;
        let v = v as i32 - 128;

        Self {
            red: (CR_R * v + ROUND) >> 16,
            green: (ROUND - CB_G * u - CR_G * v) >> 16,
            blue: (CB_B * u + ROUND) >> 16,
        }
    }

    #[inline(always)]
    fn apply(self, luma: u8) -> Pixel {
        let luma = luma as i32;
        Pixel::from_rgb(
            clamp_channel(luma + self.red),
            clamp_channel(luma + self.green),
            clamp_channel(luma + self.blue),
        )
    }
}

#[inline(always)]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}
