//! The per-frame pipeline: conversion, then filtering, then (optionally)
//! rotation, all into buffers that live as long as the [FrameProcessor].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use util::{debug_log_error, debug_log_info};

use crate::convert::{ColorConverter, ConvertError};
use crate::edge::EdgeFilter;
use crate::frame::{
    ChromaLayout, DimensionMismatchError, Dimensions, FrameFormatError, PackedImage, PlanarFrame,
};

/// Whether frames go through the edge filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    #[serde(alias = "edges")]
    EdgeDetection,
    #[serde(alias = "raw")]
    Passthrough,
}

impl FilterMode {
    /// The other mode.
    pub const fn toggled(self) -> Self {
        match self {
            FilterMode::EdgeDetection => FilterMode::Passthrough,
            FilterMode::Passthrough => FilterMode::EdgeDetection,
        }
    }

    pub const fn filters(self) -> bool {
        matches!(self, FilterMode::EdgeDetection)
    }
}

/// A [FilterMode] that can be flipped from one thread (e.g. on a key press)
/// while another thread reads it once per frame. Clones share the same mode.
///
/// ```
/// use media::processor::{FilterMode, SharedFilterMode};
///
/// let mode = SharedFilterMode::new(FilterMode::EdgeDetection);
/// let ui_handle = mode.clone();
///
/// assert_eq!(ui_handle.toggle(), FilterMode::Passthrough);
/// assert_eq!(mode.get(), FilterMode::Passthrough);
/// ```
#[derive(Debug, Clone)]
pub struct SharedFilterMode(Arc<AtomicBool>);

impl SharedFilterMode {
    pub fn new(mode: FilterMode) -> Self {
        Self(Arc::new(AtomicBool::new(mode.filters())))
    }

    pub fn get(&self) -> FilterMode {
        Self::mode_from(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, mode: FilterMode) {
        self.0.store(mode.filters(), Ordering::Relaxed);
    }

    /// Flip the mode, returning the new one.
    pub fn toggle(&self) -> FilterMode {
        Self::mode_from(!self.0.fetch_xor(true, Ordering::Relaxed))
    }

    fn mode_from(filters: bool) -> FilterMode {
        if filters {
            FilterMode::EdgeDetection
        } else {
            FilterMode::Passthrough
        }
    }
}

impl Default for SharedFilterMode {
    fn default() -> Self {
        Self::new(FilterMode::default())
    }
}

/// A clockwise rotation applied to processed frames. Camera sensors are
/// often mounted sideways relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    #[default]
    Upright,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Parse a clockwise rotation in degrees. Only multiples of 90 below 360
    /// are accepted.
    pub const fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Orientation::Upright),
            90 => Some(Orientation::Rotate90),
            180 => Some(Orientation::Rotate180),
            270 => Some(Orientation::Rotate270),
            _ => None,
        }
    }

    pub const fn degrees(self) -> u16 {
        match self {
            Orientation::Upright => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate180 => 180,
            Orientation::Rotate270 => 270,
        }
    }

    /// The dimensions an image ends up with after being rotated. Quarter
    /// turns swap the width and height.
    ///
    /// This is the one place that decides when sides get swapped, so anything
    /// sizing a buffer for rotated output should go through it.
    ///
    /// ```
    /// use media::processor::Orientation;
    ///
    /// assert_eq!(Orientation::Rotate90.apply((640, 480).into()), (480, 640).into());
    /// assert_eq!(Orientation::Rotate180.apply((640, 480).into()), (640, 480).into());
    /// ```
    pub const fn apply(self, dimensions: Dimensions) -> Dimensions {
        match self {
            Orientation::Upright | Orientation::Rotate180 => dimensions,
            Orientation::Rotate90 | Orientation::Rotate270 => dimensions.transposed(),
        }
    }

    /// Write `src` rotated into `dst`. `dst` must already have the dimensions
    /// [Self::apply] gives for `src`.
    pub fn rotate(
        self,
        src: &PackedImage,
        dst: &mut PackedImage,
    ) -> Result<(), DimensionMismatchError> {
        let src_dims = src.dimensions();
        DimensionMismatchError::check(dst.dimensions(), self.apply(src_dims))?;

        let (src_width, src_height) = src_dims.into();
        let dst_width = dst.dimensions().width();
        let pixels = src.pixels();

        for (i, pixel) in dst.pixels_mut().iter_mut().enumerate() {
            let (row, col) = (i / dst_width, i % dst_width);
            let (src_row, src_col) = match self {
                Orientation::Upright => (row, col),
                Orientation::Rotate90 => (src_height - 1 - col, row),
                Orientation::Rotate180 => (src_height - 1 - row, src_width - 1 - col),
                Orientation::Rotate270 => (col, src_width - 1 - row),
            };
            *pixel = pixels[src_row * src_width + src_col];
        }

        Ok(())
    }
}

impl TryFrom<u16> for Orientation {
    type Error = InvalidOrientationError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees).ok_or(InvalidOrientationError { degrees })
    }
}

impl From<Orientation> for u16 {
    fn from(orientation: Orientation) -> Self {
        orientation.degrees()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("{degrees} is not a supported rotation (expected 0, 90, 180, or 270).")]
pub struct InvalidOrientationError {
    pub degrees: u16,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessError {
    #[error("Invalid frame format: {0}")]
    InvalidFrameFormat(#[from] FrameFormatError),
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatchError),
}

impl From<ConvertError> for ProcessError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::InvalidFrameFormat(e) => ProcessError::InvalidFrameFormat(e),
            ConvertError::DimensionMismatch(e) => ProcessError::DimensionMismatch(e),
        }
    }
}

/// The persistent buffers, always sized together.
#[derive(Debug)]
struct Buffers {
    dimensions: Dimensions,
    converted: PackedImage,
    filtered: PackedImage,
    /// Only allocated for orientations other than [Orientation::Upright].
    oriented: Option<PackedImage>,
}

impl Buffers {
    /// The buffers in `slot` if they fit `dimensions`, otherwise freshly
    /// allocated ones. The flag says whether they were allocated.
    fn ensure(
        slot: &mut Option<Buffers>,
        dimensions: Dimensions,
        orientation: Orientation,
    ) -> (&mut Buffers, bool) {
        match slot {
            Some(buffers) if buffers.dimensions == dimensions => {
                (slot.as_mut().expect("matched Some above"), false)
            }
            slot => {
                debug_log_info!(
                    "Allocating frame buffers for {dimensions} (was {}).",
                    slot.as_ref()
                        .map_or_else(|| "nothing".to_owned(), |b| b.dimensions.to_string())
                );

                // Replacing the whole struct drops the old buffers before any
                // later frame can see them.
                let buffers = slot.insert(Buffers {
                    dimensions,
                    converted: PackedImage::new(dimensions),
                    filtered: PackedImage::new(dimensions),
                    oriented: (orientation != Orientation::Upright)
                        .then(|| PackedImage::new(orientation.apply(dimensions))),
                });
                (buffers, true)
            }
        }
    }

    /// Run every stage, returning the last buffer written.
    fn fill(
        &mut self,
        converter: &ColorConverter,
        filter: &mut EdgeFilter,
        orientation: Orientation,
        frame: &PlanarFrame,
        layout: ChromaLayout,
        mode: FilterMode,
    ) -> Result<&PackedImage, ProcessError> {
        converter.convert_validated(frame, layout, &mut self.converted)?;
        filter.apply(&self.converted, &mut self.filtered, mode.filters())?;

        match self.oriented.as_mut() {
            Some(oriented) => {
                orientation.rotate(&self.filtered, oriented)?;
                Ok(&*oriented)
            }
            None => Ok(&self.filtered),
        }
    }
}

/// Turns raw camera frames into displayable RGBA images.
///
/// Buffers are allocated on the first frame and reused for every frame after
/// that, until the frame dimensions change. Processing takes `&mut self`, so a
/// processor belongs to whichever single thread produces frames.
///
/// # Example
///
/// ```
/// use media::frame::{PlanarFrame, Pixel};
/// use media::processor::{FilterMode, FrameProcessor, Orientation};
///
/// let mut processor = FrameProcessor::new(Default::default(), Orientation::Rotate90);
///
/// // A 4x2 NV21 frame of flat gray.
/// let data = [128u8; 8 + 4];
/// let frame = PlanarFrame::nv21((4, 2).into(), &data).unwrap();
///
/// let image = processor.process(&frame, FilterMode::Passthrough).unwrap();
/// assert_eq!(image.dimensions(), (2, 4).into());
/// assert!(image.pixels().iter().all(|&p| p == Pixel::from_gray(128)));
/// ```
#[derive(Debug)]
pub struct FrameProcessor {
    converter: ColorConverter,
    filter: EdgeFilter,
    orientation: Orientation,
    buffers: Option<Buffers>,
    reallocations: u64,
    frames_processed: u64,
}

impl FrameProcessor {
    pub fn new(filter: EdgeFilter, orientation: Orientation) -> Self {
        Self {
            converter: ColorConverter::new(),
            filter,
            orientation,
            buffers: None,
            reallocations: 0,
            frames_processed: 0,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The dimensions of the images [Self::process] returns for frames of
    /// `frame_dimensions`.
    pub fn output_dimensions(&self, frame_dimensions: Dimensions) -> Dimensions {
        self.orientation.apply(frame_dimensions)
    }

    /// Make sure the buffers fit frames of `dimensions`, returning whether
    /// they had to be (re)allocated. Calling this again with the same
    /// dimensions does nothing.
    pub fn ensure_buffers(&mut self, dimensions: Dimensions) -> bool {
        let (_, reallocated) = Buffers::ensure(&mut self.buffers, dimensions, self.orientation);
        if reallocated {
            self.reallocations += 1;
        }
        reallocated
    }

    /// Convert, filter, and orient `frame`, returning the finished image. The
    /// image stays valid until the next call that takes `&mut self`.
    ///
    /// `mode` should be read once per frame (e.g. from a [SharedFilterMode])
    /// so one frame is never half filtered.
    ///
    /// A malformed frame is rejected before anything is written, so the
    /// previous output is left as it was.
    pub fn process(
        &mut self,
        frame: &PlanarFrame,
        mode: FilterMode,
    ) -> Result<&PackedImage, ProcessError> {
        let layout = frame.validate()?;

        let (buffers, reallocated) =
            Buffers::ensure(&mut self.buffers, frame.dimensions(), self.orientation);
        if reallocated {
            self.reallocations += 1;
        }

        let filled = buffers.fill(
            &self.converter,
            &mut self.filter,
            self.orientation,
            frame,
            layout,
            mode,
        );
        match filled {
            Ok(image) => {
                self.frames_processed += 1;
                Ok(image)
            }
            Err(e) => {
                // Everything was sized from the same dimensions above, so
                // getting here is a bug.
                debug_log_error!("Frame processing failed after validation: {e}");
                Err(e)
            }
        }
    }

    /// The most recently finished image, if there is one.
    pub fn output(&self) -> Option<&PackedImage> {
        let buffers = self.buffers.as_ref()?;
        Some(buffers.oriented.as_ref().unwrap_or(&buffers.filtered))
    }

    /// Free the buffers now instead of when the processor is dropped. The
    /// next [Self::process] call allocates them again.
    pub fn release_buffers(&mut self) {
        if self.buffers.take().is_some() {
            debug_log_info!("Released frame buffers.");
        }
    }

    /// How many times the buffers have been (re)allocated.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// How many frames made it all the way through [Self::process].
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new(EdgeFilter::new(), Orientation::Upright)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Pixel, Plane};

    fn nv21_gray(dims: Dimensions, luma: u8) -> Vec<u8> {
        let mut data = vec![luma; dims.area()];
        data.resize(PlanarFrame::contiguous_len(dims), 128);
        data
    }

    /// An NV21 frame with a bright square in the middle, so edges show up.
    fn nv21_square(dims: Dimensions) -> Vec<u8> {
        let (width, height) = dims.into();
        let mut data = nv21_gray(dims, 20);
        for row in height / 4..height * 3 / 4 {
            for col in width / 4..width * 3 / 4 {
                data[row * width + col] = 220;
            }
        }
        data
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let dims: Dimensions = (16, 12).into();
        let data = nv21_square(dims);
        let frame = PlanarFrame::nv21(dims, &data).unwrap();
        let mut processor = FrameProcessor::default();

        for mode in [FilterMode::EdgeDetection, FilterMode::Passthrough] {
            let first = processor.process(&frame, mode).unwrap().clone();
            let second = processor.process(&frame, mode).unwrap().clone();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn modes_produce_different_images() {
        let dims: Dimensions = (16, 12).into();
        let data = nv21_square(dims);
        let frame = PlanarFrame::nv21(dims, &data).unwrap();
        let mut processor = FrameProcessor::default();

        let raw = processor.process(&frame, FilterMode::Passthrough).unwrap().clone();
        let edges = processor.process(&frame, FilterMode::EdgeDetection).unwrap().clone();

        assert_eq!(raw.get(6, 8), Some(Pixel::from_gray(220)));
        assert_eq!(edges.get(6, 8), Some(Pixel::BLACK));
        assert_eq!(edges.get(6, 4), Some(Pixel::WHITE));
    }

    #[test]
    fn ensure_buffers_only_reallocates_on_change() {
        let mut processor = FrameProcessor::default();

        assert!(processor.ensure_buffers((8, 8).into()));
        assert!(!processor.ensure_buffers((8, 8).into()));
        assert_eq!(processor.reallocations(), 1);

        assert!(processor.ensure_buffers((4, 6).into()));
        assert!(!processor.ensure_buffers((4, 6).into()));
        assert_eq!(processor.reallocations(), 2);
    }

    #[test]
    fn new_dimensions_leave_no_residue() {
        let mut processor = FrameProcessor::default();

        let big: Dimensions = (20, 20).into();
        let data = nv21_gray(big, 250);
        processor
            .process(&PlanarFrame::nv21(big, &data).unwrap(), FilterMode::Passthrough)
            .unwrap();

        let small: Dimensions = (6, 4).into();
        let data = nv21_gray(small, 30);
        let image = processor
            .process(&PlanarFrame::nv21(small, &data).unwrap(), FilterMode::Passthrough)
            .unwrap();

        assert_eq!(image.dimensions(), small);
        assert_eq!(image.as_bytes().len(), 6 * 4 * 4);
        assert!(image.pixels().iter().all(|&p| p == Pixel::from_gray(30)));
        assert_eq!(processor.reallocations(), 2);
    }

    #[test]
    fn malformed_frame_keeps_the_previous_output() {
        let dims: Dimensions = (4, 4).into();
        let mut processor = FrameProcessor::default();

        let data = nv21_gray(dims, 90);
        let before = processor
            .process(&PlanarFrame::nv21(dims, &data).unwrap(), FilterMode::Passthrough)
            .unwrap()
            .clone();

        let y = [10u8; 16];
        let chroma = [128u8; 2];
        let bad = PlanarFrame::from_planes(
            dims,
            Plane::new(&y, 4, 1),
            Plane::new(&chroma, 2, 1),
            Plane::new(&chroma, 2, 1),
        );
        let result = processor.process(&bad, FilterMode::Passthrough);

        assert!(matches!(result, Err(ProcessError::InvalidFrameFormat(_))));
        assert_eq!(processor.output(), Some(&before));
        assert_eq!(processor.frames_processed(), 1);
    }

    #[test]
    fn malformed_frame_of_new_size_does_not_reallocate() {
        let mut processor = FrameProcessor::default();
        processor.ensure_buffers((4, 4).into());

        let y = [10u8; 4];
        let bad = PlanarFrame::from_planes(
            (8, 8).into(),
            Plane::new(&y, 8, 1),
            Plane::new(&y, 4, 1),
            Plane::new(&y, 4, 1),
        );

        assert!(processor.process(&bad, FilterMode::EdgeDetection).is_err());
        assert_eq!(processor.reallocations(), 1);
    }

    #[test]
    fn overflowing_stride_is_an_invalid_format() {
        let dims: Dimensions = (4, 4).into();
        let y = [10u8; 16];
        let chroma = [128u8; 4];
        let frame = PlanarFrame::from_planes(
            dims,
            Plane::new(&y, usize::MAX / 2, 1),
            Plane::new(&chroma, 2, 1),
            Plane::new(&chroma, 2, 1),
        );
        let mut processor = FrameProcessor::default();

        assert!(matches!(
            processor.process(&frame, FilterMode::EdgeDetection),
            Err(ProcessError::InvalidFrameFormat(
                FrameFormatError::StrideOverflow { .. }
            ))
        ));
        assert!(processor.output().is_none());
        assert_eq!(processor.reallocations(), 0);
    }

    #[test]
    fn release_buffers_frees_and_reallocates_later() {
        let dims: Dimensions = (4, 4).into();
        let data = nv21_gray(dims, 90);
        let frame = PlanarFrame::nv21(dims, &data).unwrap();
        let mut processor = FrameProcessor::default();

        processor.process(&frame, FilterMode::Passthrough).unwrap();
        processor.release_buffers();
        assert!(processor.output().is_none());

        processor.process(&frame, FilterMode::Passthrough).unwrap();
        assert_eq!(processor.reallocations(), 2);
    }

    #[test]
    fn rotations_move_pixels_clockwise() {
        // 3x2:
        // a b c
        // d e f
        let src = PackedImage::from_fn((3, 2).into(), |row, col| {
            Pixel::from_gray((row * 3 + col) as u8)
        });
        let at = |image: &PackedImage, row, col| image.get(row, col).unwrap().red();

        let mut turned = PackedImage::new(Orientation::Rotate90.apply(src.dimensions()));
        Orientation::Rotate90.rotate(&src, &mut turned).unwrap();
        // d a
        // e b
        // f c
        assert_eq!(turned.dimensions(), (2, 3).into());
        assert_eq!([at(&turned, 0, 0), at(&turned, 0, 1)], [3, 0]);
        assert_eq!([at(&turned, 2, 0), at(&turned, 2, 1)], [5, 2]);

        let mut flipped = PackedImage::new(src.dimensions());
        Orientation::Rotate180.rotate(&src, &mut flipped).unwrap();
        assert_eq!(at(&flipped, 0, 0), 5);
        assert_eq!(at(&flipped, 1, 2), 0);

        let mut back = PackedImage::new(Orientation::Rotate270.apply(src.dimensions()));
        Orientation::Rotate270.rotate(&src, &mut back).unwrap();
        // c f
        // b e
        // a d
        assert_eq!([at(&back, 0, 0), at(&back, 0, 1)], [2, 5]);
        assert_eq!([at(&back, 2, 0), at(&back, 2, 1)], [0, 3]);
    }

    #[test]
    fn rotate_checks_destination_dimensions() {
        let src = PackedImage::new((3, 2).into());
        let mut dst = PackedImage::new((3, 2).into());

        assert!(Orientation::Rotate90.rotate(&src, &mut dst).is_err());
        assert!(Orientation::Rotate180.rotate(&src, &mut dst).is_ok());
    }

    #[test]
    fn orientation_round_trips_through_degrees() {
        assert_eq!(Orientation::try_from(270), Ok(Orientation::Rotate270));
        assert_eq!(
            Orientation::try_from(45),
            Err(InvalidOrientationError { degrees: 45 })
        );
        assert_eq!(u16::from(Orientation::Rotate90), 90);
    }

    #[test]
    fn shared_mode_toggles_for_every_clone() {
        let mode = SharedFilterMode::new(FilterMode::Passthrough);
        let other = mode.clone();

        other.toggle();
        assert_eq!(mode.get(), FilterMode::EdgeDetection);

        mode.set(FilterMode::Passthrough);
        assert_eq!(other.get(), FilterMode::Passthrough);
        assert_eq!(FilterMode::Passthrough.toggled(), FilterMode::EdgeDetection);
    }
}
