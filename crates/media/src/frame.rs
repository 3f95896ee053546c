//! This module exports the image types the pipeline passes around: borrowed
//! [PlanarFrame]s straight from a camera and owned, packed [PackedImage]s that
//! come out of conversion and filtering.

mod dimensions;
mod packed;
mod pixel;
mod planar;

use thiserror::Error;

pub use dimensions::*;
pub use packed::*;
pub use pixel::*;
pub use planar::*;

/// Two images that should have had the same dimensions didn't.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("Expected dimensions {expected} but got {actual}.")]
pub struct DimensionMismatchError {
    pub expected: Dimensions,
    pub actual: Dimensions,
}

impl DimensionMismatchError {
    /// `Ok(())` if `actual == expected`, otherwise an error holding both.
    pub fn check(expected: Dimensions, actual: Dimensions) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self { expected, actual })
        }
    }
}

/// Which plane of a [PlanarFrame] something refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    Luma,
    ChromaU,
    ChromaV,
}

impl std::fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PlaneKind::Luma => "Y",
            PlaneKind::ChromaU => "U",
            PlaneKind::ChromaV => "V",
        })
    }
}

/// A raw frame's planes don't describe a valid YUV 4:2:0 image.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormatError {
    #[error("The {plane} plane holds {actual} bytes but {needed} are needed.")]
    PlaneTooShort {
        plane: PlaneKind,
        needed: usize,
        actual: usize,
    },
    #[error("The {plane} plane's row stride of {row_stride} is shorter than a row.")]
    RowStrideTooShort { plane: PlaneKind, row_stride: usize },
    #[error(
        "The {plane} plane's strides ({row_stride} per row, {pixel_stride} per sample) are too large."
    )]
    StrideOverflow {
        plane: PlaneKind,
        row_stride: usize,
        pixel_stride: usize,
    },
    #[error("The {plane} plane's pixel stride of {pixel_stride} is not supported.")]
    UnsupportedPixelStride {
        plane: PlaneKind,
        pixel_stride: usize,
    },
    #[error("The U and V planes have different pixel strides ({u} and {v}).")]
    MismatchedChromaStrides { u: usize, v: usize },
    #[error("The buffer holds {actual} bytes but a {dimensions} frame needs {needed}.")]
    BufferTooShort {
        dimensions: Dimensions,
        needed: usize,
        actual: usize,
    },
}
