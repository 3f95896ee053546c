//! Declares [PlanarFrame], a borrowed view of a raw YUV 4:2:0 camera frame.
//!
//! Cameras hand out frames as three planes (Y, U and V) that may or may not
//! share memory. Each plane is described by a [Plane]: its bytes plus a row
//! stride (bytes from one row to the next) and a pixel stride (bytes from one
//! sample to the next within a row). Chroma planes with a pixel stride of `2`
//! are interleaved (NV21/NV12), chroma planes with a pixel stride of `1` are
//! separate (I420/YV12).

use super::{Dimensions, FrameFormatError, PlaneKind};

/// One plane of a [PlanarFrame].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane<'a> {
    data: &'a [u8],
    row_stride: usize,
    pixel_stride: usize,
}

impl<'a> Plane<'a> {
    pub const fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub const fn pixel_stride(&self) -> usize {
        self.pixel_stride
    }

    /// The fewest bytes this plane can hold and still have a sample for every
    /// position of a `dimensions` sized grid. The last row doesn't need any
    /// padding past its last sample.
    ///
    /// Returns [None] if the strides are too large for the size to fit a
    /// `usize`.
    pub fn required_len(&self, dimensions: Dimensions) -> Option<usize> {
        (dimensions.height() - 1)
            .checked_mul(self.row_stride)?
            .checked_add(self.row_len(dimensions)?)
    }

    /// The bytes spanned by one row of samples.
    fn row_len(&self, dimensions: Dimensions) -> Option<usize> {
        (dimensions.width() - 1)
            .checked_mul(self.pixel_stride)?
            .checked_add(1)
    }

    fn validate(&self, kind: PlaneKind, dimensions: Dimensions) -> Result<(), FrameFormatError> {
        if self.pixel_stride == 0 {
            return Err(FrameFormatError::UnsupportedPixelStride {
                plane: kind,
                pixel_stride: self.pixel_stride,
            });
        }

        let overflow = FrameFormatError::StrideOverflow {
            plane: kind,
            row_stride: self.row_stride,
            pixel_stride: self.pixel_stride,
        };

        let row_len = self.row_len(dimensions).ok_or(overflow)?;
        if dimensions.height() > 1 && self.row_stride < row_len {
            return Err(FrameFormatError::RowStrideTooShort {
                plane: kind,
                row_stride: self.row_stride,
            });
        }

        let needed = self.required_len(dimensions).ok_or(overflow)?;
        if self.data.len() < needed {
            return Err(FrameFormatError::PlaneTooShort {
                plane: kind,
                needed,
                actual: self.data.len(),
            });
        }

        Ok(())
    }
}

/// How the two chroma planes of a valid [PlanarFrame] are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaLayout {
    /// U and V each have their own plane (pixel stride `1`).
    Separate,
    /// U and V samples alternate in memory (pixel stride `2`).
    Interleaved,
}

/// A borrowed YUV 4:2:0 frame. Every 2x2 block of luma samples shares one U
/// and one V sample.
///
/// Construction doesn't validate anything except for the single buffer
/// constructors' total length, since camera planes are described by the
/// camera. Use [Self::validate] (the converter always does) before reading
/// samples.
///
/// # Example
///
/// ```
/// use media::frame::{ChromaLayout, PlanarFrame};
///
/// // A 4x2 NV21 frame: 8 luma bytes then 2 interleaved VU pairs.
/// let data = [16u8; 8 + 4];
/// let frame = PlanarFrame::nv21((4, 2).into(), &data).unwrap();
/// assert_eq!(frame.validate(), Ok(ChromaLayout::Interleaved));
///
/// let short = [16u8; 8 + 3];
/// assert!(PlanarFrame::nv21((4, 2).into(), &short).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanarFrame<'a> {
    dimensions: Dimensions,
    y: Plane<'a>,
    u: Plane<'a>,
    v: Plane<'a>,
}

impl<'a> PlanarFrame<'a> {
    /// Describe a frame with its three planes. This is the shape cameras
    /// generally hand frames out in.
    pub const fn from_planes(
        dimensions: Dimensions,
        y: Plane<'a>,
        u: Plane<'a>,
        v: Plane<'a>,
    ) -> Self {
        Self {
            dimensions,
            y,
            u,
            v,
        }
    }

    /// A contiguous NV21 buffer: the full luma plane followed by interleaved
    /// V/U pairs (V first).
    pub fn nv21(dimensions: Dimensions, data: &'a [u8]) -> Result<Self, FrameFormatError> {
        let (y, chroma) = Self::split_contiguous(dimensions, data)?;
        let row_stride = dimensions.chroma_420().width() * 2;
        Ok(Self::from_planes(
            dimensions,
            y,
            Plane::new(&chroma[1..], row_stride, 2),
            Plane::new(chroma, row_stride, 2),
        ))
    }

    /// A contiguous NV12 buffer: the full luma plane followed by interleaved
    /// U/V pairs (U first).
    pub fn nv12(dimensions: Dimensions, data: &'a [u8]) -> Result<Self, FrameFormatError> {
        let (y, chroma) = Self::split_contiguous(dimensions, data)?;
        let row_stride = dimensions.chroma_420().width() * 2;
        Ok(Self::from_planes(
            dimensions,
            y,
            Plane::new(chroma, row_stride, 2),
            Plane::new(&chroma[1..], row_stride, 2),
        ))
    }

    /// A contiguous I420 buffer: the full luma plane, then the full U plane,
    /// then the full V plane.
    pub fn i420(dimensions: Dimensions, data: &'a [u8]) -> Result<Self, FrameFormatError> {
        let (y, chroma) = Self::split_contiguous(dimensions, data)?;
        let chroma_dims = dimensions.chroma_420();
        let (u, v) = chroma.split_at(chroma_dims.area());
        Ok(Self::from_planes(
            dimensions,
            y,
            Plane::new(u, chroma_dims.width(), 1),
            Plane::new(v, chroma_dims.width(), 1),
        ))
    }

    /// The number of bytes a contiguous NV21, NV12 or I420 buffer of
    /// `dimensions` needs.
    ///
    /// ```
    /// use media::frame::PlanarFrame;
    ///
    /// assert_eq!(PlanarFrame::contiguous_len((640, 480).into()), 640 * 480 * 3 / 2);
    /// ```
    pub const fn contiguous_len(dimensions: Dimensions) -> usize {
        dimensions.area() + 2 * dimensions.chroma_420().area()
    }

    /// Split a contiguous buffer into its luma plane and the remaining chroma
    /// bytes, both trimmed to size.
    fn split_contiguous(
        dimensions: Dimensions,
        data: &'a [u8],
    ) -> Result<(Plane<'a>, &'a [u8]), FrameFormatError> {
        let needed = Self::contiguous_len(dimensions);
        if data.len() < needed {
            return Err(FrameFormatError::BufferTooShort {
                dimensions,
                needed,
                actual: data.len(),
            });
        }

        let (y, chroma) = data[..needed].split_at(dimensions.area());
        Ok((Plane::new(y, dimensions.width(), 1), chroma))
    }

    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub const fn y(&self) -> &Plane<'a> {
        &self.y
    }

    pub const fn u(&self) -> &Plane<'a> {
        &self.u
    }

    pub const fn v(&self) -> &Plane<'a> {
        &self.v
    }

    /// Make sure every plane is large enough for the frame's dimensions and
    /// the strides are ones this crate can read.
    ///
    /// The luma plane must have a pixel stride of `1`. The chroma planes must
    /// share a pixel stride of `1` or `2`.
    pub fn validate(&self) -> Result<ChromaLayout, FrameFormatError> {
        if self.y.pixel_stride != 1 {
            return Err(FrameFormatError::UnsupportedPixelStride {
                plane: PlaneKind::Luma,
                pixel_stride: self.y.pixel_stride,
            });
        }
        self.y.validate(PlaneKind::Luma, self.dimensions)?;

        if self.u.pixel_stride != self.v.pixel_stride {
            return Err(FrameFormatError::MismatchedChromaStrides {
                u: self.u.pixel_stride,
                v: self.v.pixel_stride,
            });
        }
        let layout = match self.u.pixel_stride {
            1 => ChromaLayout::Separate,
            2 => ChromaLayout::Interleaved,
            pixel_stride => {
                return Err(FrameFormatError::UnsupportedPixelStride {
                    plane: PlaneKind::ChromaU,
                    pixel_stride,
                });
            }
        };

        let chroma_dims = self.dimensions.chroma_420();
        self.u.validate(PlaneKind::ChromaU, chroma_dims)?;
        self.v.validate(PlaneKind::ChromaV, chroma_dims)?;

        Ok(layout)
    }
}
