//! Declares the [Dimensions] type, which every image type in [super] carries.

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroUsize;

/// A width and a height, both guaranteed to be non-zero.
///
/// # Example
///
/// [From<(usize, usize)>] is implemented for [Dimensions]. If either side is
/// `0`, the thread will panic, so only use it with literals.
///
/// ```
/// use media::frame::Dimensions;
///
/// let d: Dimensions = (640, 480).into();
/// assert_eq!(d.width(), 640);
/// assert_eq!(d.height(), 480);
/// assert_eq!(d.to_string(), "640x480");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: NonZeroUsize,
    height: NonZeroUsize,
}

impl Dimensions {
    /// Construct from a width and a height.
    ///
    /// This function will return [None] if the width or height are 0.
    pub const fn new(width: usize, height: usize) -> Option<Self> {
        let Some(width) = NonZeroUsize::new(width) else {
            return None;
        };
        let Some(height) = NonZeroUsize::new(height) else {
            return None;
        };

        Some(Self { width, height })
    }

    /// The width in pixels. This will never be `0`.
    pub const fn width(&self) -> usize {
        self.width.get()
    }

    /// The height in pixels. This will never be `0`.
    pub const fn height(&self) -> usize {
        self.height.get()
    }

    /// The number of pixels in an image with these dimensions.
    pub const fn area(&self) -> usize {
        self.width.get() * self.height.get()
    }

    /// The same dimensions with the width and height swapped.
    pub const fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// The size of each chroma plane of a 4:2:0 frame with these dimensions.
    /// Odd sides round up, so the last chroma column/row covers a single
    /// luma sample.
    ///
    /// ```
    /// use media::frame::Dimensions;
    ///
    /// let d: Dimensions = (5, 3).into();
    /// assert_eq!(d.chroma_420(), (3, 2).into());
    /// ```
    pub const fn chroma_420(&self) -> Self {
        // SAFETY: Both sides are at least 1, and `div_ceil(2)` of anything
        // that's at least 1 is also at least 1.
        unsafe {
            Self {
                width: NonZeroUsize::new_unchecked(self.width.get().div_ceil(2)),
                height: NonZeroUsize::new_unchecked(self.height.get().div_ceil(2)),
            }
        }
    }
}

/// When displayed, [Dimensions] will look like `WxH` (e.g. `1920x1080`).
impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// If either side is `0`, the thread will panic.
impl From<(usize, usize)> for Dimensions {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::new(dimensions.0, dimensions.1).expect("Both sides must be non-zero.")
    }
}

impl From<Dimensions> for (usize, usize) {
    fn from(dimensions: Dimensions) -> Self {
        (dimensions.width(), dimensions.height())
    }
}
