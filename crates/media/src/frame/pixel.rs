//! Declares the [Pixel] type, the element type of a [super::PackedImage].

use bytemuck::{Pod, Zeroable};

/// A 32-bit RGBA pixel with four 8-bit channels: red, green, blue, and alpha
/// (opacity).
///
/// Internally, a [Pixel] is just 4 [u8]s stored contiguously with no extra
/// padding, so slices of pixels can be reinterpreted as bytes (see
/// [bytemuck]). That's what gets uploaded to the GPU.
///
/// | Channel         | Byte Offset |
/// | --------------- | ----------- |
/// | Red             | 0           |
/// | Green           | 1           |
/// | Blue            | 2           |
/// | Alpha (opacity) | 3           |
///
/// # Example
///
/// ```
/// use media::frame::Pixel;
///
/// let pixel = Pixel::from_rgb(0xAA, 0x55, 0x00);
/// assert_eq!(pixel.channels(), [0xAA, 0x55, 0x00, 0xFF]);
/// assert_eq!(size_of_val(&pixel), 4);
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Pixel {
    channels: [u8; 4],
}

impl Pixel {
    /// Opaque black.
    pub const BLACK: Self = Self::from_rgb(0, 0, 0);

    /// Opaque white.
    pub const WHITE: Self = Self::from_rgb(255, 255, 255);

    /// Create a pixel from its four channels.
    pub const fn from_rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            channels: [red, green, blue, alpha],
        }
    }

    /// Create an opaque pixel (alpha is `255`).
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::from_rgba(red, green, blue, u8::MAX)
    }

    /// Create an opaque gray pixel with every color channel set to `value`.
    pub const fn from_gray(value: u8) -> Self {
        Self::from_rgb(value, value, value)
    }

    pub const fn red(&self) -> u8 {
        self.channels[0]
    }

    pub const fn green(&self) -> u8 {
        self.channels[1]
    }

    pub const fn blue(&self) -> u8 {
        self.channels[2]
    }

    pub const fn alpha(&self) -> u8 {
        self.channels[3]
    }

    /// All four channels in RGBA order.
    pub const fn channels(&self) -> [u8; 4] {
        self.channels
    }

    /// The pixel's brightness using integer BT.601 weights:
    /// `(77R + 150G + 29B + 128) >> 8`. Alpha is ignored.
    ///
    /// ```
    /// use media::frame::Pixel;
    ///
    /// assert_eq!(Pixel::WHITE.luma(), 255);
    /// assert_eq!(Pixel::BLACK.luma(), 0);
    /// assert_eq!(Pixel::from_gray(100).luma(), 100);
    /// ```
    pub const fn luma(&self) -> u8 {
        let weighted =
            77 * self.red() as u32 + 150 * self.green() as u32 + 29 * self.blue() as u32 + 128;
        // The weights sum to 256, so this always fits.
        (weighted >> 8) as u8
    }
}

/// The default for [Pixel] is [Pixel::BLACK].
impl Default for Pixel {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<[u8; 4]> for Pixel {
    fn from(channels: [u8; 4]) -> Self {
        Self { channels }
    }
}

impl From<Pixel> for [u8; 4] {
    fn from(pixel: Pixel) -> Self {
        pixel.channels
    }
}

// Pixels must remain 4 bytes (32 bits) no matter what.
const _: () = assert!(size_of::<Pixel>() == 4);
