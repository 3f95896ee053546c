//! Frame sources standing in for a camera: a generated test pattern and a
//! file of raw frames. Both reuse a single capture buffer, and the frame they
//! hand out borrows it until the next capture.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use clap::ValueEnum;
use media::frame::{Dimensions, FrameFormatError, PlanarFrame};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use util::debug_log_info;

/// How the chroma samples of a contiguous YUV 4:2:0 frame are laid out after
/// the luma plane.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YuvLayout {
    /// Interleaved, V first.
    #[default]
    Nv21,
    /// Interleaved, U first.
    Nv12,
    /// Separate planes, U then V.
    I420,
}

impl YuvLayout {
    pub fn frame(
        self,
        dimensions: Dimensions,
        data: &[u8],
    ) -> Result<PlanarFrame<'_>, FrameFormatError> {
        match self {
            YuvLayout::Nv21 => PlanarFrame::nv21(dimensions, data),
            YuvLayout::Nv12 => PlanarFrame::nv12(dimensions, data),
            YuvLayout::I420 => PlanarFrame::i420(dimensions, data),
        }
    }

    /// The byte offsets of the first U and V samples and the distance between
    /// neighbouring chroma samples, relative to the end of the luma plane.
    fn chroma_offsets(self, chroma: Dimensions) -> (usize, usize, usize) {
        match self {
            YuvLayout::Nv21 => (1, 0, 2),
            YuvLayout::Nv12 => (0, 1, 2),
            YuvLayout::I420 => (0, chroma.area(), 1),
        }
    }
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to read frame data: {0}")]
    Io(#[from] io::Error),
    #[error("The source doesn't hold a single complete frame ({frame_len} bytes).")]
    NoCompleteFrame { frame_len: usize },
    #[error(transparent)]
    InvalidFrameFormat(#[from] FrameFormatError),
}

/// Something that produces frames on demand.
pub trait Camera {
    fn dimensions(&self) -> Dimensions;

    /// Capture the next frame. The frame borrows the camera's buffer, so it
    /// has to be consumed before capturing again.
    fn capture(&mut self) -> Result<PlanarFrame<'_>, CameraError>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn capture(&mut self) -> Result<PlanarFrame<'_>, CameraError> {
        (**self).capture()
    }
}

/// A moving test pattern: a diagonal luma ramp with colour bands, and a
/// bright square bouncing across it so there are always some hard edges.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    dimensions: Dimensions,
    layout: YuvLayout,
    buffer: Vec<u8>,
    frame_index: u64,
}

impl SyntheticCamera {
    pub fn new(dimensions: Dimensions, layout: YuvLayout) -> Self {
        Self {
            dimensions,
            layout,
            buffer: vec![0; PlanarFrame::contiguous_len(dimensions)],
            frame_index: 0,
        }
    }

    fn render(&mut self) {
        let (width, height) = (self.dimensions.width(), self.dimensions.height());
        let t = self.frame_index as usize;

        let side = (width.min(height) / 4).max(1);
        let square_x = bounce(t * 3, width.saturating_sub(side));
        let square_y = bounce(t * 2, height.saturating_sub(side));

        let (luma, chroma_bytes) = self.buffer.split_at_mut(width * height);
        for (row, line) in luma.chunks_exact_mut(width).enumerate() {
            for (col, y) in line.iter_mut().enumerate() {
                let in_square = (square_x..square_x + side).contains(&col)
                    && (square_y..square_y + side).contains(&row);
                *y = if in_square {
                    235
                } else {
                    (16 + (row + col + t) * 200 / (width + height) % 200) as u8
                };
            }
        }

        let chroma = self.dimensions.chroma_420();
        let (u_offset, v_offset, step) = self.layout.chroma_offsets(chroma);
        for row in 0..chroma.height() {
            for col in 0..chroma.width() {
                let i = (row * chroma.width() + col) * step;
                let band = ((col * 4 / chroma.width()) as u8) * 32;
                chroma_bytes[u_offset + i] = 80 + band;
                chroma_bytes[v_offset + i] = 176 - band;
            }
        }
    }
}

impl Camera for SyntheticCamera {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn capture(&mut self) -> Result<PlanarFrame<'_>, CameraError> {
        self.render();
        self.frame_index += 1;
        Ok(self.layout.frame(self.dimensions, &self.buffer)?)
    }
}

/// Position `t` steps along a path that goes back and forth over `0..=max`.
fn bounce(t: usize, max: usize) -> usize {
    if max == 0 {
        return 0;
    }
    let phase = t % (2 * max);
    if phase <= max { phase } else { 2 * max - phase }
}

/// Raw frames read back to back from a file (or any other seekable reader),
/// starting over at the end. A partial frame at the end is skipped.
#[derive(Debug)]
pub struct FileCamera<R> {
    reader: R,
    dimensions: Dimensions,
    layout: YuvLayout,
    buffer: Vec<u8>,
    loops: u64,
}

impl FileCamera<BufReader<File>> {
    pub fn open(path: &Path, dimensions: Dimensions, layout: YuvLayout) -> io::Result<Self> {
        Ok(Self::new(
            BufReader::new(File::open(path)?),
            dimensions,
            layout,
        ))
    }
}

impl<R: Read + Seek> FileCamera<R> {
    pub fn new(reader: R, dimensions: Dimensions, layout: YuvLayout) -> Self {
        Self {
            reader,
            dimensions,
            layout,
            buffer: vec![0; PlanarFrame::contiguous_len(dimensions)],
            loops: 0,
        }
    }

    /// How many times playback started over.
    #[cfg(test)]
    fn loops(&self) -> u64 {
        self.loops
    }

    /// Read the next frame into the buffer, returning `false` at the end of
    /// the data.
    fn read_frame(&mut self) -> io::Result<bool> {
        match self.reader.read_exact(&mut self.buffer) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<R: Read + Seek> Camera for FileCamera<R> {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn capture(&mut self) -> Result<PlanarFrame<'_>, CameraError> {
        if !self.read_frame()? {
            self.reader.rewind()?;
            if !self.read_frame()? {
                return Err(CameraError::NoCompleteFrame {
                    frame_len: self.buffer.len(),
                });
            }
            self.loops += 1;
            debug_log_info!("Reached the end of the frames, starting over ({}).", self.loops);
        }
        Ok(self.layout.frame(self.dimensions, &self.buffer)?)
    }
}
