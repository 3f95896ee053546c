//! Contains [Args], which are parsed command-line flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use media::processor::{FilterMode, Orientation};

use crate::camera::YuvLayout;
use crate::config::SourceKind;

/// Parsed command line arguments. Every setting except `--config` overrides
/// the value from the config file.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[command(about = "Shows a live camera feed with optional edge detection.")]
pub struct Args {
    /// Read settings from this JSON file. Missing fields use their defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where frames come from.
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// A file of raw back-to-back YUV 4:2:0 frames (used with `--source
    /// file`). Playback loops at the end of the file.
    #[arg(long, value_name = "PATH")]
    pub yuv_file: Option<PathBuf>,

    /// How the chroma planes are laid out in each frame.
    #[arg(long)]
    pub layout: Option<YuvLayout>,

    /// Frame width in pixels.
    #[arg(long)]
    pub width: Option<usize>,

    /// Frame height in pixels.
    #[arg(long)]
    pub height: Option<usize>,

    /// Frames captured per second. `0` captures as fast as possible.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Clockwise rotation applied to every frame (0, 90, 180 or 270).
    #[arg(long, value_name = "DEGREES", value_parser = parse_orientation)]
    pub orientation: Option<Orientation>,

    /// Whether edge detection is on at startup. Press `E` or space to toggle.
    #[arg(long)]
    pub start_mode: Option<StartMode>,

    /// Blur frames before edge detection.
    #[arg(long, num_args(0..=1), default_missing_value = "true")]
    pub smoothing: Option<bool>,

    /// Show edges at least this strong in white and everything else in black.
    #[arg(long, value_name = "0-255")]
    pub edge_threshold: Option<u8>,

    /// Don't open a window, just run the pipeline and print statistics.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames.
    #[arg(long)]
    pub frames: Option<u64>,

    #[cfg(debug_assertions)]
    /// Disable debug logging. This option only exists if `debug_assertions` are
    /// enabled.
    #[arg(long)]
    pub no_debug_logging: bool,

    #[cfg(debug_assertions)]
    /// Log internal errors (like a frame size mismatch between pipeline
    /// stages) instead of panicking on them. This option only exists if
    /// `debug_assertions` are enabled.
    #[arg(long, conflicts_with = "no_debug_logging")]
    pub no_debug_error_log_panics: bool,
}

/// The [FilterMode] names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartMode {
    /// Edge detection.
    Edges,
    /// The converted camera image.
    Raw,
}

impl From<StartMode> for FilterMode {
    fn from(mode: StartMode) -> Self {
        match mode {
            StartMode::Edges => FilterMode::EdgeDetection,
            StartMode::Raw => FilterMode::Passthrough,
        }
    }
}

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    let degrees: u16 = s.parse().map_err(|e| format!("{e}"))?;
    Orientation::try_from(degrees).map_err(|e| e.to_string())
}
