//! Contains [Config], the settings the viewer runs with, read from an optional
//! JSON file and then overridden by [Args].

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use media::frame::Dimensions;
use media::processor::{FilterMode, Orientation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::args::Args;
use crate::camera::YuvLayout;

/// Where frames come from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A generated moving test pattern.
    #[default]
    Synthetic,
    /// Raw frames read from `yuv_file`.
    File,
}

/// Everything the viewer can be configured with.
///
/// ```json
/// {
///   "source": "file",
///   "yuv_file": "capture.nv21",
///   "width": 1280,
///   "height": 720,
///   "orientation": 90,
///   "start_mode": "edges",
///   "edge_threshold": 48
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceKind,
    pub yuv_file: Option<PathBuf>,
    pub layout: YuvLayout,
    pub width: usize,
    pub height: usize,
    /// `0` means unpaced.
    pub fps: u32,
    pub orientation: Orientation,
    pub start_mode: FilterMode,
    pub smoothing: bool,
    pub edge_threshold: Option<u8>,
    pub headless: bool,
    pub frames: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::Synthetic,
            yuv_file: None,
            layout: YuvLayout::Nv21,
            width: 640,
            height: 480,
            fps: 30,
            orientation: Orientation::Upright,
            start_mode: FilterMode::EdgeDetection,
            smoothing: false,
            edge_threshold: None,
            headless: false,
            frames: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't open config file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Frame size {width}x{height} is invalid (both sides must be non-zero).")]
    ZeroDimensions { width: usize, height: usize },
    #[error("`--source file` needs a `--yuv-file`.")]
    MissingYuvFile,
}

impl Config {
    /// Read the file named by `--config` (if any) and apply the rest of
    /// `args` on top of it.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::read_from_path(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn read_from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_from(BufReader::new(file))
    }

    pub fn read_from(reader: impl Read) -> Result<Self, ConfigError> {
        serde_json::from_reader(reader)
            .inspect_err(|e| util::debug_log_warning!("Failed to parse config: {e}"))
            .map_err(Into::into)
    }

    /// Overwrite every setting that was given on the command line.
    pub fn apply_args(&mut self, args: &Args) {
        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        set(&mut self.source, &args.source);
        if args.yuv_file.is_some() {
            self.yuv_file = args.yuv_file.clone();
        }
        set(&mut self.layout, &args.layout);
        set(&mut self.width, &args.width);
        set(&mut self.height, &args.height);
        set(&mut self.fps, &args.fps);
        set(&mut self.orientation, &args.orientation);
        set(&mut self.start_mode, &args.start_mode.map(Into::into));
        set(&mut self.smoothing, &args.smoothing);
        if args.edge_threshold.is_some() {
            self.edge_threshold = args.edge_threshold;
        }
        self.headless |= args.headless;
        if args.frames.is_some() {
            self.frames = args.frames;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dimensions()?;
        if self.source == SourceKind::File && self.yuv_file.is_none() {
            return Err(ConfigError::MissingYuvFile);
        }
        Ok(())
    }

    /// The camera frame size.
    pub fn dimensions(&self) -> Result<Dimensions, ConfigError> {
        Dimensions::new(self.width, self.height).ok_or(ConfigError::ZeroDimensions {
            width: self.width,
            height: self.height,
        })
    }
}
