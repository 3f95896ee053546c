mod args;
mod camera;
mod config;
mod headless;
mod producer;
mod viewer;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use engine::gpu::GpuPresenter;
use engine::surface;
use media::edge::EdgeFilter;
use media::processor::{FrameProcessor, SharedFilterMode};
use thiserror::Error;
use winit::error::EventLoopError;

use args::Args;
use camera::{Camera, FileCamera, SyntheticCamera};
use config::{Config, ConfigError, SourceKind};
use headless::CountingPresenter;
use producer::{Producer, ProducerStats};
use viewer::Viewer;

const GENERIC_ERROR_MSG: &str = "Something went wrong.";

fn main() -> ExitCode {
    let args = Args::parse();

    #[cfg(debug_assertions)]
    {
        use util::debug_log;
        if args.no_debug_logging {
            debug_log::disable();
        } else if args.no_debug_error_log_panics {
            debug_log::panic_on_errors::disable();
        }
    }

    let (config, camera) = match setup(&args) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mode = SharedFilterMode::new(config.start_mode);
    let processor = FrameProcessor::new(
        EdgeFilter::new()
            .with_smoothing(config.smoothing)
            .with_threshold(config.edge_threshold),
        config.orientation,
    );

    if config.headless {
        println!("{}", run_headless(&config, camera, processor, mode));
        return ExitCode::SUCCESS;
    }

    match run_windowed(&config, camera, processor, mode) {
        Ok(Some(stats)) => {
            println!("{stats}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            util::debug_log_warning!("Event loop failed: {e}");
            eprintln!("{GENERIC_ERROR_MSG}");
            ExitCode::FAILURE
        }
    }
}

/// Time between captured frames, or [None] to capture as fast as possible.
fn frame_interval(config: &Config) -> Option<Duration> {
    (config.fps > 0).then(|| Duration::from_secs(1) / config.fps)
}

/// Run the configured number of frames through a [CountingPresenter].
fn run_headless(
    config: &Config,
    camera: Box<dyn Camera + Send>,
    processor: FrameProcessor,
    mode: SharedFilterMode,
) -> headless::Report {
    let (submitter, surface) = surface::new::<CountingPresenter>();
    let producer = Producer::new(camera, processor, mode, submitter);
    let frames = config.frames.unwrap_or(headless::DEFAULT_FRAMES);
    headless::run(producer, surface, frames, frame_interval(config))
}

/// Produce frames on a thread and show them in a window until it's closed.
fn run_windowed(
    config: &Config,
    camera: Box<dyn Camera + Send>,
    processor: FrameProcessor,
    mode: SharedFilterMode,
) -> Result<Option<ProducerStats>, EventLoopError> {
    let output_size = processor.output_dimensions(camera.dimensions());
    let (submitter, surface) = surface::new::<GpuPresenter>();
    let producer = Producer::new(camera, processor, mode.clone(), submitter)
        .spawn(config.frames, frame_interval(config));
    Viewer::new(surface, mode, output_size, producer).run()
}

#[derive(Error, Debug)]
enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Couldn't open {path}: {source}")]
    OpenYuvFile { path: PathBuf, source: io::Error },
}

/// Load the configuration and open the frame source it names.
fn setup(args: &Args) -> Result<(Config, Box<dyn Camera + Send>), SetupError> {
    let config = Config::load(args)?;
    let dimensions = config.dimensions()?;

    let camera: Box<dyn Camera + Send> = match (config.source, &config.yuv_file) {
        (SourceKind::Synthetic, _) => Box::new(SyntheticCamera::new(dimensions, config.layout)),
        (SourceKind::File, Some(path)) => Box::new(
            FileCamera::open(path, dimensions, config.layout).map_err(|source| {
                SetupError::OpenYuvFile {
                    path: path.clone(),
                    source,
                }
            })?,
        ),
        (SourceKind::File, None) => return Err(ConfigError::MissingYuvFile.into()),
    };

    Ok((config, camera))
}

#[cfg(test)]
mod tests {
    use media::processor::FilterMode;

    use super::*;

    fn args() -> Args {
        Args {
            width: Some(48),
            height: Some(32),
            fps: Some(0),
            frames: Some(12),
            headless: true,
            ..Default::default()
        }
    }

    #[test]
    fn headless_setup_runs_end_to_end() {
        let (config, camera) = setup(&args()).unwrap();
        let processor = FrameProcessor::new(EdgeFilter::new(), config.orientation);

        let report = run_headless(
            &config,
            camera,
            processor,
            SharedFilterMode::new(FilterMode::EdgeDetection),
        );

        assert_eq!(report.producer.frames_captured, 12);
        assert_eq!(report.producer.frames_submitted, 12);
        assert_eq!(report.last_dimensions, Some((48, 32).into()));
    }

    #[test]
    fn missing_yuv_file_fails_setup() {
        let args = Args {
            source: Some(SourceKind::File),
            yuv_file: Some("/definitely/not/here.yuv".into()),
            ..args()
        };

        assert!(matches!(setup(&args), Err(SetupError::OpenYuvFile { .. })));
    }

    #[test]
    fn frame_interval_follows_fps() {
        let at = |fps| Config {
            fps,
            ..Default::default()
        };

        assert_eq!(frame_interval(&at(25)), Some(Duration::from_millis(40)));
        assert_eq!(frame_interval(&at(0)), None);
    }
}
