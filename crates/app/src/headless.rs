//! Runs the pipeline without a window. Frames still go through the
//! presentation surface, they just end up in a [CountingPresenter].

use std::fmt::{self, Display, Formatter};
use std::thread;
use std::time::Duration;

use engine::errors::PresentError;
use engine::surface::{DrawOutcome, PresentationSurface, Presenter};
use media::frame::Dimensions;
use util::debug_log_warning;

use crate::camera::Camera;
use crate::producer::{Producer, ProducerStats};

/// How many frames to run for when no limit is given.
pub const DEFAULT_FRAMES: u64 = 300;

/// How long to wait between draws, roughly a 240 Hz display.
const DRAW_INTERVAL: Duration = Duration::from_micros(4_167);

/// A [Presenter] that keeps count instead of drawing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CountingPresenter {
    pub uploads: u64,
    pub draws: u64,
    pub last_dimensions: Option<Dimensions>,
}

impl Presenter for CountingPresenter {
    fn upload(&mut self, dimensions: Dimensions, rgba: &[u8]) -> Result<(), PresentError> {
        let expected = dimensions.area() * 4;
        if rgba.len() != expected {
            return Err(PresentError::DataSizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        self.uploads += 1;
        self.last_dimensions = Some(dimensions);
        Ok(())
    }

    fn draw(&mut self) -> Result<(), PresentError> {
        self.draws += 1;
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// What a headless run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Report {
    pub producer: ProducerStats,
    pub new_frames: u64,
    pub redraws: u64,
    pub last_dimensions: Option<Dimensions>,
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "producer: {}", self.producer)?;
        write!(
            f,
            "surface:  {} new frames, {} redraws",
            self.new_frames, self.redraws
        )?;
        if let Some(dimensions) = self.last_dimensions {
            write!(f, ", last frame {dimensions}")?;
        }
        Ok(())
    }
}

/// Produce `frames` frames on a producer thread while this thread keeps
/// drawing whatever is newest, then report what happened.
pub fn run<C: Camera + Send + 'static>(
    producer: Producer<C>,
    mut surface: PresentationSurface<CountingPresenter>,
    frames: u64,
    frame_interval: Option<Duration>,
) -> Report {
    let mut report = Report::default();

    if let Err(e) = surface.attach(Ok(CountingPresenter::default())) {
        debug_log_warning!("Couldn't attach the counting presenter: {e}");
    }

    let producer = producer.spawn(Some(frames), frame_interval);

    let mut draw = |report: &mut Report| match surface.draw_latest() {
        Ok(DrawOutcome::NewFrame) => report.new_frames += 1,
        Ok(DrawOutcome::Redraw) => report.redraws += 1,
        Ok(DrawOutcome::NoFrame | DrawOutcome::Disabled) => {}
        Err(e) => debug_log_warning!("Draw failed: {e}"),
    };

    while !producer.is_finished() {
        draw(&mut report);
        thread::sleep(DRAW_INTERVAL);
    }
    // Pick up the last frame.
    draw(&mut report);

    report.producer = match producer.stop() {
        Ok(stats) => stats,
        Err(_) => {
            debug_log_warning!("The producer thread panicked.");
            ProducerStats::default()
        }
    };
    report.last_dimensions = surface.latest_frame().map(|image| image.dimensions());

    report
}

#[cfg(test)]
mod tests {
    use engine::surface;
    use media::edge::EdgeFilter;
    use media::processor::{FilterMode, FrameProcessor, Orientation, SharedFilterMode};

    use super::*;
    use crate::camera::{SyntheticCamera, YuvLayout};

    #[test]
    fn counting_presenter_checks_upload_size() {
        let mut presenter = CountingPresenter::default();

        assert!(presenter.upload((2, 2).into(), &[0; 16]).is_ok());
        assert!(matches!(
            presenter.upload((2, 2).into(), &[0; 12]),
            Err(PresentError::DataSizeMismatch {
                expected: 16,
                actual: 12
            })
        ));
        assert_eq!(presenter.uploads, 1);
    }

    #[test]
    fn run_reports_every_frame_and_the_final_size() {
        let (submitter, surface) = surface::new();
        let producer = Producer::new(
            SyntheticCamera::new((40, 30).into(), YuvLayout::I420),
            FrameProcessor::new(EdgeFilter::new().with_smoothing(true), Orientation::Rotate270),
            SharedFilterMode::new(FilterMode::EdgeDetection),
            submitter,
        );

        let report = run(producer, surface, 10, Some(Duration::from_millis(1)));

        assert_eq!(report.producer.frames_captured, 10);
        assert_eq!(report.producer.frames_submitted, 10);
        assert!(report.new_frames >= 1);
        assert!(report.new_frames + report.producer.frames_dropped == 10);
        assert_eq!(report.last_dimensions, Some((30, 40).into()));
    }
}
