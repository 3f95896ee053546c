//! The producer side of the pipeline: capture a frame, process it, submit it,
//! repeat. Runs on its own thread so the window never waits on it.

use std::fmt::{self, Display, Formatter};
use std::thread;
use std::time::{Duration, Instant};

use engine::surface::FrameSubmitter;
use media::processor::{FrameProcessor, SharedFilterMode};
use util::drop_join_thread::{self, StopFlag, StoppableThread};
use util::{debug_log_info, debug_log_warning};

use crate::camera::Camera;

/// How often statistics are logged while running.
const STATS_INTERVAL: Duration = Duration::from_secs(2);

/// Counters for a producer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProducerStats {
    pub frames_captured: u64,
    /// Frames that came out of the processor and were handed to the surface.
    pub frames_submitted: u64,
    /// Malformed frames the processor refused.
    pub frames_rejected: u64,
    /// Submitted frames that were replaced before being drawn.
    pub frames_dropped: u64,
    /// How often the processing buffers were (re)allocated.
    pub reallocations: u64,
    pub elapsed: Duration,
}

impl ProducerStats {
    /// Frames processed per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_submitted as f64 / secs
        } else {
            0.0
        }
    }
}

impl Display for ProducerStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} captured, {} submitted, {} rejected, {} dropped, {} reallocations, {:.1} fps",
            self.frames_captured,
            self.frames_submitted,
            self.frames_rejected,
            self.frames_dropped,
            self.reallocations,
            self.rate()
        )
    }
}

/// Why [Producer::step] didn't produce a frame, or [Producer::run] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    /// The camera can't produce any more frames.
    CameraFailed,
    /// Nobody is drawing the frames anymore.
    SurfaceGone,
}

/// Owns everything on the producing side of the pipeline.
#[derive(Debug)]
pub struct Producer<C> {
    camera: C,
    processor: FrameProcessor,
    mode: SharedFilterMode,
    submitter: FrameSubmitter,
    stats: ProducerStats,
}

impl<C: Camera> Producer<C> {
    pub fn new(
        camera: C,
        processor: FrameProcessor,
        mode: SharedFilterMode,
        submitter: FrameSubmitter,
    ) -> Self {
        Self {
            camera,
            processor,
            mode,
            submitter,
            stats: ProducerStats::default(),
        }
    }

    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            frames_dropped: self.submitter.dropped_frames(),
            reallocations: self.processor.reallocations(),
            ..self.stats
        }
    }

    /// Capture, process, and submit one frame. A frame the processor rejects
    /// is skipped and the previous one stays on screen.
    fn step(&mut self) -> Result<(), Halt> {
        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                debug_log_warning!("Camera failed, no more frames: {e}");
                return Err(Halt::CameraFailed);
            }
        };
        self.stats.frames_captured += 1;

        // Read once so the whole frame uses the same mode.
        let mode = self.mode.get();

        let image = match self.processor.process(&frame, mode) {
            Ok(image) => image,
            Err(e) => {
                debug_log_warning!("Dropped a frame: {e}");
                self.stats.frames_rejected += 1;
                return Ok(());
            }
        };

        if self.submitter.submit(image).is_err() {
            return Err(Halt::SurfaceGone);
        }
        self.stats.frames_submitted += 1;

        Ok(())
    }

    /// Produce frames until `stop` is raised, `frame_limit` frames were
    /// captured, or the camera or surface goes away. With a `frame_interval`
    /// frames are paced to at most one per interval.
    pub fn run(
        mut self,
        stop: &StopFlag,
        frame_limit: Option<u64>,
        frame_interval: Option<Duration>,
    ) -> ProducerStats {
        debug_log_info!(
            "Producing {} frames ({:?}).",
            self.camera.dimensions(),
            self.processor.orientation()
        );

        let start = Instant::now();
        let mut last_report = start;
        let mut next_frame = start;

        while !stop.is_raised() {
            if frame_limit.is_some_and(|limit| self.stats.frames_captured >= limit) {
                break;
            }

            if let Some(interval) = frame_interval {
                let now = Instant::now();
                if next_frame > now {
                    thread::sleep(next_frame - now);
                }
                // Don't try to catch up after a stall.
                next_frame = next_frame.max(now) + interval;
            }

            match self.step() {
                Ok(()) => {}
                Err(Halt::CameraFailed) => break,
                Err(Halt::SurfaceGone) => {
                    debug_log_info!("Presentation surface is gone, stopping.");
                    break;
                }
            }

            if last_report.elapsed() >= STATS_INTERVAL {
                self.stats.elapsed = start.elapsed();
                debug_log_info!("Producer: {}", self.stats());
                last_report = Instant::now();
            }
        }

        self.stats.elapsed = start.elapsed();
        self.processor.release_buffers();
        self.stats()
    }
}

impl<C: Camera + Send + 'static> Producer<C> {
    /// Run on a new thread, which is stopped and joined when the returned
    /// handle is dropped.
    pub fn spawn(
        self,
        frame_limit: Option<u64>,
        frame_interval: Option<Duration>,
    ) -> StoppableThread<ProducerStats> {
        drop_join_thread::spawn_stoppable(move |stop| self.run(&stop, frame_limit, frame_interval))
    }
}

#[cfg(test)]
mod tests {
    use engine::surface::{self, DrawOutcome, PresentationSurface};
    use media::edge::EdgeFilter;
    use media::frame::{Dimensions, Plane, PlanarFrame};
    use media::processor::{FilterMode, Orientation};

    use super::*;
    use crate::camera::{CameraError, SyntheticCamera, YuvLayout};
    use crate::headless::CountingPresenter;

    /// Hands out a frame with a truncated chroma plane every other capture.
    struct FlakyCamera {
        inner: SyntheticCamera,
        captures: u64,
    }

    impl Camera for FlakyCamera {
        fn dimensions(&self) -> Dimensions {
            self.inner.dimensions()
        }

        fn capture(&mut self) -> Result<PlanarFrame<'_>, CameraError> {
            self.captures += 1;
            let broken = self.captures % 2 == 0;
            let frame = self.inner.capture()?;
            if !broken {
                return Ok(frame);
            }
            let u = frame.u();
            Ok(PlanarFrame::from_planes(
                frame.dimensions(),
                *frame.y(),
                Plane::new(&u.data()[..1], u.row_stride(), u.pixel_stride()),
                *frame.v(),
            ))
        }
    }

    fn producer<C: Camera>(
        camera: C,
        orientation: Orientation,
    ) -> (Producer<C>, PresentationSurface<CountingPresenter>) {
        let (submitter, mut surface) = surface::new();
        surface.attach(Ok(CountingPresenter::default())).unwrap();
        let producer = Producer::new(
            camera,
            FrameProcessor::new(EdgeFilter::new(), orientation),
            SharedFilterMode::new(FilterMode::EdgeDetection),
            submitter,
        );
        (producer, surface)
    }

    #[test]
    fn runs_until_the_frame_limit() {
        let camera = SyntheticCamera::new((32, 24).into(), YuvLayout::Nv21);
        let (producer, mut surface) = producer(camera, Orientation::Rotate90);

        let stats = producer.run(&StopFlag::new(), Some(5), None);

        assert_eq!(stats.frames_captured, 5);
        assert_eq!(stats.frames_submitted, 5);
        assert_eq!(stats.frames_rejected, 0);
        // Nothing was drawn in between, so only the last one survives.
        assert_eq!(stats.frames_dropped, 4);
        assert_eq!(stats.reallocations, 1);

        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);
        assert_eq!(
            surface.latest_frame().map(|image| image.dimensions()),
            Some((24, 32).into())
        );
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let camera = FlakyCamera {
            inner: SyntheticCamera::new((16, 16).into(), YuvLayout::I420),
            captures: 0,
        };
        let (producer, _surface) = producer(camera, Orientation::Upright);

        let stats = producer.run(&StopFlag::new(), Some(6), None);

        assert_eq!(stats.frames_captured, 6);
        assert_eq!(stats.frames_submitted, 3);
        assert_eq!(stats.frames_rejected, 3);
    }

    #[test]
    fn stops_when_the_surface_is_dropped() {
        let camera = SyntheticCamera::new((8, 8).into(), YuvLayout::Nv12);
        let (producer, surface) = producer(camera, Orientation::Upright);
        drop(surface);

        let stats = producer.run(&StopFlag::new(), None, None);

        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.frames_submitted, 0);
    }

    #[test]
    fn spawned_producer_stops_on_request() {
        let camera = SyntheticCamera::new((8, 8).into(), YuvLayout::Nv21);
        let (producer, mut surface) = producer(camera, Orientation::Upright);

        let handle = producer.spawn(None, Some(Duration::from_millis(1)));
        while surface.draw_latest().unwrap() == DrawOutcome::NoFrame {
            thread::yield_now();
        }
        let stats = handle.stop().unwrap();

        assert!(stats.frames_submitted >= 1);
    }
}
