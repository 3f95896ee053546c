//! The hand-off between the thread producing frames and the thread drawing
//! them.
//!
//! [new] creates a connected [FrameSubmitter] and [PresentationSurface]. The
//! submitter copies each finished image into a latest-wins slot (see
//! [util::channels::latest_slot]) and never waits on the renderer. The surface
//! picks up whatever image is newest when it's time to draw, uploads it if it
//! hasn't been uploaded yet, and draws it.
//!
//! ```text
//! producer thread                      render thread
//! ---------------                      -------------
//! FrameProcessor::process(..)
//!   -> FrameSubmitter::submit(..) ---> PresentationSurface::draw_latest()
//!                                        -> Presenter::upload(..)
//!                                        -> Presenter::draw()
//! ```

use media::frame::{Dimensions, PackedImage};
use util::channels::latest_slot::{self, Inbox, Outbox};
use util::channels::{ChannelError, ChannelResult};
use util::{debug_log_info, debug_log_warning};

use crate::errors::PresentError;

/// Whatever actually puts pixels on the screen. [crate::gpu::GpuPresenter] is
/// the real one.
///
/// A presenter holds onto the last uploaded frame, so [Self::draw] can be
/// called any number of times per upload.
#[cfg_attr(test, mockall::automock)]
pub trait Presenter {
    /// Replace the frame being drawn. `rgba` is tightly packed, 4 bytes per
    /// pixel. Implementations should only reallocate their texture when
    /// `dimensions` changes.
    fn upload(&mut self, dimensions: Dimensions, rgba: &[u8]) -> Result<(), PresentError>;

    /// Draw the last uploaded frame (or just clear, if there isn't one) and
    /// present it.
    fn draw(&mut self) -> Result<(), PresentError>;

    /// The drawable area changed size.
    fn resize(&mut self, width: u32, height: u32);
}

/// What [PresentationSurface::draw_latest] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawOutcome {
    /// A frame was uploaded and then drawn.
    NewFrame,
    /// Nothing new was submitted, the previous frame was drawn again.
    Redraw,
    /// No frame has ever been submitted. The surface was only cleared.
    NoFrame,
    /// There's no presenter attached, nothing happened.
    Disabled,
}

/// Create a connected [FrameSubmitter] (for the producer thread) and
/// [PresentationSurface] (for the render thread).
pub fn new<P: Presenter>() -> (FrameSubmitter, PresentationSurface<P>) {
    let (inbox, outbox) = latest_slot::new();

    let submitter = FrameSubmitter { outbox };
    let surface = PresentationSurface {
        inbox,
        presenter: None,
        needs_upload: false,
        viewport: None,
        producer_gone: false,
    };

    (submitter, surface)
}

/// The producer thread's half of a presentation surface.
#[derive(Debug)]
pub struct FrameSubmitter {
    outbox: Outbox<PackedImage>,
}

impl FrameSubmitter {
    /// Make `image` the next frame to draw, replacing the previous one if it
    /// hasn't been drawn yet.
    ///
    /// `image` is copied into a buffer this submitter owns before anything is
    /// locked, and the lock is only held to swap that buffer in. This never
    /// waits for the render thread.
    ///
    /// A [ChannelError::ConnectionDropped] error is returned if the
    /// [PresentationSurface] was dropped.
    pub fn submit(&mut self, image: &PackedImage) -> ChannelResult<()> {
        self.outbox.publish_with(|back| back.copy_resizing_from(image))
    }

    /// How many submitted frames were replaced before they could be drawn.
    pub fn dropped_frames(&self) -> u64 {
        self.outbox.dropped_values()
    }

    /// Whether the [PresentationSurface] still exists.
    pub fn connection_open(&self) -> bool {
        self.outbox.connection_open()
    }
}

/// The render thread's half of a presentation surface.
///
/// Drawing only happens while a [Presenter] is attached (see [Self::attach]
/// and [Self::detach]). The last submitted frame is kept either way, so a
/// newly attached presenter gets it on its first draw.
#[derive(Debug)]
pub struct PresentationSurface<P> {
    inbox: Inbox<PackedImage>,
    presenter: Option<P>,
    /// The latest frame hasn't reached the current presenter.
    needs_upload: bool,
    viewport: Option<(u32, u32)>,
    producer_gone: bool,
}

impl<P: Presenter> PresentationSurface<P> {
    /// Start drawing with a newly created presenter, e.g. after the window
    /// surface was (re)created. The previous presenter, if any, is dropped.
    ///
    /// If creating the presenter failed, drawing stays disabled and the error
    /// is handed back so the caller can report it.
    pub fn attach(&mut self, presenter: Result<P, PresentError>) -> Result<(), PresentError> {
        match presenter {
            Ok(mut presenter) => {
                if let Some((width, height)) = self.viewport {
                    presenter.resize(width, height);
                }
                self.presenter = Some(presenter);
                self.needs_upload = self.inbox.latest().is_some();
                debug_log_info!("Presenter attached.");
                Ok(())
            }
            Err(e) => {
                self.presenter = None;
                debug_log_warning!("Presenter creation failed, drawing is disabled: {e}");
                Err(e)
            }
        }
    }

    /// Stop drawing and release the presenter (and all of its GPU resources),
    /// e.g. because the window surface was destroyed.
    pub fn detach(&mut self) {
        if self.presenter.take().is_some() {
            debug_log_info!("Presenter detached.");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.presenter.is_some()
    }

    /// The drawable area changed size. Remembered for presenters attached
    /// later.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.resize(width, height);
        }
    }

    /// Draw the newest submitted frame.
    ///
    /// If a frame arrived since the last call it is uploaded first, otherwise
    /// the previous frame is drawn again without another upload. The slot's
    /// lock is only held to swap buffers, never during the upload.
    ///
    /// If the upload fails the error is returned and the upload is tried
    /// again on the next call. A failed draw leaves the uploaded frame in
    /// place, so the next call only draws it again.
    pub fn draw_latest(&mut self) -> Result<DrawOutcome, PresentError> {
        let Some(presenter) = self.presenter.as_mut() else {
            return Ok(DrawOutcome::Disabled);
        };

        match self.inbox.check() {
            Ok(Some(_)) => self.needs_upload = true,
            Ok(None) => {}
            Err(ChannelError::ConnectionDropped) => {
                if !self.producer_gone {
                    debug_log_info!("Frame producer is gone, holding the last frame.");
                    self.producer_gone = true;
                }
            }
        }

        let Some(image) = self.inbox.latest() else {
            presenter.draw()?;
            return Ok(DrawOutcome::NoFrame);
        };

        let outcome = if self.needs_upload {
            presenter.upload(image.dimensions(), image.as_bytes())?;
            self.needs_upload = false;
            DrawOutcome::NewFrame
        } else {
            DrawOutcome::Redraw
        };

        presenter.draw()?;

        Ok(outcome)
    }

    /// The frame that is (or will be, once attached) on screen.
    pub fn latest_frame(&self) -> Option<&PackedImage> {
        self.inbox.latest()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use media::frame::Pixel;
    use mockall::predicate::eq;

    use super::*;

    /// Uploads seen by a [RecordingPresenter], shared with the test.
    type Uploads = Arc<Mutex<Vec<(Dimensions, Vec<u8>)>>>;

    /// Keeps every upload and counts draws.
    #[derive(Debug, Default)]
    struct RecordingPresenter {
        uploads: Uploads,
        draws: usize,
    }

    impl Presenter for RecordingPresenter {
        fn upload(&mut self, dimensions: Dimensions, rgba: &[u8]) -> Result<(), PresentError> {
            self.uploads
                .lock()
                .unwrap()
                .push((dimensions, rgba.to_vec()));
            Ok(())
        }

        fn draw(&mut self) -> Result<(), PresentError> {
            self.draws += 1;
            Ok(())
        }

        fn resize(&mut self, _width: u32, _height: u32) {}
    }

    fn gray(dims: (usize, usize), value: u8) -> PackedImage {
        PackedImage::from_fill(dims.into(), Pixel::from_gray(value))
    }

    fn recording() -> (RecordingPresenter, Uploads) {
        let presenter = RecordingPresenter::default();
        let uploads = presenter.uploads.clone();
        (presenter, uploads)
    }

    #[test]
    fn nothing_submitted_only_clears() {
        let (_submitter, mut surface) = new::<MockPresenter>();

        let mut presenter = MockPresenter::new();
        presenter.expect_upload().never();
        presenter.expect_draw().times(1).returning(|| Ok(()));
        surface.attach(Ok(presenter)).unwrap();

        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NoFrame);
    }

    #[test]
    fn new_frame_is_uploaded_once_then_redrawn() {
        let (mut submitter, mut surface) = new::<MockPresenter>();

        let mut presenter = MockPresenter::new();
        presenter
            .expect_upload()
            .times(1)
            .returning(|dims, rgba| {
                assert_eq!(dims, (2, 2).into());
                assert_eq!(rgba, &[9u8, 9, 9, 255].repeat(4)[..]);
                Ok(())
            });
        presenter.expect_draw().times(3).returning(|| Ok(()));
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((2, 2), 9)).unwrap();

        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Redraw);
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Redraw);
    }

    #[test]
    fn only_the_newest_of_many_submits_is_uploaded() {
        let (mut submitter, mut surface) = new();
        let (presenter, uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();

        for value in 1..=5 {
            submitter.submit(&gray((3, 1), value)).unwrap();
        }
        surface.draw_latest().unwrap();

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, gray((3, 1), 5).as_bytes());
        assert_eq!(submitter.dropped_frames(), 4);
    }

    #[test]
    fn dimension_changes_reach_the_presenter() {
        let (mut submitter, mut surface) = new();
        let (presenter, uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((4, 4), 1)).unwrap();
        surface.draw_latest().unwrap();
        submitter.submit(&gray((2, 3), 2)).unwrap();
        surface.draw_latest().unwrap();

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads[0].0, (4, 4).into());
        assert_eq!(uploads[1].0, (2, 3).into());
        assert_eq!(uploads[1].1.len(), 2 * 3 * 4);
    }

    #[test]
    fn detached_surface_is_disabled_and_reattach_reuploads() {
        let (mut submitter, mut surface) = new();
        let (presenter, first_uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((2, 2), 50)).unwrap();
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);

        surface.detach();
        assert!(!surface.is_attached());
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Disabled);

        let (presenter, second_uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Redraw);

        assert_eq!(first_uploads.lock().unwrap().len(), 1);
        let second_uploads = second_uploads.lock().unwrap();
        assert_eq!(second_uploads.len(), 1);
        assert_eq!(second_uploads[0].1, gray((2, 2), 50).as_bytes());
    }

    #[test]
    fn failed_attach_disables_drawing() {
        let (mut submitter, mut surface) = new::<MockPresenter>();
        submitter.submit(&gray((2, 2), 1)).unwrap();

        let result = surface.attach(Err(PresentError::resource("GPU adapter", "none found")));

        assert!(matches!(
            result,
            Err(PresentError::GraphicsResourceFailure { .. })
        ));
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Disabled);
    }

    #[test]
    fn failed_upload_is_retried_on_the_next_draw() {
        let (mut submitter, mut surface) = new::<MockPresenter>();

        let mut presenter = MockPresenter::new();
        let mut seq = mockall::Sequence::new();
        presenter
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(PresentError::DataSizeMismatch {
                    expected: 16,
                    actual: 0,
                })
            });
        presenter
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        presenter.expect_draw().times(1).returning(|| Ok(()));
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((2, 2), 1)).unwrap();

        assert!(surface.draw_latest().is_err());
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);
    }

    #[test]
    fn failed_draw_does_not_upload_again() {
        let (mut submitter, mut surface) = new::<MockPresenter>();

        let mut presenter = MockPresenter::new();
        let mut seq = mockall::Sequence::new();
        presenter.expect_upload().times(1).returning(|_, _| Ok(()));
        presenter
            .expect_draw()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(wgpu::SurfaceError::Outdated.into()));
        presenter
            .expect_draw()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((2, 2), 1)).unwrap();

        assert!(surface.draw_latest().unwrap_err().is_transient());
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Redraw);
    }

    #[test]
    fn resize_is_forwarded_and_remembered() {
        let (_submitter, mut surface) = new::<MockPresenter>();
        surface.resize(800, 600);

        // Attached after the resize, so it's told the size on attach.
        let mut presenter = MockPresenter::new();
        presenter
            .expect_resize()
            .with(eq(800), eq(600))
            .times(1)
            .return_const(());
        presenter
            .expect_resize()
            .with(eq(1024), eq(768))
            .times(1)
            .return_const(());
        surface.attach(Ok(presenter)).unwrap();

        surface.resize(1024, 768);
    }

    #[test]
    fn producer_going_away_keeps_the_last_frame() {
        let (mut submitter, mut surface) = new();
        let (presenter, uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();

        submitter.submit(&gray((1, 1), 3)).unwrap();
        drop(submitter);

        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::NewFrame);
        assert_eq!(surface.draw_latest().unwrap(), DrawOutcome::Redraw);
        assert_eq!(uploads.lock().unwrap().len(), 1);
        assert_eq!(surface.latest_frame(), Some(&gray((1, 1), 3)));
    }

    #[test]
    fn submit_fails_once_the_surface_is_dropped() {
        let (mut submitter, surface) = new::<MockPresenter>();
        drop(surface);

        assert!(!submitter.connection_open());
        assert_eq!(
            submitter.submit(&gray((1, 1), 0)),
            Err(ChannelError::ConnectionDropped)
        );
    }

    #[test]
    fn concurrent_submits_never_show_a_torn_frame() {
        const FRAMES: u8 = 200;

        let (mut submitter, mut surface) = new();
        let (presenter, uploads) = recording();
        surface.attach(Ok(presenter)).unwrap();

        let producer = thread::spawn(move || {
            for value in 1..=FRAMES {
                // Alternate sizes so a torn copy would also show up as a
                // length mismatch.
                let dims = if value % 2 == 0 { (64, 48) } else { (48, 64) };
                submitter.submit(&gray(dims, value)).unwrap();
            }
        });

        while !producer.is_finished() {
            surface.draw_latest().unwrap();
        }
        producer.join().unwrap();
        surface.draw_latest().unwrap();

        let uploads = uploads.lock().unwrap();
        assert!(!uploads.is_empty());
        let mut last_value = 0;
        for (dims, bytes) in uploads.iter() {
            assert_eq!(bytes.len(), dims.area() * 4);
            let value = bytes[0];
            assert!(
                bytes.chunks_exact(4).all(|p| p == [value, value, value, 255]),
                "torn frame"
            );
            assert!(value > last_value, "frames went backwards");
            last_value = value;
        }
        assert_eq!(last_value, FRAMES);
    }
}
