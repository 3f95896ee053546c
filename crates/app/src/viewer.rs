//! The window side of the pipeline. Drives the [PresentationSurface] from
//! winit's events and redraws continuously.

use std::sync::Arc;

use engine::gpu::GpuPresenter;
use engine::surface::{DrawOutcome, PresentationSurface};
use media::frame::Dimensions;
use media::processor::{FilterMode, SharedFilterMode};
use util::drop_join_thread::StoppableThread;
use util::{debug_log_info, debug_log_warning};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::error::EventLoopError;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::producer::ProducerStats;

const TITLE: &str = "Edge Viewer";

pub struct Viewer {
    surface: PresentationSurface<GpuPresenter>,
    mode: SharedFilterMode,
    window: Option<Arc<Window>>,
    /// The size the window opens with.
    frame_size: Dimensions,
    producer: Option<StoppableThread<ProducerStats>>,
    /// Consecutive failed draws, so a persistent failure isn't logged every
    /// frame.
    failed_draws: u64,
}

impl Viewer {
    pub fn new(
        surface: PresentationSurface<GpuPresenter>,
        mode: SharedFilterMode,
        frame_size: Dimensions,
        producer: StoppableThread<ProducerStats>,
    ) -> Self {
        Self {
            surface,
            mode,
            window: None,
            frame_size,
            producer: Some(producer),
            failed_draws: 0,
        }
    }

    /// Open the window and run until it's closed, then stop the producer and
    /// return its statistics.
    pub fn run(mut self) -> Result<Option<ProducerStats>, EventLoopError> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        Ok(self.stop_producer())
    }

    fn stop_producer(&mut self) -> Option<ProducerStats> {
        let producer = self.producer.take()?;
        match producer.stop() {
            Ok(stats) => Some(stats),
            Err(_) => {
                debug_log_warning!("The producer thread panicked.");
                None
            }
        }
    }

    fn title(&self) -> String {
        match self.mode.get() {
            FilterMode::EdgeDetection => format!("{TITLE} (edges)"),
            FilterMode::Passthrough => format!("{TITLE} (raw)"),
        }
    }

    fn redraw(&mut self) {
        match self.surface.draw_latest() {
            Ok(DrawOutcome::Disabled) => {}
            Ok(_) => self.failed_draws = 0,
            Err(e) => {
                self.failed_draws += 1;
                if !e.is_transient() || self.failed_draws > 1 {
                    debug_log_warning!("Draw failed ({} in a row): {e}", self.failed_draws);
                }
            }
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyE | KeyCode::Space => {
                let mode = self.mode.toggle();
                debug_log_info!("Switched to {mode:?}.");
                if let Some(window) = &self.window {
                    window.set_title(&self.title());
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = match &self.window {
            Some(window) => window.clone(),
            None => {
                let attributes = Window::default_attributes()
                    .with_title(self.title())
                    .with_inner_size(LogicalSize::new(
                        self.frame_size.width() as f64,
                        self.frame_size.height() as f64,
                    ));
                match event_loop.create_window(attributes) {
                    Ok(window) => Arc::new(window),
                    Err(e) => {
                        eprintln!("Couldn't open a window: {e}");
                        event_loop.exit();
                        return;
                    }
                }
            }
        };

        let size = window.inner_size();
        self.surface.resize(size.width, size.height);
        if let Err(e) = self.surface.attach(GpuPresenter::new(window.clone())) {
            eprintln!("Graphics setup failed, nothing will be shown: {e}");
        }

        window.request_redraw();
        self.window = Some(window);
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.surface.detach();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => self.surface.resize(size.width, size.height),

            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The presenter refers to the window, release it first.
        self.surface.detach();
        self.window = None;
    }
}

#[cfg(test)]
mod tests {
    use engine::surface;
    use media::processor::FrameProcessor;

    use super::*;
    use crate::camera::{SyntheticCamera, YuvLayout};
    use crate::producer::Producer;

    #[test]
    fn viewer_without_a_window_draws_nothing_and_stops_its_producer() {
        let dims: Dimensions = (16, 8).into();
        let mode = SharedFilterMode::new(FilterMode::Passthrough);
        let (submitter, surface) = surface::new::<GpuPresenter>();
        let producer = Producer::new(
            SyntheticCamera::new(dims, YuvLayout::Nv12),
            FrameProcessor::default(),
            mode.clone(),
            submitter,
        )
        .spawn(Some(3), None);

        let mut viewer = Viewer::new(surface, mode, dims, producer);
        viewer.redraw();
        assert_eq!(viewer.failed_draws, 0);
        assert_eq!(viewer.title(), "Edge Viewer (raw)");

        let stats = viewer.stop_producer().unwrap();
        assert!(stats.frames_captured <= 3);
        assert!(viewer.stop_producer().is_none());
    }
}
