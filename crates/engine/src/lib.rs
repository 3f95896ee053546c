//! Getting processed frames onto the screen.
//!
//! [surface::new] splits presentation into a [surface::FrameSubmitter] for the
//! thread producing frames and a [surface::PresentationSurface] for the thread
//! that owns the window. Everything that touches the GPU sits behind the
//! [surface::Presenter] trait, implemented with wgpu by [gpu::GpuPresenter].

pub mod errors;
pub mod gpu;
pub mod pipeline;
pub mod surface;

mod texture;
