//! The wgpu implementation of [Presenter].

use std::sync::Arc;

use media::frame::Dimensions;
use util::debug_log_info;
use winit::window::Window;

use crate::errors::PresentError;
use crate::pipeline::{self, QuadPipeline};
use crate::surface::Presenter;
use crate::texture::FrameTexture;

// Labels used for GPU objects
mod labels {
    pub const ENCODER: &str = "encoder/present";
    pub const PASS: &str = "pass/present";
}

/// Everything needed to draw frames into a window: the surface, device and
/// queue, the [QuadPipeline], and the frame texture.
///
/// A presenter is tied to one window surface. When the surface goes away
/// (e.g. the app is suspended) drop the presenter and create a new one once
/// the window is back, which rebuilds the pipeline too.
#[derive(Debug)]
pub struct GpuPresenter {
    // Swapchain and device
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipeline: QuadPipeline,

    // Created on first upload and whenever the frame dimensions change
    texture: FrameTexture,
    bind_group: Option<wgpu::BindGroup>,
    frame_dimensions: Option<Dimensions>,

    window: Arc<Window>,
}

impl GpuPresenter {
    pub async fn new_async(window: Arc<Window>) -> Result<Self, PresentError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        // The surface keeps the window alive through its own `Arc`.
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                // Frames can be as large as the adapter allows.
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let config = Self::make_surface_config(&surface, &adapter, window.inner_size())?;
        surface.configure(&device, &config);

        let pipeline = QuadPipeline::new(&device, config.format)?;
        let texture = FrameTexture::new(pipeline.texture_format());

        debug_log_info!(
            "Created GPU presenter ({} on {:?}, surface format {:?}).",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            texture,
            bind_group: None,
            frame_dimensions: None,
            window,
        })
    }

    /// The same as [Self::new_async], blocking until it's done.
    pub fn new(window: Arc<Window>) -> Result<Self, PresentError> {
        pollster::block_on(Self::new_async(window))
    }

    fn make_surface_config(
        surface: &wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> Result<wgpu::SurfaceConfiguration, PresentError> {
        let caps = surface.get_capabilities(adapter);
        let Some(&first_format) = caps.formats.first() else {
            return Err(PresentError::resource(
                "window surface",
                "the adapter can't present to it",
            ));
        };
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(first_format);

        Ok(wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Presenter for GpuPresenter {
    fn upload(&mut self, dimensions: Dimensions, rgba: &[u8]) -> Result<(), PresentError> {
        crate::texture::check_upload_len(dimensions, rgba)?;

        let recreated = match self.texture.ensure(&self.device, dimensions) {
            Ok(recreated) => recreated,
            Err(e) => {
                self.bind_group = None;
                self.frame_dimensions = None;
                return Err(e);
            }
        };
        if recreated {
            debug_log_info!("Allocated a {dimensions} frame texture.");
            self.bind_group = self
                .texture
                .view()
                .map(|view| self.pipeline.bind_group_for(&self.device, view));
        }

        self.texture.write(&self.queue, dimensions, rgba)?;
        self.frame_dimensions = Some(dimensions);

        Ok(())
    }

    fn draw(&mut self) -> Result<(), PresentError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                // The next draw gets a fresh swapchain.
                self.surface.configure(&self.device, &self.config);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(labels::ENCODER),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(labels::PASS),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let (Some(bind_group), Some(dimensions)) = (&self.bind_group, self.frame_dimensions) {
            let (x, y, width, height) =
                pipeline::fit_viewport(self.config.width, self.config.height, dimensions);
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            self.pipeline.draw(&mut pass, bind_group);
        }

        drop(pass);

        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        output.present();

        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }
}
