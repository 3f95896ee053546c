//! The render pipeline that draws a frame texture as a textured quad.

use bytemuck::{Pod, Zeroable};
use media::frame::Dimensions;
use wgpu::util::DeviceExt;

use crate::errors::PresentError;

// Labels used for GPU objects
mod labels {
    pub const SHADER: &str = "shader/present";
    pub const BIND_GROUP_LAYOUT: &str = "bgl/frame";
    pub const SAMPLER: &str = "sampler/frame";
    pub const PIPELINE_LAYOUT: &str = "layout/present";
    pub const PIPELINE: &str = "pipeline/present";
    pub const VERTEX_BUFFER: &str = "vb/quad";
    pub const BIND_GROUP: &str = "bg/frame";
}

/// One corner of the quad, as laid out in the vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Clip space position.
    pub position: [f32; 2],
    /// Texture coordinate. `(0, 0)` is the first pixel of the first row.
    pub tex_coord: [f32; 2],
}

/// The quad as a triangle strip: bottom left, bottom right, top left, top
/// right. The texture's V axis points down, so row 0 lands at the top of the
/// screen.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 0.0],
    },
];

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// The texture format frames should be uploaded as for a surface of
/// `surface_format`.
///
/// An sRGB surface encodes whatever the shader writes, so the texture has to
/// be sRGB too (decoded on sampling) for frame bytes to reach the screen
/// unchanged.
pub fn texture_format_for(surface_format: wgpu::TextureFormat) -> wgpu::TextureFormat {
    if surface_format.is_srgb() {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

/// Where on a `surface_width` by `surface_height` target an image of
/// `image` dimensions is drawn so it's as large as possible without being
/// stretched. Returns `(x, y, width, height)` in pixels.
///
/// ```
/// use engine::pipeline::fit_viewport;
///
/// // A 4:3 image on a 16:9 surface gets bars on the left and right.
/// assert_eq!(fit_viewport(1600, 900, (640, 480).into()), (200.0, 0.0, 1200.0, 900.0));
/// ```
pub fn fit_viewport(
    surface_width: u32,
    surface_height: u32,
    image: Dimensions,
) -> (f32, f32, f32, f32) {
    let (surface_width, surface_height) = (surface_width as f32, surface_height as f32);
    let scale = (surface_width / image.width() as f32).min(surface_height / image.height() as f32);

    let width = image.width() as f32 * scale;
    let height = image.height() as f32 * scale;

    (
        (surface_width - width) / 2.0,
        (surface_height - height) / 2.0,
        width,
        height,
    )
}

/// The shader, pipeline, sampler and vertex buffer for drawing frames. These
/// are created once per [crate::gpu::GpuPresenter] and shared by every frame.
#[derive(Debug)]
pub struct QuadPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    texture_format: wgpu::TextureFormat,
}

impl QuadPipeline {
    /// Compile the shader and build the pipeline for drawing onto
    /// `target_format`.
    ///
    /// # Errors
    ///
    /// Shader compilation and pipeline validation errors are captured and
    /// returned as [PresentError::GraphicsResourceFailure] instead of going to
    /// wgpu's uncaptured error handler.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, PresentError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(labels::SHADER),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/present.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(labels::BIND_GROUP_LAYOUT),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(labels::SAMPLER),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(labels::PIPELINE_LAYOUT),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(labels::PIPELINE),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(PresentError::resource("presentation pipeline", e));
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(labels::VERTEX_BUFFER),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            texture_format: texture_format_for(target_format),
        })
    }

    /// The format frame textures drawn by this pipeline should have.
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        self.texture_format
    }

    /// Bind a frame texture (binding 0) and the sampler (binding 1).
    pub fn bind_group_for(
        &self,
        device: &wgpu::Device,
        texture_view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(labels::BIND_GROUP),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Record the quad draw into `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, bind_group: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_maps_first_row_to_the_top() {
        for vertex in QUAD_VERTICES {
            let [_, y] = vertex.position;
            let [_, v] = vertex.tex_coord;
            // Top of clip space (y = 1) samples the first row (v = 0).
            assert_eq!(v, (1.0 - y) / 2.0);
        }
        assert_eq!(size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn texture_matches_surface_encoding() {
        assert_eq!(
            texture_format_for(wgpu::TextureFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format_for(wgpu::TextureFormat::Bgra8Unorm),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }

    #[test]
    fn viewport_fits_without_stretching() {
        // Same aspect ratio fills the surface.
        assert_eq!(
            fit_viewport(1280, 720, (640, 360).into()),
            (0.0, 0.0, 1280.0, 720.0)
        );
        // A portrait image on a landscape surface is centered horizontally.
        assert_eq!(
            fit_viewport(1000, 500, (480, 640).into()),
            (312.5, 0.0, 375.0, 500.0)
        );
        // A wide image on a square surface is centered vertically.
        assert_eq!(
            fit_viewport(400, 400, (200, 100).into()),
            (0.0, 100.0, 400.0, 200.0)
        );
    }
}
