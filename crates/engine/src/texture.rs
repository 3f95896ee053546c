use media::frame::Dimensions;

use crate::errors::PresentError;

const BYTES_PER_PIXEL: u32 = 4;

/// The texture frames are uploaded into. It's only recreated when the frame
/// dimensions change, every other upload writes over the existing texture.
#[derive(Debug)]
pub(crate) struct FrameTexture {
    format: wgpu::TextureFormat,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    extent: wgpu::Extent3d,
}

impl FrameTexture {
    pub(crate) fn new(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            texture: None,
            view: None,
            extent: wgpu::Extent3d {
                width: 0,
                height: 0,
                depth_or_array_layers: 1,
            },
        }
    }

    /// Make sure the texture fits `dimensions`, returning whether a new one
    /// was created (and any bind group using the old one is stale).
    ///
    /// If the texture can't be created the old one is released as well, so
    /// nothing of the wrong size gets drawn.
    pub(crate) fn ensure(
        &mut self,
        device: &wgpu::Device,
        dimensions: Dimensions,
    ) -> Result<bool, PresentError> {
        let (width, height) = extent_size(dimensions);
        if self.texture.is_some() && self.extent.width == width && self.extent.height == height {
            return Ok(false);
        }

        self.texture = None;
        self.view = None;
        check_texture_size(dimensions, &device.limits())?;

        self.extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tex/frame"),
            size: self.extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(PresentError::resource("frame texture", e));
        }

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);

        Ok(true)
    }

    /// Copy tightly packed RGBA rows into the texture. [Self::ensure] must
    /// have been called with `dimensions` first.
    pub(crate) fn write(
        &self,
        queue: &wgpu::Queue,
        dimensions: Dimensions,
        rgba: &[u8],
    ) -> Result<(), PresentError> {
        check_upload_len(dimensions, rgba)?;

        let Some(texture) = self.texture.as_ref() else {
            return Err(PresentError::resource("frame texture", "not created yet"));
        };

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // `write_texture` has no row alignment requirement, unlike
                // buffer to texture copies.
                bytes_per_row: Some(self.extent.width * BYTES_PER_PIXEL),
                rows_per_image: Some(self.extent.height),
            },
            self.extent,
        );

        Ok(())
    }

    pub(crate) fn view(&self) -> Option<&wgpu::TextureView> {
        self.view.as_ref()
    }
}

fn extent_size(dimensions: Dimensions) -> (u32, u32) {
    (
        u32::try_from(dimensions.width()).unwrap_or(u32::MAX),
        u32::try_from(dimensions.height()).unwrap_or(u32::MAX),
    )
}

/// Both sides of a frame texture have to fit in the device's limit.
pub(crate) fn check_texture_size(
    dimensions: Dimensions,
    limits: &wgpu::Limits,
) -> Result<(), PresentError> {
    let max = limits.max_texture_dimension_2d as usize;
    if dimensions.width() > max || dimensions.height() > max {
        return Err(PresentError::resource(
            "frame texture",
            format!("{dimensions} is larger than the device's {max} pixel limit"),
        ));
    }
    Ok(())
}

/// `rgba` must hold exactly 4 bytes per pixel.
pub(crate) fn check_upload_len(dimensions: Dimensions, rgba: &[u8]) -> Result<(), PresentError> {
    let expected = dimensions.area() * BYTES_PER_PIXEL as usize;
    if rgba.len() != expected {
        return Err(PresentError::DataSizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}
