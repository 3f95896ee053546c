use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresentError {
    /// Creating one of the GPU objects presentation needs failed (adapter,
    /// device, surface, shader, pipeline). Nothing gets drawn until a new
    /// presenter is attached.
    #[error("Failed to create {resource}: {reason}")]
    GraphicsResourceFailure {
        resource: &'static str,
        reason: String,
    },

    #[error("Failed to acquire the next surface texture: {0}")]
    SurfaceAcquire(#[from] wgpu::SurfaceError),

    #[error("Upload data size mismatch (expected {expected} bytes, got {actual} bytes)")]
    DataSizeMismatch { expected: usize, actual: usize },
}

impl PresentError {
    pub(crate) fn resource(resource: &'static str, reason: impl ToString) -> Self {
        PresentError::GraphicsResourceFailure {
            resource,
            reason: reason.to_string(),
        }
    }

    /// Whether the next draw will likely succeed without any intervention.
    /// Lost and outdated surfaces are reconfigured by the presenter itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PresentError::SurfaceAcquire(
                wgpu::SurfaceError::Lost
                    | wgpu::SurfaceError::Outdated
                    | wgpu::SurfaceError::Timeout
            )
        )
    }
}

impl From<wgpu::RequestAdapterError> for PresentError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        Self::resource("GPU adapter", e)
    }
}

impl From<wgpu::RequestDeviceError> for PresentError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        Self::resource("GPU device", e)
    }
}

impl From<wgpu::CreateSurfaceError> for PresentError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        Self::resource("window surface", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_swapchain_hiccups_are_transient() {
        assert!(PresentError::from(wgpu::SurfaceError::Outdated).is_transient());
        assert!(PresentError::from(wgpu::SurfaceError::Timeout).is_transient());
        assert!(!PresentError::from(wgpu::SurfaceError::OutOfMemory).is_transient());
        assert!(!PresentError::resource("GPU device", "lost").is_transient());
        assert!(
            !PresentError::DataSizeMismatch {
                expected: 4,
                actual: 0
            }
            .is_transient()
        );
    }
}
